//! Error types for template loading and rendering

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the document tree and the template engine
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("No document loaded")]
    NoDocumentLoaded,

    #[error("Invalid host node: {0}")]
    InvalidHostNode(String),

    #[error("Unsupported asset type '{extension}' for {path}")]
    UnsupportedAssetType { path: String, extension: String },

    #[error("Invalid element type: {0}")]
    InvalidElementType(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
