//! domweave: DOM-based HTML template rendering
//!
//! Templates are plain HTML. Structure comes from `data-*` directive
//! attributes (`data-include`, `data-template`, `data-view` with `data-if`,
//! `data-model` with `data-bind`) that are resolved against a parsed
//! document tree, and values come from `{{ dotted.path }}` placeholders
//! substituted into the serialized output.

pub mod config;
pub mod dom;
pub mod error;
pub mod files;
pub mod template;

pub use config::EngineConfig;
pub use dom::{Document, NodeId, Selector};
pub use error::{Result, TemplateError};
pub use files::FileLoader;
pub use template::{AssetRecord, DataModel, TemplateEngine, TemplateLoader, Value, VariableStore};
