//! Template module - loading, variables, directives and rendering

pub mod assets;
pub mod condition;
pub mod directives;
mod engine;
pub mod loader;
pub mod placeholders;
pub mod vars;

pub use assets::{AssetKind, AssetRecord};
pub use condition::Condition;
pub use directives::{Directive, PIPELINE};
pub use engine::{render_with_cache, TemplateEngine};
pub use loader::{FileSource, TemplateCache, TemplateLoader, TemplateSource};
pub use vars::{DataModel, Value, VariableStore};
