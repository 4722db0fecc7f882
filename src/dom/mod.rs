//! Document module - an arena-backed HTML tree with parsing, serialization
//! and simple selector queries

mod parser;
mod selector;
mod serialize;
mod tree;

pub use selector::{Selector, SelectorIndex};
pub use serialize::{escape_attribute, escape_text};
pub use tree::{Content, Document, ElementData, NodeData, NodeId};

/// HTML void elements that cannot have children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Elements whose text content is emitted verbatim
pub(crate) fn is_raw_text_element(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}
