//! Simple selector queries over the document tree
//!
//! Supported forms: `#id`, `.class`, `tag`, `[attr]`, `[attr=value]` and
//! `tag[attr=value]`. Combinators are not supported.

use std::collections::HashMap;
use std::str::FromStr;

use super::tree::{Document, ElementData, NodeId};
use crate::error::{Result, TemplateError};

/// A single parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    Class(String),
    Tag(String),
    Attribute {
        tag: Option<String>,
        name: String,
        value: Option<String>,
    },
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')
}

fn parse_name(s: &str, selector: &str) -> Result<String> {
    if s.is_empty() || !s.chars().all(is_name_char) {
        return Err(TemplateError::InvalidSelector(selector.to_string()));
    }
    Ok(s.to_string())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

impl FromStr for Selector {
    type Err = TemplateError;

    fn from_str(selector: &str) -> Result<Self> {
        let s = selector.trim();
        if let Some(id) = s.strip_prefix('#') {
            return Ok(Selector::Id(parse_name(id, selector)?));
        }
        if let Some(class) = s.strip_prefix('.') {
            return Ok(Selector::Class(parse_name(class, selector)?));
        }
        let Some(open) = s.find('[') else {
            return Ok(Selector::Tag(parse_name(s, selector)?.to_ascii_lowercase()));
        };

        let inner = s[open + 1..]
            .strip_suffix(']')
            .ok_or_else(|| TemplateError::InvalidSelector(selector.to_string()))?;
        let tag = match &s[..open] {
            "" => None,
            tag => Some(parse_name(tag, selector)?.to_ascii_lowercase()),
        };
        let (name, value) = match inner.split_once('=') {
            Some((name, value)) => (name.trim(), Some(strip_quotes(value).to_string())),
            None => (inner.trim(), None),
        };
        Ok(Selector::Attribute {
            tag,
            name: parse_name(name, selector)?.to_ascii_lowercase(),
            value,
        })
    }
}

impl Selector {
    /// Parse a selector string
    pub fn parse(selector: &str) -> Result<Self> {
        selector.parse()
    }

    /// Whether an element satisfies the selector
    pub fn matches(&self, el: &ElementData) -> bool {
        match self {
            Selector::Id(id) => el.attributes.get("id").is_some_and(|v| v == id),
            Selector::Class(class) => el.classes().any(|c| c == class),
            Selector::Tag(tag) => el.name.eq_ignore_ascii_case(tag),
            Selector::Attribute { tag, name, value } => {
                if let Some(tag) = tag {
                    if !el.name.eq_ignore_ascii_case(tag) {
                        return false;
                    }
                }
                match (el.attributes.get(name), value) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                }
            }
        }
    }
}

/// Lookup tables from selector keys to attached elements, in document order
#[derive(Debug, Clone, Default)]
pub struct SelectorIndex {
    generation: u64,
    by_id: HashMap<String, Vec<NodeId>>,
    by_class: HashMap<String, Vec<NodeId>>,
    by_tag: HashMap<String, Vec<NodeId>>,
    by_attribute: HashMap<String, Vec<NodeId>>,
}

impl SelectorIndex {
    /// Index every element reachable from the root
    pub fn build(doc: &Document) -> Self {
        let mut index = SelectorIndex {
            generation: doc.generation(),
            ..Default::default()
        };
        for id in doc.elements() {
            let Some(el) = doc.element(id) else {
                continue;
            };
            index.by_tag.entry(el.name.clone()).or_default().push(id);
            for (name, value) in &el.attributes {
                index.by_attribute.entry(name.clone()).or_default().push(id);
                if name == "id" {
                    index.by_id.entry(value.clone()).or_default().push(id);
                }
            }
            for class in el.classes() {
                let entry = index.by_class.entry(class.to_string()).or_default();
                if entry.last() != Some(&id) {
                    entry.push(id);
                }
            }
        }
        index
    }

    /// Generation of the document this index was built from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn candidates(&self, selector: &Selector) -> &[NodeId] {
        let bucket = match selector {
            Selector::Id(id) => self.by_id.get(id),
            Selector::Class(class) => self.by_class.get(class),
            Selector::Tag(tag) => self.by_tag.get(tag),
            Selector::Attribute { name, .. } => self.by_attribute.get(name),
        };
        bucket.map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Document {
    /// Rebuild the selector index now
    pub fn reindex(&self) {
        *self.index.borrow_mut() = Some(SelectorIndex::build(self));
    }

    /// Elements matching a parsed selector, in document order
    pub fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        let stale = self
            .index
            .borrow()
            .as_ref()
            .map_or(true, |index| index.generation() != self.generation);
        if stale {
            tracing::trace!("Rebuilding selector index");
            self.reindex();
        }
        let index = self.index.borrow();
        let Some(index) = index.as_ref() else {
            return Vec::new();
        };
        index
            .candidates(selector)
            .iter()
            .copied()
            .filter(|&id| self.element(id).is_some_and(|el| selector.matches(el)))
            .collect()
    }

    /// All elements matching `selector`
    pub fn find_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        Ok(self.select_all(&Selector::parse(selector)?))
    }

    /// First element matching `selector`
    pub fn find(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    /// Element whose `id` attribute equals `id`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.select_all(&Selector::Id(id.to_string()))
            .into_iter()
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<div id="main" class="box wide">
<input data-bind="user.name" type="text">
<span data-bind="user.email" class="box"></span>
<section data-include="partials/nav"></section>
<P data-template='items'></P>
</div>"#;

    #[test]
    fn test_parse_selectors() {
        assert_eq!(Selector::parse("#main").unwrap(), Selector::Id("main".into()));
        assert_eq!(Selector::parse(".box").unwrap(), Selector::Class("box".into()));
        assert_eq!(Selector::parse("DIV").unwrap(), Selector::Tag("div".into()));
        assert_eq!(
            Selector::parse("[data-include]").unwrap(),
            Selector::Attribute {
                tag: None,
                name: "data-include".into(),
                value: None
            }
        );
        assert_eq!(
            Selector::parse("input[data-bind=\"user.name\"]").unwrap(),
            Selector::Attribute {
                tag: Some("input".into()),
                name: "data-bind".into(),
                value: Some("user.name".into())
            }
        );
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "#", ".", "div span", "[data-x", "div > p", "a[=b]"] {
            assert!(
                matches!(Selector::parse(bad), Err(TemplateError::InvalidSelector(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_find_by_id_class_and_tag() {
        let doc = Document::parse(PAGE);
        let main = doc.find("#main").unwrap().unwrap();
        assert_eq!(doc.tag_name(main), Some("div"));
        assert_eq!(doc.find_all(".box").unwrap().len(), 2);
        assert_eq!(doc.find_all("p").unwrap().len(), 1);
        assert_eq!(doc.find_all("P").unwrap().len(), 1);
        assert!(doc.find("#missing").unwrap().is_none());
    }

    #[test]
    fn test_find_by_attribute() {
        let doc = Document::parse(PAGE);
        assert_eq!(doc.find_all("[data-bind]").unwrap().len(), 2);
        let email = doc.find("[data-bind=\"user.email\"]").unwrap().unwrap();
        assert_eq!(doc.tag_name(email), Some("span"));
        let name = doc.find("input[data-bind='user.name']").unwrap().unwrap();
        assert_eq!(doc.tag_name(name), Some("input"));
        assert!(doc.find("span[data-bind=user.name]").unwrap().is_none());
        assert_eq!(doc.find_all("[data-template=items]").unwrap().len(), 1);
    }

    #[test]
    fn test_results_in_document_order() {
        let doc = Document::parse("<b class=\"k\">1</b><i class=\"k\">2</i><u class=\"k\">3</u>");
        let names: Vec<_> = doc
            .find_all(".k")
            .unwrap()
            .into_iter()
            .map(|id| doc.tag_name(id).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "i", "u"]);
    }

    #[test]
    fn test_index_follows_mutations() {
        let mut doc = Document::parse(PAGE);
        assert_eq!(doc.find_all("[data-bind]").unwrap().len(), 2);

        let span = doc.find("span").unwrap().unwrap();
        doc.remove(span);
        assert_eq!(doc.find_all("[data-bind]").unwrap().len(), 1);

        let main = doc.element_by_id("main").unwrap();
        doc.append_child(main, "<em data-bind=\"user.age\"></em>");
        assert_eq!(doc.find_all("[data-bind]").unwrap().len(), 2);

        doc.remove_attribute(main, "id");
        assert!(doc.element_by_id("main").is_none());
    }

    #[test]
    fn test_detached_nodes_are_not_found() {
        let mut doc = Document::parse("<div></div>");
        let orphan = doc.create_element_with("p", &[("id", "ghost")]);
        assert!(doc.element_by_id("ghost").is_none());
        let div = doc.find("div").unwrap().unwrap();
        doc.append_child(div, orphan);
        assert_eq!(doc.element_by_id("ghost"), Some(orphan));
    }
}
