//! HTML parsing into the document arena using html5gum.
//!
//! Parsing never fails: stray end tags are dropped, unclosed elements are
//! closed at end of input, and text outside any element is kept as a
//! top-level text node. No `<html>`, `<head>` or `<body>` wrapper is implied,
//! but the end tags HTML lets authors omit (`</p>`, `</li>`, `</td>`, ...)
//! are implied when a sibling opens.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use html5gum::{DefaultEmitter, Emitter, ForwardingEmitter, State, Token, Tokenizer};

use super::tree::{Document, ElementData, NodeData, NodeId};
use super::is_void_element;

type AttributeList = Vec<(String, String)>;

/// Records start-tag attributes in source order alongside the default
/// emitter, whose attribute map is sorted and keeps the first duplicate.
/// One list is queued per emitted start tag, in token order.
#[derive(Default)]
struct AttributeRecorder {
    inner: DefaultEmitter,
    in_start_tag: bool,
    current: Vec<(Vec<u8>, Vec<u8>)>,
    finished: Rc<RefCell<VecDeque<AttributeList>>>,
}

impl ForwardingEmitter for AttributeRecorder {
    type Token = Token;

    fn inner(&mut self) -> &mut impl Emitter<Token = Self::Token> {
        &mut self.inner
    }

    fn init_start_tag(&mut self) {
        self.inner().init_start_tag();
        self.in_start_tag = true;
        self.current.clear();
    }

    fn init_end_tag(&mut self) {
        self.inner().init_end_tag();
        self.in_start_tag = false;
    }

    fn init_attribute(&mut self) {
        self.inner().init_attribute();
        if self.in_start_tag {
            self.current.push((Vec::new(), Vec::new()));
        }
    }

    fn push_attribute_name(&mut self, s: &[u8]) {
        self.inner().push_attribute_name(s);
        if let Some((name, _)) = self.current.last_mut() {
            name.extend_from_slice(s);
        }
    }

    fn push_attribute_value(&mut self, s: &[u8]) {
        self.inner().push_attribute_value(s);
        if let Some((_, value)) = self.current.last_mut() {
            value.extend_from_slice(s);
        }
    }

    fn emit_current_tag(&mut self) -> Option<State> {
        if self.in_start_tag {
            let attributes = self
                .current
                .drain(..)
                .map(|(name, value)| {
                    (
                        String::from_utf8_lossy(&name).to_ascii_lowercase(),
                        String::from_utf8_lossy(&value).into_owned(),
                    )
                })
                .collect();
            self.finished.borrow_mut().push_back(attributes);
            self.in_start_tag = false;
        }
        self.inner().emit_current_tag()
    }
}

impl Document {
    /// Parse a full document. A doctype declaration is kept for serialization.
    pub fn parse(html: &str) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        build_tree(&mut doc, root, html, true);
        doc
    }

    /// Parse markup as the children of a generic container and return the
    /// resulting top-level nodes, detached and ready to be spliced in.
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let container = self.create_element("template");
        build_tree(self, container, html, false);
        self.take_children(container)
    }
}

/// Elements that stop the search for an open element to close
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "caption", "html", "table", "td", "th", "marquee", "object", "template",
];

/// Start tags that close an open `<p>`
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "ul",
];

/// Index of the innermost open element named in `targets`, unless one of
/// `boundaries` is open above it
fn open_in_scope(
    stack: &[(String, NodeId)],
    targets: &[&str],
    boundaries: &[&str],
) -> Option<usize> {
    for (idx, (name, _)) in stack.iter().enumerate().rev() {
        if targets.contains(&name.as_str()) {
            return Some(idx);
        }
        if boundaries.contains(&name.as_str()) {
            return None;
        }
    }
    None
}

/// Pop the elements whose end tag is implied by opening `name`
fn close_implied(stack: &mut Vec<(String, NodeId)>, name: &str) {
    if CLOSES_PARAGRAPH.contains(&name) {
        let mut boundaries = SCOPE_BOUNDARIES.to_vec();
        boundaries.push("button");
        if let Some(idx) = open_in_scope(stack, &["p"], &boundaries) {
            stack.truncate(idx);
        }
    }

    let implied = match name {
        "li" => open_in_scope(stack, &["li"], &[SCOPE_BOUNDARIES, &["ul", "ol"][..]].concat()),
        "dt" | "dd" => open_in_scope(stack, &["dt", "dd"], &[SCOPE_BOUNDARIES, &["dl"][..]].concat()),
        "option" => open_in_scope(stack, &["option"], &["select", "datalist", "optgroup"]),
        "optgroup" => open_in_scope(stack, &["option", "optgroup"], &["select"]),
        "tr" => open_in_scope(stack, &["tr"], &["table", "tbody", "thead", "tfoot"]),
        "td" | "th" => open_in_scope(stack, &["td", "th"], &["tr", "table"]),
        "tbody" | "thead" | "tfoot" => open_in_scope(
            stack,
            &["tbody", "thead", "tfoot"],
            &["table"],
        ),
        _ => None,
    };
    if let Some(idx) = implied {
        stack.truncate(idx);
    }
}

fn build_tree(doc: &mut Document, container: NodeId, html: &str, keep_doctype: bool) {
    let recorded = Rc::new(RefCell::new(VecDeque::new()));
    let emitter = AttributeRecorder {
        finished: recorded.clone(),
        ..AttributeRecorder::default()
    };
    let mut tokenizer = Tokenizer::new_with_emitter(html, emitter);
    let mut stack: Vec<(String, NodeId)> = Vec::new();

    while let Some(token_result) = tokenizer.next() {
        let token = match token_result {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!("HTML tokenizer stopped: {:?}", err);
                break;
            }
        };

        match token {
            Token::StartTag(tag) => {
                let mut element = ElementData::new(&String::from_utf8_lossy(&tag.name));
                let in_order = recorded.borrow_mut().pop_front();
                match in_order {
                    // a repeated name keeps its first position and takes the last value
                    Some(attributes) => {
                        for (key, value) in attributes {
                            element.attributes.insert(key, value);
                        }
                    }
                    None => {
                        for (key, value) in tag.attributes.iter() {
                            element.attributes.insert(
                                String::from_utf8_lossy(key).to_ascii_lowercase(),
                                String::from_utf8_lossy(value).into_owned(),
                            );
                        }
                    }
                }
                let name = element.name.clone();
                close_implied(&mut stack, &name);
                let current = stack.last().map(|(_, id)| *id).unwrap_or(container);
                let id = doc.push_child(current, NodeData::Element(element));

                if tag.self_closing || is_void_element(&name) {
                    continue;
                }
                match name.as_str() {
                    "script" | "style" => tokenizer.set_state(State::ScriptData),
                    "textarea" | "title" => tokenizer.set_state(State::RcData),
                    _ => {}
                }
                stack.push((name, id));
            }
            Token::EndTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                if let Some(idx) = stack.iter().rposition(|(open, _)| *open == name) {
                    stack.truncate(idx);
                }
            }
            Token::String(text) => {
                let current = stack.last().map(|(_, id)| *id).unwrap_or(container);
                doc.push_text(current, &String::from_utf8_lossy(&text));
            }
            Token::Comment(text) => {
                let text = String::from_utf8_lossy(&text);
                // `<?xml encoding="utf-8">` arrives as a bogus comment; it is
                // an encoding hint, never content.
                if text.starts_with("?xml") {
                    continue;
                }
                let current = stack.last().map(|(_, id)| *id).unwrap_or(container);
                doc.push_child(current, NodeData::Comment(text.into_owned()));
            }
            Token::Doctype(doctype) => {
                if keep_doctype && doc.doctype().is_none() {
                    let name = String::from_utf8_lossy(&doctype.name).to_ascii_lowercase();
                    let name = if name.is_empty() { "html".to_string() } else { name };
                    doc.set_doctype(Some(name));
                }
            }
            Token::Error(_) => {}
        }
    }
}
