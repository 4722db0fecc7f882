//! Arena-backed document tree
//!
//! Nodes live in a single `Vec` owned by the [`Document`] and are addressed by
//! [`NodeId`] handles. Parent links are plain handles, so detaching a node is a
//! matter of dropping it from its parent's child list and clearing the link.
//! Detached nodes stay in the arena until the document is dropped.

use indexmap::IndexMap;
use std::cell::RefCell;

use super::selector::SelectorIndex;

/// Handle to a node in a [`Document`] arena.
///
/// A handle is only meaningful for the document that created it. Accessors
/// that return a node's data, children or parent panic when given a handle
/// past the end of the arena; use [`Document::contains`] to check a handle
/// of unknown origin first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// The document root; holds the top-level nodes
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Tag name and attributes of an element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    /// Lowercase tag name
    pub name: String,
    /// Attributes in insertion order; keys are unique
    pub attributes: IndexMap<String, String>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        }
    }

    /// Class tokens of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace())
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Nodes to splice into the tree: either existing nodes or markup to parse
#[derive(Debug, Clone)]
pub enum Content {
    Nodes(Vec<NodeId>),
    Html(String),
}

impl From<&str> for Content {
    fn from(html: &str) -> Self {
        Content::Html(html.to_string())
    }
}

impl From<String> for Content {
    fn from(html: String) -> Self {
        Content::Html(html)
    }
}

impl From<Vec<NodeId>> for Content {
    fn from(nodes: Vec<NodeId>) -> Self {
        Content::Nodes(nodes)
    }
}

impl From<NodeId> for Content {
    fn from(node: NodeId) -> Self {
        Content::Nodes(vec![node])
    }
}

/// A parsed HTML document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    doctype: Option<String>,
    /// Bumped on every structural or attribute change
    pub(super) generation: u64,
    pub(super) index: RefCell<Option<SelectorIndex>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            doctype: None,
            generation: 0,
            index: RefCell::new(None),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Doctype name (e.g. `html`) if the source declared one
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        self.doctype = doctype;
    }

    /// Mutation counter, used to detect a stale selector index
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Whether `id` addresses a node of this document's arena
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Node payload, or `None` for a handle outside this arena
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|node| &node.data)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Element(ElementData::new(name)))
    }

    /// Create a detached element with the given attributes
    pub fn create_element_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let mut data = ElementData::new(name);
        for (key, value) in attributes {
            data.attributes.insert(key.to_string(), value.to_string());
        }
        self.push(NodeData::Element(data))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    /// Append a new node under `parent` without any checks; used by the parser
    pub(super) fn push_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.push(data);
        self.node_mut(id).parent = Some(parent);
        self.node_mut(parent).children.push(id);
        self.touch();
        id
    }

    /// Append text under `parent`, merging with a trailing text node
    pub(super) fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.node(parent).children.last() {
            if let NodeData::Text(existing) = &mut self.node_mut(last).data {
                existing.push_str(text);
                return;
            }
        }
        self.push_child(parent, NodeData::Text(text.to_string()));
    }

    /// Detach every child of `container` and return them
    pub(super) fn take_children(&mut self, container: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.node_mut(container).children);
        for &child in &children {
            self.node_mut(child).parent = None;
        }
        self.touch();
        children
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// # Panics
    ///
    /// Panics if `id` does not belong to this document (see [`Document::get`]).
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.node(id).data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Lowercase tag name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent).children.iter().position(|&c| c == child)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let pos = self.position(parent, id)?;
        self.node(parent).children.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let pos = self.position(parent, id)?;
        pos.checked_sub(1)
            .and_then(|p| self.node(parent).children.get(p).copied())
    }

    /// Whether the node is reachable from the document root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// All descendants of `id` in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Attached elements in document order
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.is_element(id))
            .collect()
    }

    /// First attached element with the given tag name
    pub fn first_element_named(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.tag_name(id).is_some_and(|t| t.eq_ignore_ascii_case(name)))
    }

    /// Concatenated text of the node and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).data {
            NodeData::Text(text) => text.clone(),
            NodeData::Comment(_) => String::new(),
            _ => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match &self.node(d).data {
                    NodeData::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Set an attribute; returns false if the node is not an element
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let Some(el) = self.element_mut(id) else {
            return false;
        };
        el.attributes.insert(name.to_string(), value.to_string());
        self.touch();
        true
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let removed = self
            .element_mut(id)
            .and_then(|el| el.attributes.shift_remove(name))
            .is_some();
        if removed {
            self.touch();
        }
        removed
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.classes().any(|c| c == class))
    }

    /// Add a class token; adding an existing token is a no-op
    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        if !self.is_element(id) {
            return false;
        }
        if self.has_class(id, class) {
            return true;
        }
        let mut classes: Vec<String> = self
            .element(id)
            .map(|el| el.classes().map(str::to_string).collect())
            .unwrap_or_default();
        classes.push(class.to_string());
        self.set_attribute(id, "class", &classes.join(" "))
    }

    /// Remove a class token; drops the attribute once no token is left
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        if !self.is_element(id) {
            return false;
        }
        if !self.has_class(id, class) {
            return true;
        }
        let classes: Vec<String> = self
            .element(id)
            .map(|el| {
                el.classes()
                    .filter(|c| *c != class)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if classes.is_empty() {
            self.remove_attribute(id, "class")
        } else {
            self.set_attribute(id, "class", &classes.join(" "))
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn can_have_children(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).data,
            NodeData::Document | NodeData::Element(_)
        )
    }

    /// Turn content into detached nodes ready to be attached under `parent`.
    /// Nodes that would create a cycle, and `exclude`, are dropped.
    fn prepare(&mut self, parent: NodeId, content: Content, exclude: Option<NodeId>) -> Vec<NodeId> {
        let nodes = match content {
            Content::Nodes(nodes) => nodes,
            Content::Html(html) => self.parse_fragment(&html),
        };
        let nodes: Vec<NodeId> = nodes
            .into_iter()
            .filter(|&n| Some(n) != exclude && n != self.root)
            .filter(|&n| !self.is_ancestor_or_self(n, parent))
            .collect();
        for &n in &nodes {
            self.detach(n);
        }
        nodes
    }

    fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node(id).parent else {
            return false;
        };
        self.node_mut(parent).children.retain(|&c| c != id);
        self.node_mut(id).parent = None;
        self.touch();
        true
    }

    fn attach_at(&mut self, parent: NodeId, pos: usize, nodes: Vec<NodeId>) {
        let pos = pos.min(self.node(parent).children.len());
        for (offset, &n) in nodes.iter().enumerate() {
            self.node_mut(n).parent = Some(parent);
            self.node_mut(parent).children.insert(pos + offset, n);
        }
        self.touch();
    }

    /// Insert content before `reference`; false if the reference is detached
    pub fn insert_before(&mut self, reference: NodeId, content: impl Into<Content>) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let nodes = self.prepare(parent, content.into(), Some(reference));
        match self.position(parent, reference) {
            Some(pos) => {
                self.attach_at(parent, pos, nodes);
                true
            }
            None => false,
        }
    }

    /// Insert content after `reference`; false if the reference is detached
    pub fn insert_after(&mut self, reference: NodeId, content: impl Into<Content>) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let nodes = self.prepare(parent, content.into(), Some(reference));
        match self.position(parent, reference) {
            Some(pos) => {
                self.attach_at(parent, pos + 1, nodes);
                true
            }
            None => false,
        }
    }

    /// Replace `target` with content; false if the target is detached
    pub fn replace(&mut self, target: NodeId, content: impl Into<Content>) -> bool {
        let Some(parent) = self.parent(target) else {
            return false;
        };
        let nodes = self.prepare(parent, content.into(), Some(target));
        let Some(pos) = self.position(parent, target) else {
            return false;
        };
        self.detach(target);
        self.attach_at(parent, pos, nodes);
        true
    }

    /// Detach `target` from the tree; false if it was already detached
    pub fn remove(&mut self, target: NodeId) -> bool {
        self.detach(target)
    }

    /// Append content as the last children of `parent`
    pub fn append_child(&mut self, parent: NodeId, content: impl Into<Content>) -> bool {
        if !self.can_have_children(parent) {
            return false;
        }
        let nodes = self.prepare(parent, content.into(), None);
        let end = self.node(parent).children.len();
        self.attach_at(parent, end, nodes);
        true
    }

    /// Insert content as the first children of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, content: impl Into<Content>) -> bool {
        if !self.can_have_children(parent) {
            return false;
        }
        let nodes = self.prepare(parent, content.into(), None);
        self.attach_at(parent, 0, nodes);
        true
    }

    /// Remove every child of `parent`
    pub fn clear_children(&mut self, parent: NodeId) {
        if !self.node(parent).children.is_empty() {
            self.take_children(parent);
        }
    }

    /// Replace the children of `node` with a single text node.
    /// Text and comment nodes get their content replaced instead.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> bool {
        if let NodeData::Text(existing) | NodeData::Comment(existing) =
            &mut self.node_mut(node).data
        {
            *existing = text.to_string();
            return true;
        }
        self.clear_children(node);
        if text.is_empty() {
            return true;
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node)
    }

    /// Replace the children of `node` with parsed markup
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> bool {
        if !self.can_have_children(node) {
            return false;
        }
        self.clear_children(node);
        self.append_child(node, html)
    }
}
