//! Directive processing - the structural template passes
//!
//! Each directive is resolved across the whole document before the next one
//! starts, in the order given by [`PIPELINE`]. Elements are collected once per
//! pass, so content inserted by a pass is not revisited by the same pass,
//! although a later pass will see it.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::condition;
use super::loader::TemplateLoader;
use super::vars::{Value, VariableStore};
use crate::dom::{Document, NodeId, Selector};
use crate::error::{Result, TemplateError};

pub const INCLUDE_ATTR: &str = "data-include";
pub const TEMPLATE_ATTR: &str = "data-template";
pub const VIEW_ATTR: &str = "data-view";
pub const IF_ATTR: &str = "data-if";
pub const MODEL_ATTR: &str = "data-model";
pub const BIND_ATTR: &str = "data-bind";

/// A structural directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `data-include="name"`: replace the element with a template
    Include,
    /// `data-template="var"`: repeat the element's content per list item
    Template,
    /// `data-view="name"` (+ `data-if`): fill the element with a template
    View,
    /// `data-model="var"`: bind map properties into `data-bind` elements
    Model,
}

/// The order directives are applied in
pub const PIPELINE: [Directive; 4] = [
    Directive::Include,
    Directive::Template,
    Directive::View,
    Directive::Model,
];

impl Directive {
    /// Attribute that marks an element for this directive
    pub fn attribute(&self) -> &'static str {
        match self {
            Directive::Include => INCLUDE_ATTR,
            Directive::Template => TEMPLATE_ATTR,
            Directive::View => VIEW_ATTR,
            Directive::Model => MODEL_ATTR,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::Attribute {
            tag: None,
            name: self.attribute().to_string(),
            value: None,
        }
    }

    /// Apply the directive to every matching element; returns how many were processed
    pub fn apply(
        &self,
        doc: &mut Document,
        vars: &VariableStore,
        loader: &TemplateLoader,
    ) -> Result<usize> {
        let targets = doc.select_all(&self.selector());
        let mut processed = 0;
        for el in targets {
            // An earlier element of the same pass may have detached this one
            if !doc.is_attached(el) {
                continue;
            }
            let value = directive_value(doc, el, self.attribute())?;
            match self {
                Directive::Include => include(doc, loader, el, &value),
                Directive::Template => expand_template(doc, vars, el, &value),
                Directive::View => view(doc, vars, loader, el, &value),
                Directive::Model => bind_model(doc, vars, el, &value),
            }
            processed += 1;
        }
        if *self == Directive::Include {
            doc.reindex();
        }
        tracing::debug!("Processed {} {:?} directive(s)", processed, self);
        Ok(processed)
    }
}

/// Run every directive in pipeline order
pub fn process_all(
    doc: &mut Document,
    vars: &VariableStore,
    loader: &TemplateLoader,
) -> Result<()> {
    for directive in PIPELINE {
        directive.apply(doc, vars, loader)?;
    }
    Ok(())
}

fn directive_value(doc: &Document, el: NodeId, attr: &str) -> Result<String> {
    let element = doc.element(el).ok_or_else(|| {
        TemplateError::InvalidElementType(format!("node {} matched [{}]", el.index(), attr))
    })?;
    Ok(element
        .attributes
        .get(attr)
        .map(|v| v.trim().to_string())
        .unwrap_or_default())
}

/// Comment text for a directive failure, kept well-formed
fn error_comment(kind: &str, err: &TemplateError) -> String {
    format!(" {} Error: {} ", kind, err.to_string().replace("--", "- -"))
}

fn include(doc: &mut Document, loader: &TemplateLoader, el: NodeId, name: &str) {
    match loader.load(name) {
        Ok(content) => {
            let nodes = doc.parse_fragment(&content);
            doc.replace(el, nodes);
        }
        Err(err) => {
            tracing::warn!("Include '{}' failed: {}", name, err);
            let comment = doc.create_comment(&error_comment("Include", &err));
            doc.replace(el, comment);
        }
    }
}

lazy_static! {
    /// Loop tokens: `{{item}}`, `{{item.field}}`, `{{key}}`, `{{index}}`
    static ref LOOP_TOKEN: Regex =
        Regex::new(r"\{\{\s*(item|key|index)((?:\.[\w-]+)*)\s*\}\}")
            .expect("loop token pattern is valid");
}

/// Substitute loop tokens for one item
fn expand_snippet(snippet: &str, key: &str, index: usize, item: &Value) -> String {
    LOOP_TOKEN
        .replace_all(snippet, |caps: &Captures| {
            let path = caps[2].trim_start_matches('.');
            match (&caps[1], path.is_empty()) {
                ("item", true) => item.to_output_string(),
                ("item", false) => item
                    .get_path(path)
                    .map(Value::to_output_string)
                    .unwrap_or_default(),
                ("key", true) => key.to_string(),
                ("index", true) => index.to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

fn expand_template(doc: &mut Document, vars: &VariableStore, el: NodeId, var: &str) {
    let snippet = doc.inner_html(el);
    doc.clear_children(el);

    let items: Vec<(String, &Value)> = match vars.get(var) {
        Some(Value::List(list)) => list
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        Some(Value::Map(map)) => map.iter().map(|(k, item)| (k.clone(), item)).collect(),
        _ => {
            tracing::debug!("Template variable '{}' is not a list", var);
            Vec::new()
        }
    };

    for (index, (key, item)) in items.into_iter().enumerate() {
        let html = expand_snippet(&snippet, &key, index, item);
        let nodes = doc.parse_fragment(&html);
        doc.append_child(el, nodes);
    }
    doc.remove_attribute(el, TEMPLATE_ATTR);
}

fn view(doc: &mut Document, vars: &VariableStore, loader: &TemplateLoader, el: NodeId, name: &str) {
    if let Some(expr) = doc.attribute(el, IF_ATTR).map(str::to_string) {
        if !condition::evaluate(&expr, vars) {
            tracing::debug!("View '{}' hidden by condition '{}'", name, expr);
            doc.remove(el);
            return;
        }
    }

    match loader.load(name) {
        Ok(content) => {
            let nodes = doc.parse_fragment(&content);
            doc.clear_children(el);
            doc.append_child(el, nodes);
            doc.remove_attribute(el, VIEW_ATTR);
            doc.remove_attribute(el, IF_ATTR);
        }
        Err(err) => {
            tracing::warn!("View '{}' failed: {}", name, err);
            let comment = doc.create_comment(&error_comment("View", &err));
            doc.clear_children(el);
            doc.append_child(el, comment);
        }
    }
}

fn is_form_control(doc: &Document, el: NodeId) -> bool {
    matches!(doc.tag_name(el), Some("input" | "textarea" | "select"))
}

fn bind_model(doc: &mut Document, vars: &VariableStore, el: NodeId, model: &str) {
    match vars.get(model) {
        Some(Value::Map(properties)) => {
            for (property, value) in properties {
                let selector = Selector::Attribute {
                    tag: None,
                    name: BIND_ATTR.to_string(),
                    value: Some(format!("{}.{}", model, property)),
                };
                let text = value.to_output_string();
                for bound in doc.select_all(&selector) {
                    if is_form_control(doc, bound) {
                        doc.set_attribute(bound, "value", &text);
                    } else {
                        doc.set_text(bound, &text);
                    }
                    doc.remove_attribute(bound, BIND_ATTR);
                }
            }
        }
        _ => tracing::debug!("Model '{}' is not a map", model),
    }
    doc.remove_attribute(el, MODEL_ATTR);
}
