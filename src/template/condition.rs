//! Condition expressions for the `data-if` attribute
//!
//! Grammar:
//! - `name` / `a.b` - truthiness of the variable
//! - `!name` - negated truthiness
//! - `left==right`, `left!=right` - loose comparison; each side is looked up
//!   as a variable first and falls back to its literal text
//!
//! Anything else is false.

use super::vars::{Value, VariableStore};

/// A parsed `data-if` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Truthy(String),
    Falsy(String),
    Equals(String, String),
    NotEquals(String, String),
    Invalid,
}

fn is_variable_path(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

impl Condition {
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        if let Some((left, right)) = expr.split_once("!=") {
            return Condition::NotEquals(left.trim().to_string(), right.trim().to_string());
        }
        if let Some((left, right)) = expr.split_once("==") {
            return Condition::Equals(left.trim().to_string(), right.trim().to_string());
        }
        if let Some(rest) = expr.strip_prefix('!') {
            let rest = rest.trim();
            if is_variable_path(rest) {
                return Condition::Falsy(rest.to_string());
            }
            return Condition::Invalid;
        }
        if is_variable_path(expr) {
            return Condition::Truthy(expr.to_string());
        }
        Condition::Invalid
    }

    pub fn evaluate(&self, vars: &VariableStore) -> bool {
        match self {
            Condition::Truthy(name) => vars.get(name).is_some_and(Value::is_truthy),
            Condition::Falsy(name) => !vars.get(name).is_some_and(Value::is_truthy),
            Condition::Equals(left, right) => operand(vars, left).loose_eq(&operand(vars, right)),
            Condition::NotEquals(left, right) => {
                !operand(vars, left).loose_eq(&operand(vars, right))
            }
            Condition::Invalid => false,
        }
    }
}

/// Look an operand up as a variable, falling back to its literal text
fn operand(vars: &VariableStore, text: &str) -> Value {
    if let Some(value) = vars.get(text) {
        return value.clone();
    }
    let literal = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(text);
    Value::String(literal.to_string())
}

/// Evaluate a condition string against the store
pub fn evaluate(expr: &str, vars: &VariableStore) -> bool {
    Condition::parse(expr).evaluate(vars)
}
