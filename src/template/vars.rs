//! Variable store - the rendering context for placeholders and directives

use indexmap::IndexMap;

/// A value in the variable store
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Convert to string for output. Lists and maps have no textual form.
    pub fn to_output_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// Check if the value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty() && s != "0",
            Value::List(list) => !list.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Get a child by map key or list index
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::List(list) => key.parse::<usize>().ok().and_then(|idx| list.get(idx)),
            _ => None,
        }
    }

    /// Walk a dotted path below this value
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.get_property(segment))
    }

    /// Loose equality: numeric strings compare as numbers, booleans compare by
    /// truthiness, and null equals any falsy scalar.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == other.is_truthy(),
            (Value::Null, other) | (other, Value::Null) => match other {
                Value::String(s) => s.is_empty(),
                Value::Number(n) => *n == 0.0,
                Value::List(list) => list.is_empty(),
                Value::Map(map) => map.is_empty(),
                _ => false,
            },
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                match parse_number(s) {
                    Some(parsed) => parsed == *n,
                    None => format_number(*n) == *s,
                }
            }
            (Value::String(a), Value::String(b)) => match (parse_number(a), parse_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (a, b) => a == b,
        }
    }

    /// Convert from serde_json::Value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => Value::List(arr.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(list) => serde_json::Value::Array(list.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert any serializable value
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Self {
        serde_json::to_value(value)
            .map(|json| Value::from_json(&json))
            .unwrap_or(Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

/// A source of template variables, such as a loaded record
pub trait DataModel {
    /// A single attribute by name
    fn attribute(&self, key: &str) -> Option<Value>;

    /// Every attribute, in a stable order
    fn attributes(&self) -> IndexMap<String, Value>;
}

impl DataModel for IndexMap<String, Value> {
    fn attribute(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn attributes(&self) -> IndexMap<String, Value> {
        self.clone()
    }
}

/// Accumulating key-value store with dotted-path lookup
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: IndexMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a data model
    pub fn from_model(model: &dyn DataModel) -> Self {
        let mut store = Self::new();
        store.merge(model.attributes());
        store
    }

    /// Set a top-level variable, replacing any previous value
    pub fn assign<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.variables.insert(key.to_string(), value.into());
    }

    /// Shallow merge: each top-level key overwrites the stored one
    pub fn merge(&mut self, values: IndexMap<String, Value>) {
        for (key, value) in values {
            self.variables.insert(key, value);
        }
    }

    /// Set a nested value using dot notation (e.g. "page.title"),
    /// creating intermediate maps as needed
    pub fn assign_path<V: Into<Value>>(&mut self, path: &str, value: V) {
        let parts: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };
        if parents.is_empty() {
            self.assign(path, value);
            return;
        }

        let mut current = self
            .variables
            .entry(parents[0].to_string())
            .or_insert_with(|| Value::Map(IndexMap::new()));
        for &part in &parents[1..] {
            if !matches!(current, Value::Map(_)) {
                *current = Value::Map(IndexMap::new());
            }
            current = match current {
                Value::Map(map) => map
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Map(IndexMap::new())),
                _ => return,
            };
        }
        if !matches!(current, Value::Map(_)) {
            *current = Value::Map(IndexMap::new());
        }
        if let Value::Map(map) = current {
            map.insert(last.to_string(), value.into());
        }
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let root = self.variables.get(head)?;
        match rest {
            Some(rest) => root.get_path(rest),
            None => Some(root),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Resolve a dotted path to text; missing paths and lists/maps give ""
    pub fn resolve(&self, path: &str) -> String {
        self.get(path.trim())
            .map(Value::to_output_string)
            .unwrap_or_default()
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }
}

impl DataModel for VariableStore {
    fn attribute(&self, key: &str) -> Option<Value> {
        self.variables.get(key).cloned()
    }

    fn attributes(&self) -> IndexMap<String, Value> {
        self.variables.clone()
    }
}
