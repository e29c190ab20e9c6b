//! Ordered configuration layers and typed lookups.
//!
//! Layers are consulted at lookup time from highest to lowest precedence
//! (derived, file, defaults). Nothing is merged eagerly, so replacing one
//! layer never leaks values into another.
//!
//! Keys are dotted paths (`resource_files.mandatory`) into nested tables and
//! are case-insensitive. A lookup that misses a leaf in a higher layer falls
//! through to the lower ones, even if the higher layer defines the parent
//! table.

use std::collections::BTreeMap;

use serde::Serialize;

/// A configuration value after type coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    List(Vec<String>),
    Table(BTreeMap<String, Value>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(value: BTreeMap<String, String>) -> Self {
        Value::Table(
            value
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), Value::String(v)))
                .collect(),
        )
    }
}

/// Source of a layer, in ascending precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerKind {
    Defaults,
    File,
    Derived,
}

impl LayerKind {
    /// All kinds, lowest precedence first.
    pub const ALL: [LayerKind; 3] = [LayerKind::Defaults, LayerKind::File, LayerKind::Derived];

    fn index(self) -> usize {
        match self {
            LayerKind::Defaults => 0,
            LayerKind::File => 1,
            LayerKind::Derived => 2,
        }
    }
}

/// One source of values: a tree of tables keyed by lowercased names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    root: BTreeMap<String, Value>,
}

impl Layer {
    /// Build a layer from an already-coerced table, lowercasing every key.
    pub fn from_table(table: BTreeMap<String, Value>) -> Self {
        Self {
            root: lowercase_table(table),
        }
    }

    /// Insert `value` at the dotted `key`, creating intermediate tables.
    ///
    /// A non-table value sitting on the path is replaced by a table.
    pub fn insert(&mut self, key: &str, value: Value) {
        let segments = split_key(key);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut table = &mut self.root;
        for segment in parents {
            let slot = table
                .entry(segment.clone())
                .or_insert_with(|| Value::Table(BTreeMap::new()));
            if !matches!(slot, Value::Table(_)) {
                *slot = Value::Table(BTreeMap::new());
            }
            table = match slot {
                Value::Table(next) => next,
                _ => return,
            };
        }
        let value = match value {
            Value::Table(inner) => Value::Table(lowercase_table(inner)),
            other => other,
        };
        table.insert(last.clone(), value);
    }

    /// Find the value at the dotted `key`, if this layer defines it.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let segments = split_key(key);
        let (last, parents) = segments.split_last()?;
        let mut table = &self.root;
        for segment in parents {
            match table.get(segment)? {
                Value::Table(next) => table = next,
                _ => return None,
            }
        }
        table.get(last)
    }
}

/// The ordered stack of layers behind a resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layers {
    layers: [Layer; 3],
}

impl Layers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    /// Replace a whole layer.
    pub fn replace(&mut self, kind: LayerKind, layer: Layer) {
        self.layers[kind.index()] = layer;
    }

    /// Effective value of `key` and the layer it came from.
    pub fn resolve(&self, key: &str) -> Option<(LayerKind, &Value)> {
        LayerKind::ALL
            .iter()
            .rev()
            .find_map(|kind| self.layer(*kind).lookup(key).map(|value| (*kind, value)))
    }

    /// Effective value of `key`, if any layer defines it.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.resolve(key).map(|(_, value)| value)
    }

    /// String value of `key`; empty when unset.
    ///
    /// A list is joined with single spaces; a table yields an empty string.
    pub fn get(&self, key: &str) -> String {
        match self.lookup(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::List(items)) => items.join(" "),
            Some(Value::Table(_)) | None => String::new(),
        }
    }

    /// List value of `key`; empty when unset.
    ///
    /// A string is split on whitespace; a table yields an empty list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.lookup(key) {
            Some(Value::List(items)) => items.clone(),
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(Value::Table(_)) | None => Vec::new(),
        }
    }

    /// String map value of `key`; empty when unset or not a table.
    ///
    /// Nested tables inside the map are skipped.
    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        let Some(Value::Table(table)) = self.lookup(key) else {
            return BTreeMap::new();
        };
        table
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.clone(), s.clone())),
                Value::List(items) => Some((k.clone(), items.join(" "))),
                Value::Table(_) => None,
            })
            .collect()
    }
}

fn split_key(key: &str) -> Vec<String> {
    key.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn lowercase_table(table: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    table
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Table(inner) => Value::Table(lowercase_table(inner)),
                other => other,
            };
            (k.to_lowercase(), v)
        })
        .collect()
}
