//! Evaluation environment: the constant bindings visible to one condition.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::Value;

/// A flat, single-scope environment. One is created per evaluation and
/// dropped afterwards.
#[derive(Debug, Default)]
pub struct Environment {
    values: FxHashMap<SmolStr, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a constant. Redefinition replaces the previous value.
    pub fn define(&mut self, name: SmolStr, value: Value) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
