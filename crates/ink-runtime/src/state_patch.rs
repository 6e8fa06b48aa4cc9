use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

/// Pending writes layered over a [`crate::StoryState`].
///
/// Reads consult the patch first. Applying the patch commits it; dropping it
/// discards everything written since it was opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub(crate) globals: BTreeMap<String, Value>,
    pub(crate) changed_variables: BTreeSet<String>,
    pub(crate) visit_counts: BTreeMap<String, i32>,
    pub(crate) turn_indices: BTreeMap<String, i32>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn add_changed_variable(&mut self, name: &str) {
        self.changed_variables.insert(name.to_string());
    }

    pub fn visit_count(&self, container_path: &str) -> Option<i32> {
        self.visit_counts.get(container_path).copied()
    }

    pub fn set_visit_count(&mut self, container_path: &str, count: i32) {
        self.visit_counts.insert(container_path.to_string(), count);
    }

    pub fn turn_index(&self, container_path: &str) -> Option<i32> {
        self.turn_indices.get(container_path).copied()
    }

    pub fn set_turn_index(&mut self, container_path: &str, turn: i32) {
        self.turn_indices.insert(container_path.to_string(), turn);
    }
}
