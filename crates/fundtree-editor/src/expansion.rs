use std::collections::HashSet;

use fundtree_core::{is_clone, Forest};

/// Per-node collapse state layered over a default derived from the node id.
///
/// Clones start collapsed (when `collapse_clones` is set) and everything else
/// starts expanded. Only nodes the user toggled away from their default are
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionState {
    collapse_clones: bool,
    toggled: HashSet<String>,
}

impl Default for ExpansionState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ExpansionState {
    pub fn new(collapse_clones: bool) -> Self {
        Self {
            collapse_clones,
            toggled: HashSet::new(),
        }
    }

    pub fn collapsed_by_default(&self, id: &str) -> bool {
        self.collapse_clones && is_clone(id)
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed_by_default(id) != self.toggled.contains(id)
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.toggled.remove(id) {
            self.toggled.insert(id.to_string());
        }
    }

    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) {
        if collapsed == self.collapsed_by_default(id) {
            self.toggled.remove(id);
        } else {
            self.toggled.insert(id.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.toggled.clear();
    }

    /// Forget toggles for nodes that no longer exist.
    pub fn retain_present(&mut self, forest: &Forest) {
        let ids = forest.all_ids();
        self.toggled.retain(|id| ids.contains(id.as_str()));
    }
}
