//! Attachment selection registry
//!
//! The set of artifact ids the user tagged for inclusion in the next
//! outgoing message. Cloning shares the same registry.

use crate::types::{SelectedMap, SelectionEntry};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SelectionRegistry {
    selected: Arc<RwLock<SelectedMap>>,
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `id`, or deselect it when already selected; returns the new state
    pub fn toggle(&self, id: &str, label: Option<String>) -> bool {
        let mut selected = self.selected.write();
        if selected.remove(id).is_some() {
            false
        } else {
            selected.insert(id.to_string(), SelectionEntry { label });
            true
        }
    }

    pub fn select(&self, id: &str, label: Option<String>) {
        self.selected
            .write()
            .insert(id.to_string(), SelectionEntry { label });
    }

    pub fn deselect(&self, id: &str) -> bool {
        self.selected.write().remove(id).is_some()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.read().contains_key(id)
    }

    /// Replace the whole selection, e.g. when restoring an edited message
    pub fn set(&self, selected: SelectedMap) {
        *self.selected.write() = selected;
    }

    pub fn clear(&self) {
        self.selected.write().clear();
    }

    pub fn snapshot(&self) -> SelectedMap {
        self.selected.read().clone()
    }

    pub fn len(&self) -> usize {
        self.selected.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let registry = SelectionRegistry::new();

        assert!(registry.toggle("plot-1", Some("Revenue".to_string())));
        assert!(registry.is_selected("plot-1"));
        assert_eq!(
            registry.snapshot()["plot-1"].label.as_deref(),
            Some("Revenue")
        );

        assert!(!registry.toggle("plot-1", None));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SelectionRegistry::new();
        let view = registry.clone();

        registry.select("a", None);
        registry.select("b", None);
        assert_eq!(view.len(), 2);

        view.clear();
        assert!(!registry.is_selected("a"));
    }

    #[test]
    fn test_set_replaces() {
        let registry = SelectionRegistry::new();
        registry.select("old", None);

        let mut restored = SelectedMap::new();
        restored.insert("new".to_string(), SelectionEntry::default());
        registry.set(restored);

        assert!(!registry.is_selected("old"));
        assert!(registry.is_selected("new"));
    }
}
