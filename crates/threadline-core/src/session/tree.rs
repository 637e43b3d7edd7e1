//! Checkpoint tree built from thread history

use crate::types::{CheckpointId, CheckpointRef, ThreadState};
use std::collections::{HashMap, HashSet};

/// Per-message branch information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMeta {
    /// Checkpoint on the active path where the message first appears
    pub branch: CheckpointId,
    /// Sibling checkpoints at the same fork, oldest first; includes `branch`
    pub branch_options: Vec<CheckpointId>,
    /// Checkpoint to resubmit from when regenerating or editing the message
    pub parent_checkpoint: Option<CheckpointRef>,
}

impl BranchMeta {
    /// Zero-based index of the active branch, if the metadata is consistent
    pub fn index(&self) -> Option<usize> {
        self.branch_options.iter().position(|id| id == &self.branch)
    }
}

/// All known checkpoints of a thread with the user's branch choices
///
/// Children of a checkpoint are ordered by creation, oldest first. Where
/// no explicit choice was made the newest child is followed.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTree {
    states: HashMap<CheckpointId, ThreadState>,
    children: HashMap<Option<CheckpointId>, Vec<CheckpointId>>,
    selected: HashMap<Option<CheckpointId>, CheckpointId>,
    newest: Option<CheckpointId>,
}

impl CheckpointTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from history as the backend returns it, newest first
    pub fn from_history(history: Vec<ThreadState>) -> Self {
        let mut tree = Self::new();
        tree.replace_history(history);
        tree
    }

    /// Replace all states, keeping branch choices that still resolve
    pub fn replace_history(&mut self, history: Vec<ThreadState>) {
        self.newest = history.first().map(|s| s.id().clone());
        self.states.clear();
        self.children.clear();

        let known: HashSet<CheckpointId> = history.iter().map(|s| s.id().clone()).collect();
        for mut state in history.into_iter().rev() {
            for message in &mut state.values.messages {
                message.ensure_id();
            }
            let id = state.id().clone();
            if self.states.contains_key(&id) {
                continue;
            }
            // States whose parent fell outside the fetched window become roots
            let parent = state.parent_id().filter(|p| known.contains(*p)).cloned();
            self.children.entry(parent).or_default().push(id.clone());
            self.states.insert(id, state);
        }

        let states = &self.states;
        self.selected.retain(|parent, child| {
            states.contains_key(child) && parent.as_ref().is_none_or(|p| states.contains_key(p))
        });
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn get(&self, id: &CheckpointId) -> Option<&ThreadState> {
        self.states.get(id)
    }

    /// Most recently created checkpoint
    pub fn newest(&self) -> Option<&CheckpointId> {
        self.newest.as_ref()
    }

    /// Children of `parent` (`None` for roots), oldest first
    pub fn children(&self, parent: Option<&CheckpointId>) -> &[CheckpointId] {
        self.children
            .get(&parent.cloned())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Make `id` part of the active path by choosing it at every ancestor fork
    pub fn select(&mut self, id: &CheckpointId) -> bool {
        if !self.states.contains_key(id) {
            return false;
        }
        let mut current = id.clone();
        loop {
            let parent = self.parent_key(&current);
            self.selected.insert(parent.clone(), current);
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        true
    }

    fn parent_key(&self, id: &CheckpointId) -> Option<CheckpointId> {
        self.states
            .get(id)
            .and_then(|s| s.parent_id())
            .filter(|p| self.states.contains_key(*p))
            .cloned()
    }

    /// Select the newest checkpoint's lineage
    pub fn follow_newest(&mut self) -> bool {
        match self.newest.clone() {
            Some(id) => self.select(&id),
            None => false,
        }
    }

    /// Root-to-leaf walk following the current choices
    pub fn active_path(&self) -> Vec<&ThreadState> {
        let mut path = Vec::new();
        let mut parent: Option<CheckpointId> = None;
        while let Some(id) = self.choose(parent.as_ref()) {
            let Some(state) = self.states.get(id) else {
                break;
            };
            path.push(state);
            parent = Some(id.clone());
        }
        path
    }

    /// Leaf of the active path
    pub fn head(&self) -> Option<&ThreadState> {
        self.active_path().last().copied()
    }

    fn choose(&self, parent: Option<&CheckpointId>) -> Option<&CheckpointId> {
        let children = self.children(parent);
        let chosen = self.selected.get(&parent.cloned());
        match chosen {
            Some(id) if children.contains(id) => Some(id),
            _ => children.last(),
        }
    }

    /// Branch metadata for every message visible on the active path
    pub fn branch_metadata(&self) -> HashMap<String, BranchMeta> {
        let mut metadata = HashMap::new();
        for state in self.active_path() {
            for message in &state.values.messages {
                if metadata.contains_key(&message.id) {
                    continue;
                }
                metadata.insert(
                    message.id.clone(),
                    BranchMeta {
                        branch: state.id().clone(),
                        branch_options: self
                            .children(self.parent_key(state.id()).as_ref())
                            .to_vec(),
                        parent_checkpoint: state.parent_checkpoint.clone(),
                    },
                );
            }
        }
        metadata
    }
}
