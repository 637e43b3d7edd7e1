//! Pre-scripted demo playlist

use crate::types::{FileData, HumanTurn, Message, Role};
use serde::{Deserialize, Serialize};

const DEFAULT_STEPS: usize = 10;

fn default_steps() -> usize {
    DEFAULT_STEPS
}

/// Opening message of a demo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoMessage {
    pub message: String,
    pub attachments: Vec<FileData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoItem {
    pub id: String,
    #[serde(default)]
    pub json_data: DemoMessage,
    /// AI turns the demo may take before it counts as finished
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub sorting: i64,
    #[serde(default)]
    pub active: bool,
}

impl DemoItem {
    /// The turn auto-typed into the conversation
    pub fn opening_turn(&self) -> HumanTurn {
        HumanTurn::text(self.json_data.message.clone())
            .with_files(self.json_data.attachments.clone())
    }

    /// More AI turns than the step budget allows
    pub fn is_finished(&self, messages: &[Message]) -> bool {
        messages.iter().filter(|m| m.role == Role::Ai).count() > self.steps
    }
}

/// Demo items ordered by `sorting`
#[derive(Debug, Clone, Default)]
pub struct DemoPlaylist {
    items: Vec<DemoItem>,
}

impl DemoPlaylist {
    pub fn new(mut items: Vec<DemoItem>) -> Self {
        items.sort_by_key(|item| item.sorting);
        Self { items }
    }

    pub fn items(&self) -> &[DemoItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&DemoItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Next active item after `current`, wrapping around; `None` when nothing is active
    pub fn next_active(&self, current: usize) -> Option<usize> {
        let len = self.items.len();
        (1..=len)
            .map(|offset| (current + offset) % len)
            .find(|&index| self.items[index].active)
    }
}
