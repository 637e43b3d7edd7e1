//! Run progress indicators derived from the session snapshot

use crate::config::{ClientConfig, ProgressLabels};
use crate::session::{AGENT_EXECUTION, SessionSnapshot};
use crate::types::Role;
use std::collections::BTreeMap;

/// A tool the agent is currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolActivity {
    pub name: String,
    /// Human readable name, when one is configured
    pub label: Option<String>,
}

/// Maps side-channel progress and tool calls to display labels
#[derive(Debug, Clone, Default)]
pub struct AgentProgress {
    labels: ProgressLabels,
    tools: BTreeMap<String, String>,
}

impl AgentProgress {
    pub fn new(labels: ProgressLabels, tools: BTreeMap<String, String>) -> Self {
        Self { labels, tools }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.progress_labels.clone(), config.tool_labels.clone())
    }

    /// Label for the latest `agent_execution` step, if the agent and node are known
    pub fn label(&self, snapshot: &SessionSnapshot) -> Option<&str> {
        let step = snapshot.extensions.get(AGENT_EXECUTION)?;
        let agent = step.get("agent")?.as_str()?;
        let node = step.get("node")?.as_str()?;
        self.labels.get(agent)?.get(node).map(String::as_str)
    }

    /// Waiting for the agent's first output after a human or tool turn
    pub fn is_thinking(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.is_loading
            && snapshot
                .last_message()
                .is_some_and(|m| m.role != Role::Ai)
    }

    /// The tool requested by the last AI message, while no interrupt blocks it
    pub fn executing_tool(&self, snapshot: &SessionSnapshot) -> Option<ToolActivity> {
        if snapshot.interrupt.is_some() {
            return None;
        }
        let call = snapshot.last_message()?.tool_calls.first()?;
        Some(ToolActivity {
            name: call.name.clone(),
            label: self.tools.get(&call.name).cloned(),
        })
    }
}
