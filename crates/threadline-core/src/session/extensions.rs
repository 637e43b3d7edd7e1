//! Side-channel extension state
//!
//! Custom events `{name, props}` are folded into a map of named slots by
//! pure reducers looked up by event name. Every reducer must be idempotent:
//! a re-joined stream replays events the client has already seen.

use crate::stream::CustomEvent;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Progress side-channel emitted by multi-step agents
pub const AGENT_EXECUTION: &str = "agent_execution";

/// Current value of every extension slot, keyed by event name
pub type ExtensionState = BTreeMap<String, Value>;

/// `(previous slot value, event) -> next slot value`
pub type Reducer = Arc<dyn Fn(Option<&Value>, &CustomEvent) -> Value + Send + Sync>;

/// Dispatch table of reducers keyed by event name
#[derive(Clone)]
pub struct ExtensionReducers {
    reducers: HashMap<String, Reducer>,
    fallback: Reducer,
}

impl std::fmt::Debug for ExtensionReducers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionReducers")
            .field("names", &self.reducers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ExtensionReducers {
    fn default() -> Self {
        Self::new().with(AGENT_EXECUTION, replace_props)
    }
}

impl ExtensionReducers {
    /// Empty table; unknown events shallow-merge their props
    pub fn new() -> Self {
        Self {
            reducers: HashMap::new(),
            fallback: Arc::new(merge_props),
        }
    }

    pub fn with<F>(mut self, name: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(Option<&Value>, &CustomEvent) -> Value + Send + Sync + 'static,
    {
        self.reducers.insert(name.into(), Arc::new(reducer));
        self
    }

    /// Fold one event into `state`
    pub fn apply(&self, state: &mut ExtensionState, event: &CustomEvent) {
        let reducer = self.reducers.get(&event.name).unwrap_or(&self.fallback);
        let next = (**reducer)(state.get(&event.name), event);
        state.insert(event.name.clone(), next);
    }

    /// Replay `ui` entries embedded in a values snapshot
    pub fn apply_values_ui(&self, state: &mut ExtensionState, extra: &Map<String, Value>) {
        let Some(Value::Array(entries)) = extra.get("ui") else {
            return;
        };
        for entry in entries {
            if let Ok(event) = serde_json::from_value::<CustomEvent>(entry.clone()) {
                self.apply(state, &event);
            }
        }
    }
}

/// Latest props win
pub fn replace_props(_previous: Option<&Value>, event: &CustomEvent) -> Value {
    event.props.clone()
}

/// Shallow-merge object props into the previous object
pub fn merge_props(previous: Option<&Value>, event: &CustomEvent) -> Value {
    match (previous, &event.props) {
        (Some(Value::Object(prev)), Value::Object(next)) => {
            let mut merged = prev.clone();
            for (key, value) in next {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, props) => props.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, props: Value) -> CustomEvent {
        serde_json::from_value(json!({"name": name, "props": props})).unwrap()
    }

    #[test]
    fn test_agent_execution_replaces() {
        let reducers = ExtensionReducers::default();
        let mut state = ExtensionState::new();

        reducers.apply(&mut state, &event(AGENT_EXECUTION, json!({"agent": "a", "node": "plan"})));
        reducers.apply(&mut state, &event(AGENT_EXECUTION, json!({"agent": "a"})));

        assert_eq!(state[AGENT_EXECUTION], json!({"agent": "a"}));
    }

    #[test]
    fn test_unknown_events_merge_idempotently() {
        let reducers = ExtensionReducers::default();
        let mut state = ExtensionState::new();
        let first = event("scoreboard", json!({"a": 1}));
        let second = event("scoreboard", json!({"b": 2}));

        reducers.apply(&mut state, &first);
        reducers.apply(&mut state, &second);
        let once = state.clone();
        reducers.apply(&mut state, &first);
        reducers.apply(&mut state, &second);

        assert_eq!(state, once);
        assert_eq!(state["scoreboard"], json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_custom_reducer_and_values_ui() {
        let reducers = ExtensionReducers::new().with("counter", |prev, _event| {
            json!(prev.and_then(Value::as_u64).unwrap_or(0).max(1))
        });
        let mut state = ExtensionState::new();
        let extra = json!({
            "ui": [
                {"id": "u1", "name": "counter", "props": {}},
                {"id": "u2", "name": "agent_execution", "props": {"agent": "x", "node": "y"}},
                "garbage"
            ]
        });

        reducers.apply_values_ui(&mut state, extra.as_object().unwrap());

        assert_eq!(state["counter"], json!(1));
        assert_eq!(state[AGENT_EXECUTION]["node"], "y");
    }
}
