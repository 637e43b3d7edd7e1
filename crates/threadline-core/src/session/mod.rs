//! Session engine
//!
//! [`SessionManager`] owns the conversation: it applies optimistic edits,
//! merges streamed deltas by message id, tracks the pending interrupt and
//! the sticky error, and projects the active branch of the checkpoint tree.

mod extensions;
mod manager;
mod merge;
mod state;
mod tree;

pub use extensions::{
    AGENT_EXECUTION, ExtensionReducers, ExtensionState, Reducer, merge_props, replace_props,
};
pub use manager::{OptimisticUpdate, RunHandle, SessionManager, SessionOptions, SubmitOptions};
pub use merge::{append_chunk, replace_all, upsert};
pub use state::{SessionError, SessionErrorKind, SessionSnapshot};
pub use tree::{BranchMeta, CheckpointTree};

#[cfg(test)]
mod tests;
