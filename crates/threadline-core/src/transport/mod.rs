//! Backend seams
//!
//! The session engine talks to the agent backend, the artifact store and
//! the upload endpoint only through these traits. [`HttpAgentClient`] and
//! [`HttpUploader`] are the production implementations.

mod http;
mod request;
mod upload;

pub use http::HttpAgentClient;
pub use request::{RunCommand, RunInput, RunRequest};
pub use upload::{HttpUploader, LocalFile};

use crate::error::ClientResult;
use crate::stream::EventStream;
use crate::types::{FileData, ThreadState};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Agent backend operations the session engine needs
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Create an empty thread and return its id
    async fn create_thread(&self) -> ClientResult<String>;

    /// Start a run and stream its events
    async fn stream_run(&self, thread_id: &str, request: RunRequest) -> ClientResult<EventStream>;

    /// Re-attach to a run that is still executing
    async fn join_run(&self, thread_id: &str, run_id: &str) -> ClientResult<EventStream>;

    /// Checkpoint history, newest first
    async fn history(&self, thread_id: &str, limit: usize) -> ClientResult<Vec<ThreadState>>;
}

/// A stored artifact value
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreItem {
    /// MIME type of `data`
    #[serde(rename = "type", default)]
    pub mime: String,
    #[serde(default)]
    pub data: Value,
}

/// Key/value artifact store
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(None)` when the key does not exist
    async fn get_item(&self, namespace: &str, key: &str) -> ClientResult<Option<StoreItem>>;
}

/// Transfer progress as a fraction in `0.0..=1.0`
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// Blob upload endpoint, one file per call
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, file: LocalFile, progress: ProgressSink) -> ClientResult<FileData>;
}
