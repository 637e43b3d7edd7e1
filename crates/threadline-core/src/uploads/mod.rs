//! Concurrent file uploads
//!
//! [`UploadManager`] owns the attachments of one composer: files that were
//! already stored (loaded from a message being edited) followed by
//! transfers started from this composer. Items are addressed by a stable
//! key; the index-based operations exist for list renderers.

mod item;

pub use item::{AttachmentItem, AttachmentKind, MAX_PENDING_PROGRESS, UploadTask, advance_progress};

use crate::events::{EventBus, SessionEvent};
use crate::transport::{LocalFile, ProgressSink, UploadTransport};
use crate::types::FileData;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

#[derive(Default)]
struct UploadState {
    existing: Vec<FileData>,
    uploads: Vec<UploadTask>,
    transfers: HashMap<Uuid, AbortHandle>,
}

impl UploadState {
    fn task_mut(&mut self, id: Uuid) -> Option<&mut UploadTask> {
        self.uploads.iter_mut().find(|t| t.id == id)
    }

    /// Keep the abort handle only while the transfer is still pending
    fn track(&mut self, id: Uuid, transfer: AbortHandle) {
        let pending = self
            .uploads
            .iter()
            .any(|t| t.id == id && !t.is_complete());
        if pending && !transfer.is_finished() {
            self.transfers.insert(id, transfer);
        }
    }

    fn remove_task(&mut self, index: usize) -> Option<UploadTask> {
        if index >= self.uploads.len() {
            return None;
        }
        let task = self.uploads.remove(index);
        if let Some(transfer) = self.transfers.remove(&task.id) {
            transfer.abort();
        }
        Some(task)
    }
}

/// Handles of the transfers started by one [`UploadManager::upload_files`] call
#[derive(Debug)]
pub struct UploadBatch {
    keys: Vec<String>,
    handles: Vec<JoinHandle<()>>,
}

impl UploadBatch {
    /// Keys of the created items, in input order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Wait until every transfer has completed, failed or been removed
    pub async fn wait(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Upload state for one composer; clones share it
#[derive(Clone)]
pub struct UploadManager {
    state: Arc<Mutex<UploadState>>,
    transport: Arc<dyn UploadTransport>,
    files_url: Option<String>,
    events: EventBus,
}

impl std::fmt::Debug for UploadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UploadManager")
            .field("existing", &state.existing.len())
            .field("uploads", &state.uploads.len())
            .finish()
    }
}

impl UploadManager {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            state: Arc::new(Mutex::new(UploadState::default())),
            transport,
            files_url: None,
            events: EventBus::default(),
        }
    }

    /// Base URL stored files are served from, used for existing image previews
    pub fn with_files_url(mut self, files_url: Option<String>) -> Self {
        self.files_url = files_url;
        self
    }

    /// A fresh, empty manager sharing this one's transport and settings
    pub fn fresh(&self) -> Self {
        Self {
            state: Arc::new(Mutex::new(UploadState::default())),
            transport: Arc::clone(&self.transport),
            files_url: self.files_url.clone(),
            events: self.events.clone(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Start one independent transfer per file
    ///
    /// Image previews are available as soon as this returns. Must be called
    /// from within a tokio runtime.
    pub fn upload_files(&self, files: Vec<LocalFile>) -> UploadBatch {
        let mut keys = Vec::with_capacity(files.len());
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let task = UploadTask::new(&file);
            let id = task.id;
            keys.push(task.key());
            tracing::debug!(upload = %id, name = %task.name, size = file.len(), "upload queued");
            self.state.lock().uploads.push(task);

            let manager = self.clone();
            let handle = tokio::spawn(async move { manager.transfer(id, file).await });
            self.state.lock().track(id, handle.abort_handle());
            handles.push(handle);
        }

        UploadBatch { keys, handles }
    }

    async fn transfer(self, id: Uuid, file: LocalFile) {
        let name = file.name.clone();
        let progress: ProgressSink = {
            let state = Arc::clone(&self.state);
            Arc::new(move |fraction| {
                if let Some(task) = state.lock().task_mut(id) {
                    task.progress = advance_progress(task.progress, fraction);
                }
            })
        };

        let result = self.transport.upload(file, progress).await;
        let key = format!("upload:{}", id);
        let mut state = self.state.lock();
        state.transfers.remove(&id);
        match result {
            Ok(data) => {
                let Some(task) = state.task_mut(id) else {
                    return;
                };
                tracing::info!(upload = %id, path = %data.path, "upload completed");
                task.progress = 100;
                task.data = Some(data.clone());
                drop(state);
                self.events.publish(SessionEvent::UploadCompleted {
                    key,
                    path: data.path,
                });
            }
            Err(error) => {
                let before = state.uploads.len();
                state.uploads.retain(|t| t.id != id);
                if state.uploads.len() == before {
                    return;
                }
                drop(state);
                tracing::warn!(upload = %id, name = %name, %error, "upload failed, removing attachment");
                self.events.publish(SessionEvent::UploadFailed {
                    key,
                    file_name: name,
                    message: error.to_string(),
                });
            }
        }
    }

    /// Unified list: existing files first, then uploads
    pub fn items(&self) -> Vec<AttachmentItem> {
        let state = self.state.lock();
        state
            .existing
            .iter()
            .map(|f| AttachmentItem::existing(f, self.files_url.as_deref()))
            .chain(state.uploads.iter().map(AttachmentItem::upload))
            .collect()
    }

    pub fn uploads(&self) -> Vec<UploadTask> {
        self.state.lock().uploads.clone()
    }

    pub fn existing(&self) -> Vec<FileData> {
        self.state.lock().existing.clone()
    }

    pub fn set_existing(&self, files: Vec<FileData>) {
        self.state.lock().existing = files;
    }

    /// Remove the upload at `index` among uploads only, cancelling its transfer
    pub fn remove_upload(&self, index: usize) -> bool {
        self.state.lock().remove_task(index).is_some()
    }

    /// Remove the item at `index` of [`items`](Self::items)
    pub fn remove_item(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        let existing = state.existing.len();
        if index < existing {
            state.existing.remove(index);
            true
        } else {
            state.remove_task(index - existing).is_some()
        }
    }

    pub fn remove_by_key(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        if let Some(path) = key.strip_prefix("existing:") {
            let before = state.existing.len();
            state.existing.retain(|f| f.path != path);
            return state.existing.len() != before;
        }
        let index = state.uploads.iter().position(|t| t.key() == key);
        match index {
            Some(index) => state.remove_task(index).is_some(),
            None => false,
        }
    }

    /// Existing files followed by completed uploads, in list order
    pub fn all_file_data(&self) -> Vec<FileData> {
        let state = self.state.lock();
        state
            .existing
            .iter()
            .cloned()
            .chain(
                state
                    .uploads
                    .iter()
                    .filter(|t| t.is_complete())
                    .filter_map(|t| t.data.clone()),
            )
            .collect()
    }

    /// Any transfer still waiting for the server
    pub fn is_uploading(&self) -> bool {
        self.state.lock().uploads.iter().any(|t| !t.is_complete())
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.existing.is_empty() && state.uploads.is_empty()
    }

    /// Drop every item and cancel in-flight transfers
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for (_, transfer) in state.transfers.drain() {
            transfer.abort();
        }
        state.uploads.clear();
        state.existing.clear();
    }
}
