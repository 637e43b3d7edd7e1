//! Controllable upload endpoint

use crate::error::{ClientError, ClientResult};
use crate::transport::{LocalFile, ProgressSink, UploadTransport};
use crate::types::FileData;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
enum Behavior {
    Fail(String),
    Hold(Arc<Notify>),
}

#[derive(Debug, Default)]
struct UploaderState {
    behaviors: HashMap<String, Behavior>,
    uploaded: Vec<String>,
    counter: u64,
}

/// Upload endpoint whose outcome is scripted per file name
///
/// Every upload reports half and then full transfer progress. Unscripted
/// files succeed with path `files/<name>`.
#[derive(Debug, Clone, Default)]
pub struct FakeUploader {
    state: Arc<Mutex<UploaderState>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, name: &str, message: impl Into<String>) {
        self.state
            .lock()
            .behaviors
            .insert(name.to_string(), Behavior::Fail(message.into()));
    }

    /// Hold `name` after its progress reports until the returned handle is notified
    pub fn hold(&self, name: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.state
            .lock()
            .behaviors
            .insert(name.to_string(), Behavior::Hold(Arc::clone(&release)));
        release
    }

    /// Names of files that completed successfully
    pub fn uploaded(&self) -> Vec<String> {
        self.state.lock().uploaded.clone()
    }
}

#[async_trait]
impl UploadTransport for FakeUploader {
    async fn upload(&self, file: LocalFile, progress: ProgressSink) -> ClientResult<FileData> {
        let behavior = self.state.lock().behaviors.get(&file.name).cloned();
        progress(0.5);
        progress(1.0);

        match behavior {
            Some(Behavior::Fail(message)) => return Err(ClientError::upload(&file.name, message)),
            Some(Behavior::Hold(release)) => release.notified().await,
            None => {}
        }

        let mut state = self.state.lock();
        state.counter += 1;
        state.uploaded.push(file.name.clone());
        let data = FileData::new(format!("files/{}", file.name));
        Ok(if file.is_image() {
            data.with_file_id(format!("img-{}", state.counter))
        } else {
            data
        })
    }
}
