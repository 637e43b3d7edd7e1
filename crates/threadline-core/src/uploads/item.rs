//! Upload tasks and the unified attachment view

use crate::transport::LocalFile;
use crate::types::FileData;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

/// Highest progress shown before the server has answered
pub const MAX_PENDING_PROGRESS: u8 = 95;

/// Next progress value for a transfer reporting `fraction`
///
/// Never decreases and never reaches 100 on transfer progress alone.
pub fn advance_progress(current: u8, fraction: f32) -> u8 {
    let reported = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
    current.max(reported.min(MAX_PENDING_PROGRESS))
}

/// One in-flight or completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub id: Uuid,
    pub name: String,
    pub mime: String,
    /// 0..=100
    pub progress: u8,
    /// `data:` URL for images, computed before the transfer starts
    pub preview: Option<String>,
    /// Set once the server returned the stored file reference
    pub data: Option<FileData>,
}

impl UploadTask {
    pub fn new(file: &LocalFile) -> Self {
        let preview = file
            .is_image()
            .then(|| format!("data:{};base64,{}", file.mime, STANDARD.encode(&file.bytes)));
        Self {
            id: Uuid::new_v4(),
            name: file.name.clone(),
            mime: file.mime.clone(),
            progress: 0,
            preview,
            data: None,
        }
    }

    pub fn key(&self) -> String {
        format!("upload:{}", self.id)
    }

    pub fn is_complete(&self) -> bool {
        self.progress == 100 && self.data.is_some()
    }
}

/// Where an attachment item comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Already stored, e.g. loaded from a message being edited
    Existing,
    Upload,
}

/// Normalized view over existing files and uploads
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentItem {
    /// `existing:<path>` or `upload:<uuid>`
    pub key: String,
    pub kind: AttachmentKind,
    pub name: String,
    pub progress: u8,
    pub preview: Option<String>,
    pub data: Option<FileData>,
}

impl AttachmentItem {
    pub fn existing(file: &FileData, files_url: Option<&str>) -> Self {
        let preview = match (file.is_image(), files_url) {
            (true, Some(base)) => Some(format!("{}/{}", base.trim_end_matches('/'), file.path)),
            _ => None,
        };
        Self {
            key: format!("existing:{}", file.path),
            kind: AttachmentKind::Existing,
            name: file.display_name().to_string(),
            progress: 100,
            preview,
            data: Some(file.clone()),
        }
    }

    pub fn upload(task: &UploadTask) -> Self {
        Self {
            key: task.key(),
            kind: AttachmentKind::Upload,
            name: task.name.clone(),
            progress: task.progress,
            preview: task.preview.clone(),
            data: task.data.clone(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.preview.is_some()
    }
}
