//! Multipart uploads with byte-level progress

use super::http::check_status;
use super::{ProgressSink, UploadTransport};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::FileData;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const CHUNK_SIZE: usize = 64 * 1024;

/// A file picked by the user, read into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::invalid_input(format!("not a file: {}", path.display())))?;
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self { name, mime, bytes })
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Uploads to the blob endpoint as `multipart/form-data` field `file`
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.upload_endpoint()))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UploadTransport for HttpUploader {
    async fn upload(&self, file: LocalFile, progress: ProgressSink) -> ClientResult<FileData> {
        let total = file.bytes.len() as u64;
        let sent = Arc::new(AtomicU64::new(0));
        let chunks: Vec<Vec<u8>> = file.bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();

        let body = futures::stream::iter(chunks).map(move |chunk| {
            let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            if total > 0 {
                progress(done as f32 / total as f32);
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ClientError::upload(&file.name, e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::upload(&file.name, e.to_string()))?;
        let response = check_status(response, "upload").await?;
        let data: FileData = response
            .json()
            .await
            .map_err(|e| ClientError::upload(&file.name, e.to_string()))?;
        tracing::debug!(upload = %file.name, path = %data.path, "upload stored");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        tokio::fs::write(&path, b"\x89PNG").await.unwrap();

        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "chart.png");
        assert_eq!(file.mime, "image/png");
        assert!(file.is_image());
        assert_eq!(file.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = LocalFile::from_path("/nonexistent/file.pdf").await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    }
}
