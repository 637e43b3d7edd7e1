//! CLI commands

pub mod chat;
pub mod history;
pub mod send;

use crate::console::CliConsole;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use threadline_core::events::{EventFilter, FilteredSubscriber, SessionEvent};
use threadline_core::session::SessionOptions;
use threadline_core::transport::LocalFile;
use threadline_core::{
    ArtifactResolver, ClientConfig, CompositionContext, HttpAgentClient, HttpUploader,
    SessionManager, UploadManager,
};

/// HTTP clients built once from the configuration
pub struct Backend {
    config: ClientConfig,
    agent: Arc<HttpAgentClient>,
    uploader: Arc<HttpUploader>,
}

impl Backend {
    pub fn connect(config: ClientConfig) -> anyhow::Result<Self> {
        let agent = HttpAgentClient::new(&config).context("creating agent client")?;
        let uploader = HttpUploader::new(&config).context("creating upload client")?;
        tracing::debug!(api_url = %config.api_url, upload = %config.upload_endpoint(), "backend ready");
        Ok(Self {
            config,
            agent: Arc::new(agent),
            uploader: Arc::new(uploader),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self, options: SessionOptions) -> SessionManager {
        SessionManager::new(self.agent.clone(), options)
    }

    pub fn composer(&self) -> CompositionContext {
        let uploads =
            UploadManager::new(self.uploader.clone()).with_files_url(self.config.files_url.clone());
        CompositionContext::new(uploads).with_auto_approve(self.config.auto_approve)
    }

    pub fn resolver(&self) -> ArtifactResolver {
        ArtifactResolver::new(self.agent.clone(), self.config.api_url.clone())
    }
}

/// Read files from disk and upload them with progress bars
///
/// Returns how many uploads succeeded; failures are reported and dropped
/// from the attachment list.
pub async fn attach(
    console: &CliConsole,
    uploads: &UploadManager,
    paths: &[PathBuf],
) -> anyhow::Result<usize> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        files.push(file);
    }
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();

    let mut failures = FilteredSubscriber::new(
        uploads.events(),
        EventFilter::new().only_types(vec!["upload_failed"]),
    );
    let batch = uploads.upload_files(files);
    let keys = batch.keys().to_vec();
    let bars = console.upload_bars(&names);

    let mut ticker = tokio::time::interval(Duration::from_millis(80));
    loop {
        ticker.tick().await;
        let items = uploads.items();
        let mut pending = false;
        for (index, key) in keys.iter().enumerate() {
            match items.iter().find(|item| &item.key == key) {
                Some(item) if item.data.is_some() => bars.finish(index, &names[index]),
                Some(item) => {
                    bars.set(index, item.progress);
                    pending = true;
                }
                None => bars.finish(index, &format!("{} (failed)", names[index])),
            }
        }
        if !pending {
            break;
        }
    }
    batch.wait().await;

    let mut failed = 0;
    for event in failures.drain() {
        if let SessionEvent::UploadFailed {
            file_name, message, ..
        } = event
        {
            console.warn(&format!("Upload of {} failed: {}", file_name, message));
            failed += 1;
        }
    }
    Ok(keys.len().saturating_sub(failed))
}
