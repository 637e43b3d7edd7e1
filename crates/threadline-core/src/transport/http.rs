//! HTTP client for the agent backend

use super::{AgentTransport, ArtifactStore, RunRequest, StoreItem};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::stream::{EventStream, decode_event_stream};
use crate::types::ThreadState;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct CreatedThread {
    thread_id: String,
}

#[derive(Debug, Deserialize)]
struct StoreRecord {
    value: StoreItem,
}

/// Agent backend and artifact store over HTTP
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: Client,
    api_url: String,
}

impl HttpAgentClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, &config.api_url))
    }

    pub fn with_client(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

/// Map a non-success response to an HTTP error carrying the body
pub(crate) async fn check_status(response: Response, what: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), %body, "{} failed", what);
    Err(ClientError::http(
        format!("{} failed with {}: {}", what, status, body.trim()),
        Some(status.as_u16()),
    ))
}

#[async_trait]
impl AgentTransport for HttpAgentClient {
    async fn create_thread(&self) -> ClientResult<String> {
        let response = self
            .client
            .post(self.url("/threads"))
            .json(&json!({}))
            .send()
            .await?;
        let created: CreatedThread = check_status(response, "create thread").await?.json().await?;
        tracing::debug!(thread_id = %created.thread_id, "thread created");
        Ok(created.thread_id)
    }

    async fn stream_run(&self, thread_id: &str, request: RunRequest) -> ClientResult<EventStream> {
        let response = self
            .client
            .post(self.url(&format!("/threads/{}/runs/stream", thread_id)))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "start run").await?;
        Ok(decode_event_stream(response.bytes_stream()))
    }

    async fn join_run(&self, thread_id: &str, run_id: &str) -> ClientResult<EventStream> {
        let response = self
            .client
            .get(self.url(&format!("/threads/{}/runs/{}/stream", thread_id, run_id)))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response, "join run").await?;
        Ok(decode_event_stream(response.bytes_stream()))
    }

    async fn history(&self, thread_id: &str, limit: usize) -> ClientResult<Vec<ThreadState>> {
        let response = self
            .client
            .post(self.url(&format!("/threads/{}/history", thread_id)))
            .json(&json!({ "limit": limit }))
            .send()
            .await?;
        let states: Vec<ThreadState> = check_status(response, "fetch history").await?.json().await?;
        Ok(states)
    }
}

#[async_trait]
impl ArtifactStore for HttpAgentClient {
    async fn get_item(&self, namespace: &str, key: &str) -> ClientResult<Option<StoreItem>> {
        let response = self
            .client
            .get(self.url("/store/items"))
            .query(&[("namespace", namespace), ("key", key)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = check_status(response, "fetch artifact").await?.text().await?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        let record: StoreRecord = serde_json::from_str(&body)?;
        Ok(Some(record.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_is_normalized() {
        let client = HttpAgentClient::with_client(Client::new(), "http://localhost:2024/");
        assert_eq!(client.api_url(), "http://localhost:2024");
        assert_eq!(client.url("/threads"), "http://localhost:2024/threads");
    }
}
