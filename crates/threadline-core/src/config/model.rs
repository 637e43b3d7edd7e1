//! Client configuration model

use super::logging::LoggingConfig;
use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Agent node -> progress label, grouped by agent
pub type ProgressLabels = BTreeMap<String, BTreeMap<String, String>>;

/// Reveal pacing bounds for the typewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypewriterConfig {
    pub min_chunk: usize,
    pub max_chunk: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            min_chunk: 10,
            max_chunk: 20,
            min_delay_ms: 20,
            max_delay_ms: 60,
        }
    }
}

impl TypewriterConfig {
    pub fn validate(&self) -> ClientResult<()> {
        if self.min_chunk == 0 || self.min_chunk > self.max_chunk {
            return Err(ClientError::config(format!(
                "typewriter chunk bounds must satisfy 0 < min <= max, got {}..={}",
                self.min_chunk, self.max_chunk
            )));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ClientError::config(format!(
                "typewriter delay bounds must satisfy min <= max, got {}..={}",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Agent backend base URL
    pub api_url: String,
    /// Graph/assistant the runs are created against
    pub assistant_id: String,
    /// Multipart upload endpoint; defaults to `{api_url}/upload`
    pub upload_url: Option<String>,
    /// Base URL uploaded files are served from
    pub files_url: Option<String>,
    pub stream_modes: Vec<String>,
    /// Resume `approve` interrupts without asking
    pub auto_approve: bool,
    pub typewriter: TypewriterConfig,
    pub progress_labels: ProgressLabels,
    /// Tool name -> human readable label
    pub tool_labels: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:2024".to_string(),
            assistant_id: "agent".to_string(),
            upload_url: None,
            files_url: None,
            stream_modes: vec![
                "values".to_string(),
                "messages-tuple".to_string(),
                "custom".to_string(),
            ],
            auto_approve: false,
            typewriter: TypewriterConfig::default(),
            progress_labels: default_progress_labels(),
            tool_labels: default_tool_labels(),
            request_timeout_secs: 300,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn upload_endpoint(&self) -> String {
        self.upload_url
            .clone()
            .unwrap_or_else(|| format!("{}/upload", self.api_url.trim_end_matches('/')))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply the fields an overlay sets
    pub fn merge(&mut self, overlay: ConfigOverlay) {
        if let Some(api_url) = overlay.api_url {
            self.api_url = api_url;
        }
        if let Some(assistant_id) = overlay.assistant_id {
            self.assistant_id = assistant_id;
        }
        if overlay.upload_url.is_some() {
            self.upload_url = overlay.upload_url;
        }
        if overlay.files_url.is_some() {
            self.files_url = overlay.files_url;
        }
        if let Some(modes) = overlay.stream_modes {
            self.stream_modes = modes;
        }
        if let Some(auto_approve) = overlay.auto_approve {
            self.auto_approve = auto_approve;
        }
        if let Some(typewriter) = overlay.typewriter {
            self.typewriter = typewriter;
        }
        if let Some(labels) = overlay.progress_labels {
            for (agent, nodes) in labels {
                self.progress_labels.entry(agent).or_default().extend(nodes);
            }
        }
        if let Some(labels) = overlay.tool_labels {
            self.tool_labels.extend(labels);
        }
        if let Some(timeout) = overlay.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(logging) = overlay.logging {
            self.logging.merge(logging);
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        reqwest::Url::parse(&self.api_url)
            .map_err(|e| ClientError::config(format!("invalid api_url '{}': {}", self.api_url, e)))?;
        if let Some(url) = &self.upload_url {
            reqwest::Url::parse(url)
                .map_err(|e| ClientError::config(format!("invalid upload_url '{}': {}", url, e)))?;
        }
        if self.assistant_id.trim().is_empty() {
            return Err(ClientError::config("assistant_id must not be empty"));
        }
        if self.stream_modes.is_empty() {
            return Err(ClientError::config("at least one stream mode is required"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::config("request_timeout_secs must be positive"));
        }
        self.typewriter.validate()
    }
}

/// A partial configuration as read from one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub api_url: Option<String>,
    pub assistant_id: Option<String>,
    pub upload_url: Option<String>,
    pub files_url: Option<String>,
    pub stream_modes: Option<Vec<String>>,
    pub auto_approve: Option<bool>,
    pub typewriter: Option<TypewriterConfig>,
    pub progress_labels: Option<ProgressLabels>,
    pub tool_labels: Option<BTreeMap<String, String>>,
    pub request_timeout_secs: Option<u64>,
    pub logging: Option<LoggingConfig>,
}

fn labels<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_progress_labels() -> ProgressLabels {
    let mut table = ProgressLabels::new();
    table.insert(
        "lean_canvas".to_string(),
        labels([
            ("1_customer_segments", "Identifying target customers"),
            ("2_problem", "Defining the problem"),
            ("3_unique_value_proposition", "Defining the unique value proposition"),
            ("3.1_check_unique", "Defining the unique value proposition"),
            ("4_solution", "Proposing solutions"),
            ("5_channels", "Finding acquisition channels"),
            ("6_revenue_streams", "Planning revenue streams"),
            ("7_cost_structure", "Estimating costs"),
            ("8_key_metrics", "Choosing key metrics"),
            ("9_unfair_advantage", "Finding the unfair advantage"),
            ("get_feedback", "Finding the unfair advantage"),
        ]),
    );
    table.insert(
        "create_landing".to_string(),
        labels([
            ("plan", "Planning the page"),
            ("image", "Generating images"),
            ("coder", "Writing the page code"),
        ]),
    );
    table.insert(
        "podcast_generate".to_string(),
        labels([
            ("__start__", "Downloading page content"),
            ("download", "Analysing the conversation"),
            ("summarize_messages", "Writing the podcast script"),
            ("script", "Generating audio"),
            ("audio_gen", "Generating audio"),
        ]),
    );
    table.insert(
        "generate_presentation".to_string(),
        labels([
            ("__start__", "Drafting the outline"),
            ("plan_node", "Generating images"),
            ("image", "Generating slides"),
            ("slides_node", "Generating slides"),
        ]),
    );
    table.insert(
        "create_meme".to_string(),
        labels([
            ("__start__", "Coming up with an idea"),
            ("text", "Generating the image"),
            ("image", "Generating the image"),
        ]),
    );
    table.insert(
        "city_explore".to_string(),
        labels([
            ("__start__", "Looking for attractions"),
            ("attractions_node", "Looking for hotels"),
            ("hotels_node", "Looking for restaurants and cafes"),
            ("food_node", "Looking for restaurants and cafes"),
        ]),
    );
    table
}

fn default_tool_labels() -> BTreeMap<String, String> {
    labels([
        ("lean_canvas", "Lean Canvas agent"),
        ("python", "Code interpreter"),
        ("search", "Search"),
        ("shell", "Shell"),
        ("ask_about_image", "Image analysis"),
        ("weather", "Weather lookup"),
        ("create_landing", "Landing page builder"),
        ("podcast_generate", "Podcast generator"),
        ("debates", "Agent debates"),
        ("generate_presentation", "Presentation builder"),
        ("create_meme", "Meme agent"),
        ("get_urls", "Link downloader"),
        ("city_explore", "City explorer"),
        ("gen_image", "Image generation"),
    ])
}
