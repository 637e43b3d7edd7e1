//! Artifact references embedded in message content
//!
//! Agents reference stored artifacts from markdown link targets such as
//! `![chart](graph:3f2a)`. Resolution never fails: any error becomes an
//! [`ArtifactView::Unavailable`] placeholder.

use crate::transport::{ArtifactStore, StoreItem};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Store namespace of images and plots
pub const ATTACHMENTS_NAMESPACE: &str = "attachments";
pub const AUDIO_NAMESPACE: &str = "audio";

const PLOTLY_MIME: &str = "application/vnd.plotly.v1+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Image or plot in the attachments namespace
    Graph,
    /// Standalone HTML document served by the backend
    Html,
    Audio,
}

impl ArtifactKind {
    fn scheme(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Html => "html",
            Self::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub id: String,
}

impl ArtifactRef {
    /// Parse `graph:<id>`, `html:<id>` or `audio:<id>`
    pub fn parse(source: &str) -> Option<Self> {
        let (scheme, id) = source.trim().split_once(':')?;
        let kind = match scheme {
            "graph" => ArtifactKind::Graph,
            "html" => ArtifactKind::Html,
            "audio" => ArtifactKind::Audio,
            _ => return None,
        };
        if id.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            id: id.to_string(),
        })
    }

    /// All references used as markdown link targets in `content`, in order
    pub fn find_all(content: &str) -> Vec<Self> {
        let mut found = Vec::new();
        let mut rest = content;
        while let Some(start) = rest.find("](") {
            rest = &rest[start + 2..];
            let Some(end) = rest.find(')') else {
                break;
            };
            if let Some(reference) = Self::parse(&rest[..end]) {
                found.push(reference);
            }
            rest = &rest[end..];
        }
        found
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.scheme(), self.id)
    }
}

/// Something a renderer can show for an artifact
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactView {
    /// Base64 image payload
    Image { mime: String, data: String },
    /// Plotly figure JSON
    Plot(Value),
    /// Base64 mp3 payload
    Audio { data: String },
    /// Document to open in an isolated frame or browser
    Html { url: String },
    Unsupported { mime: String },
    /// Missing or failed to load; render an inline placeholder
    Unavailable { message: String },
}

impl ArtifactView {
    /// `data:` URL for binary payloads
    pub fn data_url(&self) -> Option<String> {
        match self {
            Self::Image { mime, data } => Some(format!("data:{};base64,{}", mime, data)),
            Self::Audio { data } => Some(format!("data:audio/mp3;base64,{}", data)),
            _ => None,
        }
    }

    fn from_item(item: StoreItem) -> Self {
        let mime = item.mime;
        match (mime.as_str(), item.data) {
            (PLOTLY_MIME, figure) => Self::Plot(figure),
            (m, Value::String(data)) if m.starts_with("image/") => Self::Image {
                mime: m.to_string(),
                data,
            },
            (m, Value::String(data)) if m.starts_with("audio/") => Self::Audio { data },
            (m, _) if m.starts_with("image/") || m.starts_with("audio/") => Self::Unavailable {
                message: format!("malformed {} payload", m),
            },
            _ => Self::Unsupported { mime },
        }
    }
}

/// Turns references into views through the artifact store
#[derive(Clone)]
pub struct ArtifactResolver {
    store: Arc<dyn ArtifactStore>,
    api_url: String,
}

impl fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn ArtifactStore>, api_url: impl Into<String>) -> Self {
        Self {
            store,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of an HTML artifact; no fetch is needed
    pub fn html_url(&self, id: &str) -> String {
        format!("{}/html/{}/", self.api_url, id)
    }

    pub async fn resolve(&self, reference: &ArtifactRef) -> ArtifactView {
        let namespace = match reference.kind {
            ArtifactKind::Html => {
                return ArtifactView::Html {
                    url: self.html_url(&reference.id),
                };
            }
            ArtifactKind::Graph => ATTACHMENTS_NAMESPACE,
            ArtifactKind::Audio => AUDIO_NAMESPACE,
        };

        match self.store.get_item(namespace, &reference.id).await {
            Ok(Some(item)) => ArtifactView::from_item(item),
            Ok(None) => ArtifactView::Unavailable {
                message: format!("{} not found", reference),
            },
            Err(error) => {
                tracing::warn!(artifact = %reference, %error, "failed to load artifact");
                ArtifactView::Unavailable {
                    message: format!("failed to load {}", reference),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAgentServer;
    use serde_json::json;

    #[test]
    fn test_parse() {
        assert_eq!(
            ArtifactRef::parse("graph:abc"),
            Some(ArtifactRef {
                kind: ArtifactKind::Graph,
                id: "abc".to_string()
            })
        );
        assert_eq!(ArtifactRef::parse("html:page-1").unwrap().kind, ArtifactKind::Html);
        assert_eq!(ArtifactRef::parse("audio:x").unwrap().to_string(), "audio:x");
        assert!(ArtifactRef::parse("https://example.com").is_none());
        assert!(ArtifactRef::parse("graph:").is_none());
        assert!(ArtifactRef::parse("plain").is_none());
    }

    #[test]
    fn test_find_all_in_markdown() {
        let content = "Here ![chart](graph:g1) and [page](html:h1), not [site](https://x.y) or (graph:loose).";

        let found = ArtifactRef::find_all(content);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "g1");
        assert_eq!(found[1].kind, ArtifactKind::Html);
    }

    fn item(mime: &str, data: Value) -> StoreItem {
        StoreItem {
            mime: mime.to_string(),
            data,
        }
    }

    #[tokio::test]
    async fn test_resolve_views() {
        let server = FakeAgentServer::new();
        server.put_item("attachments", "img", item("image/png", json!("iVBOR")));
        server.put_item("attachments", "plot", item(PLOTLY_MIME, json!({"data": []})));
        server.put_item("attachments", "csv", item("text/csv", json!("a,b")));
        server.put_item("audio", "pod", item("audio/mp3", json!("SUQz")));
        let resolver = ArtifactResolver::new(Arc::new(server), "http://host/api/");

        let image = resolver.resolve(&ArtifactRef::parse("graph:img").unwrap()).await;
        assert_eq!(image.data_url().unwrap(), "data:image/png;base64,iVBOR");
        assert_eq!(
            resolver.resolve(&ArtifactRef::parse("graph:plot").unwrap()).await,
            ArtifactView::Plot(json!({"data": []}))
        );
        assert_eq!(
            resolver.resolve(&ArtifactRef::parse("graph:csv").unwrap()).await,
            ArtifactView::Unsupported {
                mime: "text/csv".to_string()
            }
        );
        assert_eq!(
            resolver.resolve(&ArtifactRef::parse("audio:pod").unwrap()).await,
            ArtifactView::Audio {
                data: "SUQz".to_string()
            }
        );
        assert_eq!(
            resolver.resolve(&ArtifactRef::parse("html:page").unwrap()).await,
            ArtifactView::Html {
                url: "http://host/api/html/page/".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_errors_degrade_to_placeholder() {
        let server = FakeAgentServer::new();
        server.break_item("broken");
        let resolver = ArtifactResolver::new(Arc::new(server), "http://host");

        let missing = resolver.resolve(&ArtifactRef::parse("graph:nope").unwrap()).await;
        let broken = resolver.resolve(&ArtifactRef::parse("graph:broken").unwrap()).await;

        assert!(matches!(missing, ArtifactView::Unavailable { .. }));
        assert!(matches!(broken, ArtifactView::Unavailable { ref message } if message.contains("graph:broken")));
    }
}
