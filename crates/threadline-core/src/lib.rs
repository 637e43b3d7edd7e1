//! Threadline Core Library
//!
//! Client-side engine for conversations with a remote, streaming agent:
//! the session manager and its checkpoint tree, upload and selection state,
//! the typewriter reveal scheduler and the HTTP transport behind them.

pub mod artifacts;
pub mod branching;
pub mod composer;
pub mod config;
pub mod demo;
pub mod error;
pub mod events;
pub mod progress;
pub mod reconciler;
pub mod selection;
pub mod session;
pub mod stream;
pub mod transport;
pub mod types;
pub mod typewriter;
pub mod uploads;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use artifacts::{ArtifactRef, ArtifactResolver, ArtifactView};
pub use branching::BranchNavigator;
pub use composer::{CompositionContext, EditSession};
pub use config::{ClientConfig, ConfigLoader, LoggingConfig, TypewriterConfig};
pub use error::{ClientError, ClientResult};
pub use events::{EventBus, SessionEvent};
pub use progress::AgentProgress;
pub use reconciler::MessageReconciler;
pub use selection::SelectionRegistry;
pub use session::{
    BranchMeta, OptimisticUpdate, RunHandle, SessionError, SessionManager, SessionOptions,
    SessionSnapshot, SubmitOptions,
};
pub use transport::{AgentTransport, ArtifactStore, HttpAgentClient, HttpUploader, UploadTransport};
pub use types::*;
pub use typewriter::{RevealPhase, Typewriter};
pub use uploads::{AttachmentItem, UploadManager};
