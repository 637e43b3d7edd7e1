//! In-memory fakes of the backend seams for tests

mod agent;
mod uploader;

pub use agent::{FakeAgentServer, RecordedRun};
pub use uploader::FakeUploader;
