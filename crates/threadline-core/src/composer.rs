//! Per-thread composition scope
//!
//! [`CompositionContext`] bundles what the user is preparing for the next
//! message, the attachment selection and the uploads, and folds it into a
//! session submission. It is reset whenever the user navigates to another
//! thread.

use crate::error::{ClientError, ClientResult};
use crate::selection::SelectionRegistry;
use crate::session::{RunHandle, SessionManager};
use crate::types::{Decision, HumanTurn, Role};
use crate::uploads::UploadManager;

#[derive(Debug, Clone)]
pub struct CompositionContext {
    selection: SelectionRegistry,
    uploads: UploadManager,
    auto_approve: bool,
}

impl CompositionContext {
    pub fn new(uploads: UploadManager) -> Self {
        Self {
            selection: SelectionRegistry::new(),
            uploads,
            auto_approve: false,
        }
    }

    /// Resume `approve` interrupts without asking
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn selection(&self) -> &SelectionRegistry {
        &self.selection
    }

    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }

    /// Forget the selection and all attachments
    pub fn reset(&self) {
        self.selection.clear();
        self.uploads.reset();
    }

    /// Submit `text` with the finished uploads and the current selection
    ///
    /// Refused when there is nothing to send or an upload is still running.
    /// On success the selection and the uploads are cleared.
    pub fn send(&self, session: &SessionManager, text: &str) -> ClientResult<RunHandle> {
        if text.trim().is_empty() && self.uploads.is_empty() {
            return Err(ClientError::invalid_input("nothing to send"));
        }
        if self.uploads.is_uploading() {
            return Err(ClientError::busy("wait for uploads to finish"));
        }
        let turn = HumanTurn::text(text)
            .with_files(self.uploads.all_file_data())
            .with_selected(self.selection.snapshot());
        let handle = session.submit(turn)?;
        self.reset();
        Ok(handle)
    }

    /// Answer the pending interrupt: a comment when `text` is non-blank, otherwise approval
    pub fn continue_interrupt(
        &self,
        session: &SessionManager,
        text: &str,
    ) -> ClientResult<Option<RunHandle>> {
        let decision = if text.trim().is_empty() {
            Decision::approve()
        } else {
            Decision::comment(text.trim())
        };
        session.resume(decision)
    }

    /// Approve a pending approval interrupt when auto-approve is on
    pub fn maybe_auto_approve(&self, session: &SessionManager) -> ClientResult<Option<RunHandle>> {
        if !self.auto_approve || session.is_loading() {
            return Ok(None);
        }
        match session.interrupt() {
            Some(interrupt) if interrupt.is_approval() => {
                tracing::info!(thread_id = ?session.thread_id(), "auto-approving interrupt");
                session.resume(Decision::approve())
            }
            _ => Ok(None),
        }
    }

    /// Start editing a human message
    ///
    /// Its files are loaded into a fresh upload manager and its selection is
    /// restored into this context's registry.
    pub fn begin_edit(&self, session: &SessionManager, message_id: &str) -> ClientResult<EditSession> {
        let snapshot = session.snapshot();
        let message = snapshot
            .message(message_id)
            .ok_or_else(|| ClientError::not_found(format!("message {}", message_id)))?;
        if message.role != Role::Human {
            return Err(ClientError::invalid_input("only human messages can be edited"));
        }

        let uploads = self.uploads.fresh();
        uploads.set_existing(message.metadata.files.clone());
        self.selection.set(message.metadata.selected.clone());
        Ok(EditSession {
            message_id: message_id.to_string(),
            text: message.display_text().to_string(),
            uploads,
            selection: self.selection.clone(),
        })
    }
}

/// An in-progress edit of one human message
#[derive(Debug)]
pub struct EditSession {
    message_id: String,
    text: String,
    uploads: UploadManager,
    selection: SelectionRegistry,
}

impl EditSession {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Attachments of the edited message; add or remove freely
    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }

    /// Resubmit from the message's parent checkpoint with the edited content
    pub fn commit(self, session: &SessionManager) -> ClientResult<RunHandle> {
        if self.uploads.is_uploading() {
            return Err(ClientError::busy("wait for uploads to finish"));
        }
        if self.text.trim().is_empty() && self.uploads.is_empty() {
            return Err(ClientError::invalid_input("edited message is empty"));
        }
        let turn = HumanTurn::text(self.text.clone())
            .with_files(self.uploads.all_file_data())
            .with_selected(self.selection.snapshot());
        let handle = session.edit(&self.message_id, turn)?;
        self.selection.clear();
        Ok(handle)
    }

    pub fn cancel(self) {
        self.selection.clear();
        self.uploads.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use crate::testing::{FakeAgentServer, FakeUploader};
    use crate::transport::LocalFile;
    use crate::types::{FileData, SelectionEntry};
    use std::sync::Arc;

    struct Fixture {
        server: FakeAgentServer,
        uploader: FakeUploader,
        session: SessionManager,
        composer: CompositionContext,
    }

    fn fixture() -> Fixture {
        let server = FakeAgentServer::new();
        let uploader = FakeUploader::new();
        let session = SessionManager::new(Arc::new(server.clone()), SessionOptions::default());
        let composer = CompositionContext::new(UploadManager::new(Arc::new(uploader.clone())));
        Fixture {
            server,
            uploader,
            session,
            composer,
        }
    }

    #[tokio::test]
    async fn test_send_folds_uploads_and_selection() {
        let f = fixture();
        f.composer
            .uploads()
            .upload_files(vec![LocalFile::new("data.csv", "text/csv", b"a,b".to_vec())])
            .wait()
            .await;
        f.composer.selection().select("plot-1", Some("Sales".to_string()));

        f.composer.send(&f.session, "analyze").unwrap().wait().await;

        let request = &f.server.runs()[0].request;
        let sent = &request.messages()[0].metadata;
        assert_eq!(sent.user_input.as_deref(), Some("analyze"));
        assert_eq!(sent.files, vec![FileData::new("files/data.csv")]);
        assert_eq!(sent.selected["plot-1"].label.as_deref(), Some("Sales"));
        assert!(f.composer.selection().is_empty());
        assert!(f.composer.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_send_refusals() {
        let f = fixture();
        assert!(matches!(
            f.composer.send(&f.session, "   "),
            Err(ClientError::InvalidInput(_))
        ));

        let _release = f.uploader.hold("slow.txt");
        f.composer
            .uploads()
            .upload_files(vec![LocalFile::new("slow.txt", "text/plain", vec![1])]);
        assert!(matches!(
            f.composer.send(&f.session, "go"),
            Err(ClientError::Busy(_))
        ));
        assert!(f.server.runs().is_empty());
    }

    #[tokio::test]
    async fn test_continue_interrupt_and_auto_approve() {
        let f = fixture();
        f.server.interrupt_on("deploy");
        f.session.submit(HumanTurn::text("deploy")).unwrap().wait().await;

        let handle = f.composer.continue_interrupt(&f.session, "  not yet ").unwrap().unwrap();
        handle.wait().await;
        let resume = f.server.runs().last().unwrap().request.command.clone().unwrap();
        assert_eq!(resume.resume, Decision::comment("not yet"));

        f.session.submit(HumanTurn::text("deploy again")).unwrap().wait().await;
        assert!(f.composer.maybe_auto_approve(&f.session).unwrap().is_none());

        let composer = f.composer.clone().with_auto_approve(true);
        composer.maybe_auto_approve(&f.session).unwrap().unwrap().wait().await;
        assert!(f.session.interrupt().is_none());
        let resume = f.server.runs().last().unwrap().request.command.clone().unwrap();
        assert_eq!(resume.resume, Decision::approve());
    }

    #[tokio::test]
    async fn test_edit_session_round_trip() {
        let f = fixture();
        let mut selected = crate::types::SelectedMap::new();
        selected.insert("g1".to_string(), SelectionEntry::default());
        let turn = HumanTurn::text("draft")
            .with_files(vec![FileData::new("files/a.txt"), FileData::new("files/b.txt")])
            .with_selected(selected);
        f.session.submit(turn).unwrap().wait().await;
        let original = f.session.snapshot().messages[0].id.clone();

        let mut edit = f.composer.begin_edit(&f.session, &original).unwrap();
        assert_eq!(edit.text(), "draft");
        assert_eq!(edit.uploads().items().len(), 2);
        assert!(f.composer.selection().is_selected("g1"));

        edit.set_text("final");
        assert!(edit.uploads().remove_by_key("existing:files/a.txt"));
        edit.commit(&f.session).unwrap().wait().await;

        let snapshot = f.session.snapshot();
        assert_eq!(snapshot.messages[0].content, "final");
        assert_eq!(snapshot.messages[0].metadata.files, vec![FileData::new("files/b.txt")]);
        assert!(f.composer.selection().is_empty());
        assert!(f.composer.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_edit_clears_selection() {
        let f = fixture();
        f.session.submit(HumanTurn::text("hi")).unwrap().wait().await;
        let snapshot = f.session.snapshot();

        let edit = f.composer.begin_edit(&f.session, &snapshot.messages[0].id).unwrap();
        f.composer.selection().select("x", None);
        edit.cancel();

        assert!(f.composer.selection().is_empty());
        assert!(matches!(
            f.composer.begin_edit(&f.session, &snapshot.messages[1].id),
            Err(ClientError::InvalidInput(_))
        ));
    }
}
