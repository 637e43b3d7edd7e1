//! Sibling-branch navigation for a single message

use crate::error::ClientResult;
use crate::session::{BranchMeta, SessionManager};
use crate::types::CheckpointId;

/// Previous/next navigation over the siblings of one checkpoint
///
/// Built from a message's branch metadata. Metadata whose active branch is
/// not among its options is treated as absent, so nothing is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNavigator {
    options: Vec<CheckpointId>,
    index: usize,
}

impl BranchNavigator {
    pub fn new(meta: Option<&BranchMeta>) -> Option<Self> {
        let meta = meta?;
        let index = meta.index()?;
        Some(Self {
            options: meta.branch_options.clone(),
            index,
        })
    }

    /// `(1-based index, number of branches)`
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.options.len())
    }

    pub fn label(&self) -> String {
        let (index, len) = self.position();
        format!("{} / {}", index, len)
    }

    /// More than one branch exists at this fork
    pub fn has_alternatives(&self) -> bool {
        self.options.len() > 1
    }

    pub fn current(&self) -> &CheckpointId {
        &self.options[self.index]
    }

    pub fn previous(&self) -> Option<&CheckpointId> {
        self.index.checked_sub(1).and_then(|i| self.options.get(i))
    }

    pub fn next(&self) -> Option<&CheckpointId> {
        self.options.get(self.index + 1)
    }

    /// Switch to the previous sibling; `Ok(false)` at the first branch
    pub fn go_previous(&self, session: &SessionManager) -> ClientResult<bool> {
        match self.previous() {
            Some(id) => session.set_branch(id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Switch to the next sibling; `Ok(false)` at the last branch
    pub fn go_next(&self, session: &SessionManager) -> ClientResult<bool> {
        match self.next() {
            Some(id) => session.set_branch(id).map(|_| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use crate::testing::FakeAgentServer;
    use crate::types::HumanTurn;
    use std::sync::Arc;

    fn meta(branch: &str, options: &[&str]) -> BranchMeta {
        BranchMeta {
            branch: CheckpointId::new(branch),
            branch_options: options.iter().map(|o| CheckpointId::new(*o)).collect(),
            parent_checkpoint: None,
        }
    }

    #[test]
    fn test_position_and_ends() {
        let first = BranchNavigator::new(Some(&meta("a", &["a", "b", "c"]))).unwrap();
        assert_eq!(first.position(), (1, 3));
        assert_eq!(first.label(), "1 / 3");
        assert!(first.previous().is_none());
        assert_eq!(first.next().unwrap().as_str(), "b");

        let last = BranchNavigator::new(Some(&meta("c", &["a", "b", "c"]))).unwrap();
        assert_eq!(last.position(), (3, 3));
        assert!(last.next().is_none());
        assert_eq!(last.previous().unwrap().as_str(), "b");
    }

    #[test]
    fn test_malformed_metadata_renders_nothing() {
        assert!(BranchNavigator::new(None).is_none());
        assert!(BranchNavigator::new(Some(&meta("x", &["a", "b"]))).is_none());
        assert!(BranchNavigator::new(Some(&meta("x", &[]))).is_none());
    }

    #[tokio::test]
    async fn test_navigation_switches_session_branch() {
        let server = FakeAgentServer::new();
        let session = SessionManager::new(Arc::new(server), SessionOptions::default());
        session.submit(HumanTurn::text("hi")).unwrap().wait().await;
        let reply = session.snapshot().messages[1].id.clone();
        session.regenerate(&reply).unwrap().wait().await;

        let latest = session.snapshot().messages[1].id.clone();
        let navigator = BranchNavigator::new(session.branch(&latest).as_ref()).unwrap();
        assert_eq!(navigator.position(), (2, 2));
        assert!(!navigator.go_next(&session).unwrap());

        assert!(navigator.go_previous(&session).unwrap());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages[1].id, reply);
        let navigator = BranchNavigator::new(snapshot.branch(&reply)).unwrap();
        assert_eq!(navigator.position(), (1, 2));
    }
}
