//! Navigator: the explorer's controller
//!
//! Owns the remote tree and the selection, issues listings, gates actions on
//! the selection and runs transfers through the coordinator, refreshing the
//! affected folder when a transfer changed the namespace.

use crate::config::Config;
use crate::error::{ExplorerError, Result};
use crate::model::{resolve, AccountSummary, Capability, CapabilitySet};
use crate::services::remote::RemoteEntry;
use crate::services::session::RemoteSession;
use crate::services::transfer::{
    TransferCoordinator, TransferKind, TransferOutcome, TransferRequest,
};
use crate::view::file_tree::{NodeId, RemoteTree, TreeNode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// What the navigator is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyState {
    Idle,
    Listing,
    Transferring(TransferKind),
}

/// Which controls a shell should enable right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordances {
    /// Tree navigation and selection
    pub tree: bool,
    pub upload: bool,
    pub cancel: bool,
    /// Per-selection actions
    pub actions: CapabilitySet,
}

/// Resets the busy state when an operation ends or its future is dropped
struct BusyGuard(Arc<watch::Sender<BusyState>>);

impl BusyGuard {
    fn enter(sender: &Arc<watch::Sender<BusyState>>, state: BusyState) -> Self {
        sender.send_replace(state);
        Self(Arc::clone(sender))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.send_replace(BusyState::Idle);
    }
}

pub struct Navigator {
    session: RemoteSession,
    tree: RemoteTree,
    coordinator: TransferCoordinator,
    /// Path of the highlighted node; resolved on use, never owned
    selected: Option<String>,
    busy: Arc<watch::Sender<BusyState>>,
}

impl Navigator {
    pub fn new(session: RemoteSession) -> Self {
        let tree = RemoteTree::new(Arc::clone(session.manager()));
        let coordinator = TransferCoordinator::new(Arc::clone(session.backend()));
        let (busy, _) = watch::channel(BusyState::Idle);

        Self {
            session,
            tree,
            coordinator,
            selected: None,
            busy: Arc::new(busy),
        }
    }

    pub fn tree(&self) -> &RemoteTree {
        &self.tree
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        self.session.config()
    }

    /// The coordinator; clone it to cancel from another task
    pub fn coordinator(&self) -> &TransferCoordinator {
        &self.coordinator
    }

    pub fn busy(&self) -> BusyState {
        *self.busy.borrow()
    }

    /// Watch busy state changes
    pub fn subscribe_busy(&self) -> watch::Receiver<BusyState> {
        self.busy.subscribe()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.busy() != BusyState::Idle || self.coordinator.is_busy() {
            return Err(ExplorerError::Busy);
        }
        Ok(())
    }

    /// List the namespace root and rebuild the top level
    pub async fn build_root(&mut self) -> Result<Vec<NodeId>> {
        self.ensure_idle()?;
        let _busy = BusyGuard::enter(&self.busy, BusyState::Listing);
        self.tree.build_root().await
    }

    /// Expand a folder node
    pub async fn expand(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.ensure_idle()?;
        let _busy = BusyGuard::enter(&self.busy, BusyState::Listing);
        self.tree.expand_node(id).await
    }

    /// Expand the loaded folder at `path`
    pub async fn expand_path(&mut self, path: &str) -> Result<Vec<NodeId>> {
        let id = self
            .tree
            .node_id_for_path(path)
            .ok_or_else(|| ExplorerError::FolderNotFound(path.to_string()))?;
        self.expand(id).await
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.tree.collapse_node(id);
    }

    /// Re-list `path` (or its nearest loaded folder) and rebuild its children
    pub async fn refresh_subtree(&mut self, path: &str) -> Result<NodeId> {
        self.ensure_idle()?;
        let _busy = BusyGuard::enter(&self.busy, BusyState::Listing);
        self.tree.refresh_subtree(path).await
    }

    /// Change the selection and return the actions it enables
    pub fn select(&mut self, id: Option<NodeId>) -> CapabilitySet {
        self.selected = id
            .and_then(|id| self.tree.get_node(id))
            .filter(|node| !node.is_root())
            .map(|node| node.path().to_string());
        tracing::debug!("Selected {:?}", self.selected);
        self.capabilities()
    }

    /// Select by path; unknown paths clear the selection
    pub fn select_path(&mut self, path: &str) -> CapabilitySet {
        let id = self.tree.node_id_for_path(path);
        self.select(id)
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected node, if it still exists after the latest rebuild
    pub fn selected_node(&self) -> Option<&TreeNode> {
        self.selected
            .as_deref()
            .and_then(|path| self.tree.get_node_by_path(path))
    }

    pub fn selected_entry(&self) -> Option<&RemoteEntry> {
        self.selected_node().and_then(|node| node.entry.as_ref())
    }

    /// Actions enabled for the current selection, recomputed on every call
    pub fn capabilities(&self) -> CapabilitySet {
        resolve(self.selected_entry())
    }

    pub fn affordances(&self) -> Affordances {
        match self.busy() {
            BusyState::Idle if !self.coordinator.is_busy() => Affordances {
                tree: true,
                upload: true,
                cancel: false,
                actions: self.capabilities(),
            },
            BusyState::Listing => Affordances {
                tree: false,
                upload: false,
                cancel: false,
                actions: CapabilitySet::empty(),
            },
            _ => Affordances {
                tree: false,
                upload: false,
                cancel: self
                    .coordinator
                    .active_kind()
                    .map(TransferKind::is_cancellable)
                    .unwrap_or(false),
                actions: CapabilitySet::empty(),
            },
        }
    }

    fn selected_with(&self, capability: Capability) -> Result<&RemoteEntry> {
        match self.selected_entry() {
            Some(entry) if resolve(Some(entry)).contains(capability) => Ok(entry),
            _ => Err(ExplorerError::ActionUnavailable(capability)),
        }
    }

    /// Download the selected file into `destination`
    pub fn download_request(&self, destination: impl Into<PathBuf>) -> Result<TransferRequest> {
        let entry = self.selected_with(Capability::Download)?;
        Ok(TransferRequest::Download {
            remote_path: entry.path().to_string(),
            destination: destination.into(),
        })
    }

    pub fn delete_request(&self) -> Result<TransferRequest> {
        let entry = self.selected_with(Capability::Delete)?;
        Ok(TransferRequest::Delete {
            remote_path: entry.path().to_string(),
        })
    }

    /// Copy the selection into `folder` (typically picked with a `FolderPicker`)
    pub fn copy_request(&self, folder: &str) -> Result<TransferRequest> {
        let entry = self.selected_with(Capability::Copy)?;
        Ok(TransferRequest::copy_into(entry.path(), folder))
    }

    /// Render the selected document to the configured preview file
    pub fn preview_request(&self) -> Result<TransferRequest> {
        let entry = self.selected_with(Capability::Preview)?;
        Ok(TransferRequest::Preview {
            remote_path: entry.path().to_string(),
            destination: self.config().transfers.preview_destination.clone(),
        })
    }

    /// Render the selected image with the configured format and size
    pub fn thumbnail_request(&self) -> Result<TransferRequest> {
        let entry = self.selected_with(Capability::Thumbnail)?;
        let transfers = &self.config().transfers;
        Ok(TransferRequest::Thumbnail {
            remote_path: entry.path().to_string(),
            destination: transfers.thumbnail_destination.clone(),
            format: transfers.thumbnail_format,
            size: transfers.thumbnail_size,
        })
    }

    /// Upload `source` into `folder` with the configured write mode
    pub fn upload_request(&self, folder: &str, source: &Path) -> TransferRequest {
        TransferRequest::upload_into(folder, source, self.config().transfers.upload_mode)
    }

    /// Run a transfer to its outcome, then refresh what it changed
    ///
    /// Progress values are passed to `on_progress` as they arrive. Only a
    /// completed upload, copy or delete triggers a refresh. A failing
    /// refresh is logged; the transfer outcome is still returned.
    pub async fn run_transfer<F>(
        &mut self,
        request: TransferRequest,
        on_progress: F,
    ) -> Result<TransferOutcome>
    where
        F: FnMut(f64),
    {
        if self.busy() != BusyState::Idle {
            return Err(ExplorerError::Busy);
        }
        let affected = request.affected_folder().map(str::to_string);
        let handle = self.coordinator.start(request)?;

        let outcome = {
            let _busy = BusyGuard::enter(&self.busy, BusyState::Transferring(handle.kind()));
            handle.wait_with(on_progress).await
        };

        if let (TransferOutcome::Completed(_), Some(folder)) = (&outcome, affected) {
            if let Err(e) = self.refresh_subtree(&folder).await {
                tracing::warn!("Refresh of {:?} after transfer failed: {}", folder, e);
            }
        }
        Ok(outcome)
    }

    pub async fn account_summary(&self) -> Result<AccountSummary> {
        self.session.account_summary().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::{BackendError, MemoryBackend, Operation, SlowRemoteBackend};
    use crate::services::transfer::TransferResult;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn navigator_over(backend: Arc<MemoryBackend>) -> Navigator {
        let session = RemoteSession::connect(backend, Config::default())
            .await
            .unwrap();
        Navigator::new(session)
    }

    fn sample() -> Arc<MemoryBackend> {
        let backend = MemoryBackend::new().with_chunk_size(4);
        backend.insert_file("/a/c.png", b"png-bytes".to_vec());
        backend.insert_file("/b.txt", b"text".to_vec());
        backend.insert_file("/docs/report.docx", b"doc".to_vec());
        Arc::new(backend)
    }

    #[tokio::test]
    async fn test_selection_drives_capabilities() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.expand_path("/a").await.unwrap();

        let caps = nav.select_path("/a/c.png");
        assert_eq!(caps.to_string(), "{download, delete, copy, thumbnail}");

        let caps = nav.select_path("/a");
        assert_eq!(caps.to_string(), "{delete, copy}");

        assert!(nav.select(None).is_empty());
        assert!(nav.select_path("/nowhere").is_empty());
        assert_eq!(nav.selected_path(), None);
    }

    #[tokio::test]
    async fn test_selecting_root_clears_selection() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        let root = nav.tree().root_id();

        assert!(nav.select(Some(root)).is_empty());
        assert!(nav.selected_entry().is_none());
    }

    #[tokio::test]
    async fn test_requests_respect_capabilities() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.select_path("/a");

        assert_eq!(
            nav.download_request("out.bin"),
            Err(ExplorerError::ActionUnavailable(Capability::Download))
        );
        assert_eq!(
            nav.preview_request(),
            Err(ExplorerError::ActionUnavailable(Capability::Preview))
        );
        assert_eq!(
            nav.copy_request("/docs").unwrap(),
            TransferRequest::Copy {
                remote_path: "/a".to_string(),
                destination: "/docs/a".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_render_requests_use_config_defaults() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.expand_path("/docs").await.unwrap();
        nav.expand_path("/a").await.unwrap();

        nav.select_path("/docs/report.docx");
        assert_eq!(
            nav.preview_request().unwrap(),
            TransferRequest::Preview {
                remote_path: "/docs/report.docx".to_string(),
                destination: PathBuf::from("tmp.pdf"),
            }
        );

        nav.select_path("/a/c.png");
        match nav.thumbnail_request().unwrap() {
            TransferRequest::Thumbnail {
                destination,
                format,
                size,
                ..
            } => {
                assert_eq!(destination, PathBuf::from("tmp.jpg"));
                assert_eq!(format, crate::services::remote::ThumbnailFormat::Jpeg);
                assert_eq!(size, crate::services::remote::ThumbnailSize::W1024H768);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_refreshes_parent_folder() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.expand_path("/a").await.unwrap();
        nav.select_path("/a/c.png");

        let request = nav.delete_request().unwrap();
        let outcome = nav.run_transfer(request, |_| {}).await.unwrap();

        assert!(outcome.is_completed());
        assert!(nav.tree().get_node_by_path("/a/c.png").is_none());
        assert!(nav.tree().get_node_by_path("/a").unwrap().is_expanded());
        // Selection is a weak reference and no longer resolves
        assert!(nav.selected_entry().is_none());
        assert!(nav.capabilities().is_empty());
        assert_eq!(nav.busy(), BusyState::Idle);
    }

    #[tokio::test]
    async fn test_upload_refreshes_target_folder() {
        let backend = sample();
        let mut nav = navigator_over(backend.clone()).await;
        nav.build_root().await.unwrap();
        nav.expand_path("/docs").await.unwrap();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, b"twelve bytes").unwrap();

        let request = nav.upload_request("/docs", &source);
        let mut progress = Vec::new();
        let outcome = nav.run_transfer(request, |p| progress.push(p)).await.unwrap();

        assert!(matches!(
            outcome,
            TransferOutcome::Completed(TransferResult::Entry(ref e)) if e.path() == "/docs/notes.txt"
        ));
        assert_eq!(progress.last(), Some(&100.0));
        assert!(nav.tree().get_node_by_path("/docs/notes.txt").is_some());
        assert_eq!(backend.file_content("/docs/notes.txt").unwrap(), b"twelve bytes".to_vec());
    }

    #[tokio::test]
    async fn test_failed_transfer_does_not_refresh() {
        let backend = sample();
        let slow = Arc::new(SlowRemoteBackend::new(backend.clone(), Default::default()));
        let session = RemoteSession::connect(slow.clone(), Config::default())
            .await
            .unwrap();
        let mut nav = Navigator::new(session);
        nav.build_root().await.unwrap();
        nav.select_path("/b.txt");
        slow.reset_metrics().await;

        backend.fail_next(Operation::Delete, BackendError::PermissionDenied("/b.txt".to_string()));
        let request = nav.delete_request().unwrap();
        let outcome = nav.run_transfer(request, |_| {}).await.unwrap();

        assert_eq!(
            outcome,
            TransferOutcome::Failed(BackendError::PermissionDenied("/b.txt".to_string()))
        );
        assert_eq!(slow.metrics().await.list_calls, 0);
        assert!(nav.selected_entry().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_download_reports_cancelled() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_chunk_size(1)
                .with_step_delay(Duration::from_millis(5)),
        );
        backend.insert_file("/big.bin", vec![0; 200]);
        let mut nav = navigator_over(backend).await;
        nav.build_root().await.unwrap();
        nav.select_path("/big.bin");

        let dir = TempDir::new().unwrap();
        let request = nav.download_request(dir.path().join("big.bin")).unwrap();
        let canceller = nav.coordinator().clone();
        let mut busy = nav.subscribe_busy();

        let cancel_task = tokio::spawn(async move {
            busy.wait_for(|s| matches!(s, BusyState::Transferring(_)))
                .await
                .unwrap();
            canceller.cancel()
        });

        let outcome = nav.run_transfer(request, |_| {}).await.unwrap();
        assert!(cancel_task.await.unwrap());
        assert_eq!(outcome, TransferOutcome::Cancelled);
        assert_eq!(nav.busy(), BusyState::Idle);
    }

    #[tokio::test]
    async fn test_busy_while_transfer_outstanding() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.select_path("/b.txt");

        let handle = nav
            .coordinator()
            .start(TransferRequest::Delete {
                remote_path: "/b.txt".to_string(),
            })
            .unwrap();

        assert_eq!(nav.build_root().await, Err(ExplorerError::Busy));
        let affordances = nav.affordances();
        assert!(!affordances.tree);
        assert!(!affordances.cancel, "delete cannot be cancelled");
        assert!(affordances.actions.is_empty());

        handle.wait().await;
        assert!(nav.affordances().tree);
    }

    #[tokio::test]
    async fn test_idle_affordances_follow_selection() {
        let mut nav = navigator_over(sample()).await;
        nav.build_root().await.unwrap();
        nav.select_path("/b.txt");

        let affordances = nav.affordances();
        assert!(affordances.tree && affordances.upload);
        assert!(!affordances.cancel);
        assert_eq!(affordances.actions, nav.capabilities());
    }

    #[tokio::test]
    async fn test_account_summary() {
        let nav = navigator_over(sample()).await;
        let summary = nav.account_summary().await.unwrap();
        assert!(summary.usage_line().ends_with("of 2.00 GiB)"));
    }
}
