//! Destination folder chooser used by copy and upload

use crate::error::{ExplorerError, Result};
use crate::services::remote::ROOT_PATH;
use crate::services::session::RemoteSession;
use crate::view::file_tree::{EntryFilter, NodeId, RemoteTree};
use std::sync::Arc;

/// A folders-only tree plus an editable destination path
///
/// The synthetic root is selectable and stands for the namespace root
/// (empty path).
pub struct FolderPicker {
    session: RemoteSession,
    tree: RemoteTree,
    text: String,
}

impl FolderPicker {
    pub fn new(session: RemoteSession) -> Self {
        let tree = RemoteTree::with_filter(Arc::clone(session.manager()), EntryFilter::FoldersOnly);
        Self {
            session,
            tree,
            text: ROOT_PATH.to_string(),
        }
    }

    pub fn tree(&self) -> &RemoteTree {
        &self.tree
    }

    /// List the top-level folders
    pub async fn open(&mut self) -> Result<Vec<NodeId>> {
        self.tree.build_root().await
    }

    pub async fn expand(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.tree.expand_node(id).await
    }

    /// Copy the node's path into the destination text
    pub fn select(&mut self, id: NodeId) -> Result<&str> {
        let node = self.tree.get_node(id).ok_or(ExplorerError::NodeNotFound(id))?;
        self.text = node.path().to_string();
        Ok(&self.text)
    }

    /// Destination path as currently typed or selected
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Validate the destination and return it
    ///
    /// The root is accepted without a backend call; any other path must be
    /// an existing folder.
    pub async fn confirm(&self) -> Result<String> {
        let path = self.text.trim();
        if path == ROOT_PATH {
            return Ok(ROOT_PATH.to_string());
        }
        if self.session.manager().folder_exists(path).await? {
            tracing::debug!("Destination {:?} confirmed", path);
            Ok(path.to_string())
        } else {
            Err(ExplorerError::FolderNotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::remote::{BackendError, MemoryBackend, Operation, SlowRemoteBackend};

    async fn picker() -> (FolderPicker, Arc<SlowRemoteBackend>) {
        let backend = MemoryBackend::new();
        backend.insert_file("/a/c.png", vec![]);
        backend.insert_file("/b.txt", vec![]);
        backend.insert_folder("/docs/deep");
        let slow = Arc::new(SlowRemoteBackend::new(Arc::new(backend), Default::default()));
        let session = RemoteSession::connect(slow.clone(), Config::default())
            .await
            .unwrap();
        (FolderPicker::new(session), slow)
    }

    #[tokio::test]
    async fn test_shows_folders_only() {
        let (mut picker, _) = picker().await;
        let top = picker.open().await.unwrap();

        let paths: Vec<_> = top
            .iter()
            .map(|id| picker.tree().get_node(*id).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/a", "/docs"]);

        let a = picker.tree().node_id_for_path("/a").unwrap();
        assert!(picker.expand(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_confirms_without_lookup() {
        let (mut picker, slow) = picker().await;
        picker.open().await.unwrap();
        let root = picker.tree().root_id();

        assert_eq!(picker.select(root).unwrap(), "");
        assert_eq!(picker.confirm().await.unwrap(), "");
        assert_eq!(slow.metrics().await.folder_exists_calls, 0);
    }

    #[tokio::test]
    async fn test_selected_folder_confirms() {
        let (mut picker, _) = picker().await;
        picker.open().await.unwrap();
        let docs = picker.tree().node_id_for_path("/docs").unwrap();
        picker.expand(docs).await.unwrap();
        let deep = picker.tree().node_id_for_path("/docs/deep").unwrap();

        picker.select(deep).unwrap();
        assert_eq!(picker.confirm().await.unwrap(), "/docs/deep");
    }

    #[tokio::test]
    async fn test_failed_open_surfaces_error_and_can_retry() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_folder("/docs");
        let session = RemoteSession::connect(backend.clone(), Config::default())
            .await
            .unwrap();
        let mut picker = FolderPicker::new(session);

        backend.fail_next(Operation::List, BackendError::Server {
            status: 500,
            message: "internal".to_string(),
        });
        let err = picker.open().await.unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Backend(BackendError::Server { status: 500, .. })
        ));
        assert_eq!(picker.tree().node_count(), 1);
        assert_eq!(picker.text(), "");

        let top = picker.open().await.unwrap();
        assert_eq!(top.len(), 1);
        assert!(picker.tree().get_node_by_path("/docs").is_some());
    }

    #[tokio::test]
    async fn test_typed_missing_folder_is_rejected() {
        let (mut picker, _) = picker().await;
        picker.set_text("/nope");
        assert_eq!(
            picker.confirm().await,
            Err(ExplorerError::FolderNotFound("/nope".to_string()))
        );

        // A file is not a folder either
        picker.set_text("/b.txt");
        assert!(picker.confirm().await.is_err());
    }
}
