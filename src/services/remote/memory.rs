//! In-memory remote namespace
//!
//! `MemoryBackend` implements [`RemoteBackend`] over a map of paths held in
//! process memory. Transfers are streamed in chunks so progress and
//! cancellation behave like a real service. It backs the demo shell and
//! every test that needs a collaborator.

use super::backend::{
    join_path, leaf_name, parent_path, AccountInfo, BackendError, EntryKind, EntryMetadata,
    RemoteBackend, RemoteEntry, SpaceUsage, ThumbnailFormat, ThumbnailSize, TransferContext,
    WriteMode, ROOT_PATH,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const GIB: u64 = 1 << 30;

/// Backend call that a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    FolderExists,
    Upload,
    Download,
    Copy,
    Delete,
    Preview,
    Thumbnail,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    kind: EntryKind,
    deleted: bool,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, StoredEntry>,
    failures: HashMap<Operation, BackendError>,
    connected: bool,
}

/// One entry of a JSON namespace fixture
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureEntry {
    pub path: String,
    pub kind: EntryKind,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub content: Option<String>,
}

/// In-memory [`RemoteBackend`]
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    chunk_size: usize,
    step_delay: Duration,
    keep_tombstones: bool,
    account: AccountInfo,
    allocated: u64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                connected: true,
                ..MemoryState::default()
            }),
            chunk_size: 64 * 1024,
            step_delay: Duration::ZERO,
            keep_tombstones: false,
            account: AccountInfo {
                account_id: "dbid:memory".to_string(),
                display_name: "Memory User".to_string(),
            },
            allocated: 2 * GIB,
        }
    }

    /// Build a namespace from fixture entries (parents are created as needed)
    pub fn from_fixture(entries: &[FixtureEntry]) -> Self {
        let backend = Self::new();
        for entry in entries {
            match entry.kind {
                EntryKind::Folder => backend.insert_folder(&entry.path),
                EntryKind::File => backend.insert_file(
                    &entry.path,
                    entry.content.clone().unwrap_or_default().into_bytes(),
                ),
            }
            if entry.deleted {
                backend.mark_deleted(&entry.path);
            }
        }
        backend
    }

    /// Bytes per progress tick
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause between progress ticks
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Keep deleted entries in listings as tombstones
    pub fn with_tombstones(mut self, keep: bool) -> Self {
        self.keep_tombstones = keep;
        self
    }

    pub fn with_account(mut self, account: AccountInfo, allocated: u64) -> Self {
        self.account = account;
        self.allocated = allocated;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the map half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_folder(&self, path: &str) {
        let mut state = self.state();
        Self::ensure_folders(&mut state, path);
    }

    pub fn insert_file(&self, path: &str, content: Vec<u8>) {
        let mut state = self.state();
        Self::ensure_folders(&mut state, parent_path(path));
        state.entries.insert(
            path.to_string(),
            StoredEntry {
                kind: EntryKind::File,
                deleted: false,
                content,
            },
        );
    }

    /// Turn an existing entry into a tombstone
    pub fn mark_deleted(&self, path: &str) {
        if let Some(entry) = self.state().entries.get_mut(path) {
            entry.deleted = true;
        }
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: Operation, error: BackendError) {
        self.state().failures.insert(op, error);
    }

    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Content of a live file, if any
    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        self.state()
            .entries
            .get(path)
            .filter(|e| e.kind == EntryKind::File && !e.deleted)
            .map(|e| e.content.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state()
            .entries
            .get(path)
            .map(|e| !e.deleted)
            .unwrap_or(false)
    }

    fn ensure_folders(state: &mut MemoryState, path: &str) {
        if path == ROOT_PATH {
            return;
        }
        Self::ensure_folders(state, parent_path(path));
        let entry = state
            .entries
            .entry(path.to_string())
            .or_insert_with(|| StoredEntry {
                kind: EntryKind::Folder,
                deleted: false,
                content: Vec::new(),
            });
        entry.deleted = false;
    }

    fn take_failure(&self, op: Operation) -> Result<(), BackendError> {
        match self.state().failures.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn is_live_folder(state: &MemoryState, path: &str) -> bool {
        path == ROOT_PATH
            || state
                .entries
                .get(path)
                .map(|e| e.kind == EntryKind::Folder && !e.deleted)
                .unwrap_or(false)
    }

    fn live_file(state: &MemoryState, path: &str) -> Result<Vec<u8>, BackendError> {
        match state.entries.get(path) {
            Some(e) if e.kind == EntryKind::File && !e.deleted => Ok(e.content.clone()),
            _ => Err(BackendError::NotFound(path.to_string())),
        }
    }

    fn to_entry(path: &str, stored: &StoredEntry) -> RemoteEntry {
        let mut entry = RemoteEntry::new(path, stored.kind).with_deleted(stored.deleted);
        if stored.kind == EntryKind::File {
            entry = entry.with_metadata(EntryMetadata::default().with_size(stored.content.len() as u64));
        }
        entry
    }

    fn is_within(path: &str, root: &str) -> bool {
        path == root
            || path
                .strip_prefix(root)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }

    /// Emit progress ticks for `total` units, honoring cancellation between ticks
    async fn stream(&self, total: usize, ctx: &TransferContext) -> Result<(), BackendError> {
        let chunk = self.chunk_size.max(1);
        let mut done = 0usize;
        loop {
            ctx.check_cancelled()?;
            if self.step_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.step_delay).await;
            }
            ctx.check_cancelled()?;
            done = (done + chunk).min(total);
            let percent = if total == 0 {
                100.0
            } else {
                done as f64 / total as f64 * 100.0
            };
            ctx.report_progress(percent);
            if done >= total {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, BackendError> {
        self.take_failure(Operation::List)?;
        let state = self.state();
        if !Self::is_live_folder(&state, path) {
            return Err(BackendError::NotFound(path.to_string()));
        }
        Ok(state
            .entries
            .iter()
            .filter(|(p, _)| parent_path(p) == path)
            .map(|(p, stored)| Self::to_entry(p, stored))
            .collect())
    }

    async fn folder_exists(&self, path: &str) -> Result<bool, BackendError> {
        self.take_failure(Operation::FolderExists)?;
        Ok(Self::is_live_folder(&self.state(), path))
    }

    async fn upload(
        &self,
        source: &Path,
        remote_path: &str,
        mode: WriteMode,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError> {
        self.take_failure(Operation::Upload)?;
        let check_target = |state: &MemoryState| -> Result<(), BackendError> {
            if !Self::is_live_folder(state, parent_path(remote_path)) {
                return Err(BackendError::NotFound(parent_path(remote_path).to_string()));
            }
            match state.entries.get(remote_path) {
                Some(existing) if !existing.deleted => {
                    if existing.kind == EntryKind::Folder || mode == WriteMode::Add {
                        Err(BackendError::Conflict(remote_path.to_string()))
                    } else {
                        Ok(())
                    }
                }
                _ => Ok(()),
            }
        };

        check_target(&*self.state())?;
        let content = tokio::fs::read(source).await?;
        self.stream(content.len(), ctx).await?;

        let mut state = self.state();
        check_target(&*state)?;
        let stored = StoredEntry {
            kind: EntryKind::File,
            deleted: false,
            content,
        };
        let entry = Self::to_entry(remote_path, &stored);
        state.entries.insert(remote_path.to_string(), stored);
        Ok(entry)
    }

    async fn download(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.take_failure(Operation::Download)?;
        let content = Self::live_file(&self.state(), remote_path)?;
        self.stream(content.len(), ctx).await?;
        tokio::fs::write(destination, &content).await?;
        Ok(content.len() as u64)
    }

    async fn copy(
        &self,
        remote_path: &str,
        destination: &str,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError> {
        self.take_failure(Operation::Copy)?;
        let snapshot: Vec<(String, StoredEntry)> = {
            let state = self.state();
            match state.entries.get(remote_path) {
                Some(e) if !e.deleted => {}
                _ => return Err(BackendError::NotFound(remote_path.to_string())),
            }
            if Self::is_within(destination, remote_path) {
                return Err(BackendError::Conflict(destination.to_string()));
            }
            state
                .entries
                .iter()
                .filter(|(p, e)| Self::is_within(p, remote_path) && !e.deleted)
                .map(|(p, e)| (p.clone(), e.clone()))
                .collect()
        };

        self.stream(snapshot.len(), ctx).await?;

        let mut state = self.state();
        if !Self::is_live_folder(&state, parent_path(destination)) {
            return Err(BackendError::NotFound(parent_path(destination).to_string()));
        }
        if state.entries.get(destination).map(|e| !e.deleted).unwrap_or(false) {
            return Err(BackendError::Conflict(destination.to_string()));
        }
        for (path, stored) in snapshot {
            let relocated = format!("{}{}", destination, &path[remote_path.len()..]);
            state.entries.insert(relocated, stored);
        }
        let root = state
            .entries
            .get(destination)
            .map(|stored| Self::to_entry(destination, stored))
            .ok_or_else(|| BackendError::NotFound(destination.to_string()))?;
        Ok(root)
    }

    async fn delete(&self, remote_path: &str) -> Result<RemoteEntry, BackendError> {
        self.take_failure(Operation::Delete)?;
        tokio::task::yield_now().await;
        let mut state = self.state();
        let removed = match state.entries.get(remote_path) {
            Some(e) if !e.deleted => Self::to_entry(remote_path, e).with_deleted(true),
            _ => return Err(BackendError::NotFound(remote_path.to_string())),
        };
        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|p| Self::is_within(p, remote_path))
            .cloned()
            .collect();
        for path in doomed {
            if self.keep_tombstones {
                if let Some(e) = state.entries.get_mut(&path) {
                    e.deleted = true;
                }
            } else {
                state.entries.remove(&path);
            }
        }
        Ok(removed)
    }

    async fn render_preview(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.take_failure(Operation::Preview)?;
        let content = Self::live_file(&self.state(), remote_path)?;
        self.stream(content.len(), ctx).await?;
        let mut rendered = format!("%PDF-1.4\n% preview of {}\n", leaf_name(remote_path)).into_bytes();
        rendered.extend_from_slice(&content);
        tokio::fs::write(destination, &rendered).await?;
        Ok(rendered.len() as u64)
    }

    async fn render_thumbnail(
        &self,
        remote_path: &str,
        destination: &Path,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.take_failure(Operation::Thumbnail)?;
        let content = Self::live_file(&self.state(), remote_path)?;
        self.stream(content.len(), ctx).await?;
        let (width, height) = size.dimensions();
        let mut rendered = format!("{:?} {}x{}\n", format, width, height).into_bytes();
        rendered.extend_from_slice(&content);
        tokio::fs::write(destination, &rendered).await?;
        Ok(rendered.len() as u64)
    }

    async fn check_connection(&self) -> bool {
        self.state().connected
    }

    async fn current_account(&self) -> Result<AccountInfo, BackendError> {
        if !self.state().connected {
            return Err(BackendError::InvalidGrant("session expired".to_string()));
        }
        Ok(self.account.clone())
    }

    async fn space_usage(&self) -> Result<SpaceUsage, BackendError> {
        let state = self.state();
        if !state.connected {
            return Err(BackendError::InvalidGrant("session expired".to_string()));
        }
        let used = state
            .entries
            .values()
            .filter(|e| !e.deleted)
            .map(|e| e.content.len() as u64)
            .sum();
        Ok(SpaceUsage {
            used,
            allocated: self.allocated,
        })
    }
}

/// Compose the upload target for a local file dropped into `folder`
pub fn upload_target(folder: &str, source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    join_path(folder, &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::backend::{CancelToken, ProgressSink};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn recording_context() -> (TransferContext, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |p: f64| seen.lock().unwrap().push(p)) as ProgressSink
        };
        (TransferContext::new(CancelToken::new(), sink), seen)
    }

    #[tokio::test]
    async fn test_list_orders_by_path_and_keeps_tombstones() {
        let backend = MemoryBackend::new();
        backend.insert_file("/b.txt", vec![]);
        backend.insert_folder("/a");
        backend.insert_file("/gone.doc", vec![]);
        backend.mark_deleted("/gone.doc");

        let entries = backend.list(ROOT_PATH).await.unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["/a", "/b.txt", "/gone.doc"]);
        assert!(entries[2].is_deleted());
    }

    #[tokio::test]
    async fn test_list_missing_folder_fails() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.list("/nope").await,
            Err(BackendError::NotFound("/nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_download_reports_chunked_progress() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.bin");
        let backend = MemoryBackend::new().with_chunk_size(4);
        backend.insert_file("/f.bin", b"0123456789abcdef".to_vec());

        let (ctx, seen) = recording_context();
        let written = backend.download("/f.bin", &dest, &ctx).await.unwrap();

        assert_eq!(written, 16);
        assert_eq!(*seen.lock().unwrap(), vec![25.0, 50.0, 75.0, 100.0]);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789abcdef");
    }

    #[tokio::test]
    async fn test_cancelled_download_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.bin");
        let backend = MemoryBackend::new().with_chunk_size(1);
        backend.insert_file("/f.bin", b"abc".to_vec());

        let (ctx, _) = recording_context();
        ctx.cancel_token().cancel();
        let result = backend.download("/f.bin", &dest, &ctx).await;

        assert_eq!(result, Err(BackendError::Cancelled));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_upload_add_mode_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("notes.txt");
        std::fs::write(&source, "v2").unwrap();
        let backend = MemoryBackend::new();
        backend.insert_file("/notes.txt", b"v1".to_vec());

        let ctx = TransferContext::detached();
        let err = backend
            .upload(&source, "/notes.txt", WriteMode::Add, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));

        let entry = backend
            .upload(&source, "/notes.txt", WriteMode::Overwrite, &ctx)
            .await
            .unwrap();
        assert_eq!(entry.metadata().and_then(|m| m.size), Some(2));
        assert_eq!(backend.file_content("/notes.txt"), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_copy_folder_recursively() {
        let backend = MemoryBackend::new();
        backend.insert_file("/src/a.txt", b"a".to_vec());
        backend.insert_file("/src/deep/b.txt", b"b".to_vec());
        backend.insert_folder("/dst");

        let entry = backend
            .copy("/src", "/dst/src", &TransferContext::detached())
            .await
            .unwrap();

        assert!(entry.is_folder());
        assert_eq!(backend.file_content("/dst/src/a.txt"), Some(b"a".to_vec()));
        assert_eq!(backend.file_content("/dst/src/deep/b.txt"), Some(b"b".to_vec()));
        assert!(backend.contains("/src/a.txt"));
    }

    #[tokio::test]
    async fn test_copy_into_itself_is_rejected() {
        let backend = MemoryBackend::new();
        backend.insert_folder("/src");
        let err = backend
            .copy("/src", "/src/inner", &TransferContext::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_subtree_or_leaves_tombstones() {
        let backend = MemoryBackend::new();
        backend.insert_file("/a/c.png", vec![1]);
        backend.delete("/a").await.unwrap();
        assert!(!backend.contains("/a"));
        assert!(backend.list(ROOT_PATH).await.unwrap().is_empty());

        let backend = MemoryBackend::new().with_tombstones(true);
        backend.insert_file("/a/c.png", vec![1]);
        let removed = backend.delete("/a/c.png").await.unwrap();
        assert!(removed.is_deleted());
        let listing = backend.list("/a").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].is_deleted());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::List, BackendError::Timeout);
        assert_eq!(backend.list(ROOT_PATH).await, Err(BackendError::Timeout));
        assert!(backend.list(ROOT_PATH).await.is_ok());
    }

    #[tokio::test]
    async fn test_thumbnail_header_reflects_request() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("thumb.jpg");
        let backend = MemoryBackend::new();
        backend.insert_file("/pic.png", b"px".to_vec());

        backend
            .render_thumbnail(
                "/pic.png",
                &dest,
                ThumbnailFormat::Jpeg,
                ThumbnailSize::W1024H768,
                &TransferContext::detached(),
            )
            .await
            .unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        assert!(written.starts_with("Jpeg 1024x768\n"));
    }

    #[tokio::test]
    async fn test_disconnected_account_is_invalid_grant() {
        let backend = MemoryBackend::new();
        backend.set_connected(false);
        assert!(!backend.check_connection().await);
        assert!(backend.current_account().await.unwrap_err().is_auth());
    }

    #[test]
    fn test_upload_target() {
        assert_eq!(upload_target("", Path::new("/tmp/x.txt")), "/x.txt");
        assert_eq!(upload_target("/docs", Path::new("report.doc")), "/docs/report.doc");
    }

    #[test]
    fn test_from_fixture() {
        let fixture: Vec<FixtureEntry> = serde_json::from_str(
            r#"[
                {"path": "/a/c.png", "kind": "file", "content": "png"},
                {"path": "/old.txt", "kind": "file", "deleted": true}
            ]"#,
        )
        .unwrap();
        let backend = MemoryBackend::from_fixture(&fixture);
        assert!(backend.contains("/a"));
        assert_eq!(backend.file_content("/a/c.png"), Some(b"png".to_vec()));
        assert!(!backend.contains("/old.txt"));
    }
}
