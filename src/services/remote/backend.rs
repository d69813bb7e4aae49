use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::Notify;

/// Path of the namespace root. Every other path starts with `/`.
pub const ROOT_PATH: &str = "";

/// Last path segment (`/a/c.png` -> `c.png`)
pub fn leaf_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Containing folder (`/a/c.png` -> `/a`, `/a` -> root)
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => ROOT_PATH,
    }
}

/// Compose a child path under `folder`. The root folder is the empty string.
pub fn join_path(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Represents one remote file or folder as returned by a listing
///
/// Entries are value snapshots: the path and kind are fixed at construction
/// and the display name is always derived from the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    path: String,
    kind: EntryKind,
    #[serde(default)]
    deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<EntryMetadata>,
}

impl RemoteEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            deleted: false,
            metadata: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::Folder)
    }

    /// Mark this snapshot as a tombstone
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        leaf_name(&self.path)
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn metadata(&self) -> Option<&EntryMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Type of remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// Optional listing metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl EntryMetadata {
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// How an upload treats an existing entry at the target path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Fail with a conflict if the target exists
    #[default]
    Add,
    /// Replace the existing file
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Jpeg,
    Png,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    W32H32,
    W64H64,
    W128H128,
    W640H480,
    #[default]
    W1024H768,
}

impl ThumbnailSize {
    /// Bounding box as (width, height)
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ThumbnailSize::W32H32 => (32, 32),
            ThumbnailSize::W64H64 => (64, 64),
            ThumbnailSize::W128H128 => (128, 128),
            ThumbnailSize::W640H480 => (640, 480),
            ThumbnailSize::W1024H768 => (1024, 768),
        }
    }
}

/// The signed-in account, as reported by the auth/session collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub display_name: String,
}

/// Storage quota in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceUsage {
    pub used: u64,
    pub allocated: u64,
}

/// Failure returned by any remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Target already exists (upload in add mode, copy onto existing path).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request timed out")]
    Timeout,

    /// Token rejected by the auth collaborator; passed through unchanged.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// The call observed a cancellation request and unwound.
    #[error("operation cancelled")]
    Cancelled,

    /// Local I/O on the user-chosen source or destination failed.
    #[error("local I/O error: {0}")]
    LocalIo(String),
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::InvalidGrant(_))
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::LocalIo(e.to_string())
    }
}

/// Cooperative cancellation flag shared between a coordinator and a backend call
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns true only for the first request.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.flag.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Progress callback handed to backend transfer calls
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Per-call handle a backend uses to report progress and observe cancellation
#[derive(Clone)]
pub struct TransferContext {
    progress: Option<ProgressSink>,
    cancel: CancelToken,
}

impl fmt::Debug for TransferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferContext")
            .field("progress", &self.progress.as_ref().map(|_| "<fn>"))
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl TransferContext {
    pub fn new(cancel: CancelToken, progress: ProgressSink) -> Self {
        Self {
            progress: Some(progress),
            cancel,
        }
    }

    /// A context nobody listens to and nobody cancels
    pub fn detached() -> Self {
        Self {
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    /// Forward a raw percent value (no clamping)
    pub fn report_progress(&self, percent: f64) {
        if let Some(progress) = &self.progress {
            progress(percent);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check_cancelled(&self) -> Result<(), BackendError> {
        if self.is_cancelled() {
            Err(BackendError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Async remote-storage collaborator
///
/// This trait abstracts the cloud storage service (listing, transfers,
/// account lookups) so the navigator and coordinator can run against any
/// provider, or against an in-memory fake in tests. Implementations own
/// their timeouts; a timeout surfaces as [`BackendError::Timeout`].
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// List the direct children of a folder (non-recursive)
    ///
    /// The returned order is the order the tree shows; callers never sort.
    /// Tombstones may be included with `deleted = true`.
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, BackendError>;

    /// Check whether a live folder exists at `path`
    async fn folder_exists(&self, path: &str) -> Result<bool, BackendError>;

    /// Upload a local file to `remote_path`
    async fn upload(
        &self,
        source: &Path,
        remote_path: &str,
        mode: WriteMode,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError>;

    /// Download a remote file into `destination`, returning bytes written
    async fn download(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError>;

    /// Copy a file or folder to `destination` within the namespace
    async fn copy(
        &self,
        remote_path: &str,
        destination: &str,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError>;

    /// Delete a file or folder, returning the removed entry
    async fn delete(&self, remote_path: &str) -> Result<RemoteEntry, BackendError>;

    /// Render a document preview (PDF) into `destination`
    async fn render_preview(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError>;

    /// Render an image thumbnail into `destination`
    async fn render_thumbnail(
        &self,
        remote_path: &str,
        destination: &Path,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError>;

    /// Whether the connected client handle is still usable
    async fn check_connection(&self) -> bool;

    async fn current_account(&self) -> Result<AccountInfo, BackendError>;

    async fn space_usage(&self) -> Result<SpaceUsage, BackendError>;
}
