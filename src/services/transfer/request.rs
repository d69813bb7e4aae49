use crate::services::remote::{
    join_path, leaf_name, parent_path, upload_target, RemoteEntry, ThumbnailFormat, ThumbnailSize,
    WriteMode,
};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Upload,
    Download,
    Copy,
    Delete,
    Preview,
    Thumbnail,
}

impl TransferKind {
    /// Delete cannot be cancelled once issued
    pub fn is_cancellable(self) -> bool {
        self != TransferKind::Delete
    }

    /// Whether a completed session changed the remote namespace
    pub fn mutates_namespace(self) -> bool {
        matches!(
            self,
            TransferKind::Upload | TransferKind::Copy | TransferKind::Delete
        )
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferKind::Upload => "upload",
            TransferKind::Download => "download",
            TransferKind::Copy => "copy",
            TransferKind::Delete => "delete",
            TransferKind::Preview => "preview",
            TransferKind::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// Parameters of one transfer, as handed to [`TransferCoordinator::start`]
///
/// [`TransferCoordinator::start`]: super::TransferCoordinator::start
#[derive(Debug, Clone, PartialEq)]
pub enum TransferRequest {
    Upload {
        source: PathBuf,
        remote_path: String,
        mode: WriteMode,
    },
    Download {
        remote_path: String,
        destination: PathBuf,
    },
    Copy {
        remote_path: String,
        destination: String,
    },
    Delete {
        remote_path: String,
    },
    Preview {
        remote_path: String,
        destination: PathBuf,
    },
    Thumbnail {
        remote_path: String,
        destination: PathBuf,
        format: ThumbnailFormat,
        size: ThumbnailSize,
    },
}

impl TransferRequest {
    /// Upload `source` into `folder`, keeping the local file name
    pub fn upload_into(folder: &str, source: impl AsRef<Path>, mode: WriteMode) -> Self {
        let source = source.as_ref();
        TransferRequest::Upload {
            remote_path: upload_target(folder, source),
            source: source.to_path_buf(),
            mode,
        }
    }

    /// Copy `remote_path` into `folder`, keeping its name
    pub fn copy_into(remote_path: &str, folder: &str) -> Self {
        TransferRequest::Copy {
            remote_path: remote_path.to_string(),
            destination: join_path(folder, leaf_name(remote_path)),
        }
    }

    pub fn kind(&self) -> TransferKind {
        match self {
            TransferRequest::Upload { .. } => TransferKind::Upload,
            TransferRequest::Download { .. } => TransferKind::Download,
            TransferRequest::Copy { .. } => TransferKind::Copy,
            TransferRequest::Delete { .. } => TransferKind::Delete,
            TransferRequest::Preview { .. } => TransferKind::Preview,
            TransferRequest::Thumbnail { .. } => TransferKind::Thumbnail,
        }
    }

    /// The remote path the session is about
    pub fn remote_path(&self) -> &str {
        match self {
            TransferRequest::Upload { remote_path, .. }
            | TransferRequest::Download { remote_path, .. }
            | TransferRequest::Copy { remote_path, .. }
            | TransferRequest::Delete { remote_path }
            | TransferRequest::Preview { remote_path, .. }
            | TransferRequest::Thumbnail { remote_path, .. } => remote_path,
        }
    }

    /// Folder whose listing is stale once this request completes
    pub fn affected_folder(&self) -> Option<&str> {
        match self {
            TransferRequest::Upload { remote_path, .. } | TransferRequest::Delete { remote_path } => {
                Some(parent_path(remote_path))
            }
            TransferRequest::Copy { destination, .. } => Some(parent_path(destination)),
            _ => None,
        }
    }
}

/// What a completed session produced
#[derive(Debug, Clone, PartialEq)]
pub enum TransferResult {
    /// Upload, copy and delete return the affected remote entry
    Entry(RemoteEntry),
    /// Download and rendering return the local file written
    File { destination: PathBuf, bytes: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::ROOT_PATH;

    #[test]
    fn test_upload_into_composes_target() {
        let req = TransferRequest::upload_into("/Photos", "/home/me/cat.jpg", WriteMode::Add);
        assert_eq!(req.remote_path(), "/Photos/cat.jpg");
        assert_eq!(req.kind(), TransferKind::Upload);
        assert_eq!(req.affected_folder(), Some("/Photos"));

        let at_root = TransferRequest::upload_into(ROOT_PATH, "cat.jpg", WriteMode::Add);
        assert_eq!(at_root.remote_path(), "/cat.jpg");
        assert_eq!(at_root.affected_folder(), Some(ROOT_PATH));
    }

    #[test]
    fn test_copy_into_refreshes_destination_folder() {
        let req = TransferRequest::copy_into("/a/c.png", "/backup");
        assert_eq!(
            req,
            TransferRequest::Copy {
                remote_path: "/a/c.png".to_string(),
                destination: "/backup/c.png".to_string(),
            }
        );
        assert_eq!(req.affected_folder(), Some("/backup"));
    }

    #[test]
    fn test_delete_refreshes_parent() {
        let req = TransferRequest::Delete {
            remote_path: "/a/c.png".to_string(),
        };
        assert_eq!(req.affected_folder(), Some("/a"));
        assert!(!req.kind().is_cancellable());
    }

    #[test]
    fn test_reads_do_not_refresh() {
        let req = TransferRequest::Download {
            remote_path: "/b.txt".to_string(),
            destination: PathBuf::from("b.txt"),
        };
        assert_eq!(req.affected_folder(), None);
        assert!(!req.kind().mutates_namespace());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TransferKind::Thumbnail.to_string(), "thumbnail");
        assert_eq!(TransferKind::Delete.to_string(), "delete");
    }
}
