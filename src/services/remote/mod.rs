// Remote storage abstraction layer
//
// This module wraps the cloud storage collaborator behind an async trait so
// the navigator and transfer coordinator never talk to a concrete service.

pub mod backend;
pub mod manager;
pub mod memory;
pub mod slow;

pub use backend::{
    join_path, leaf_name, parent_path, AccountInfo, BackendError, CancelToken, EntryKind,
    EntryMetadata, ProgressSink, RemoteBackend, RemoteEntry, SpaceUsage, ThumbnailFormat,
    ThumbnailSize, TransferContext, WriteMode, ROOT_PATH,
};
pub use manager::RemoteManager;
pub use memory::{upload_target, FixtureEntry, MemoryBackend, Operation};
pub use slow::{BackendMetrics, SlowRemoteBackend, SlowRemoteConfig};
