// Shared helpers for integration tests

#![allow(dead_code)]

pub mod tracing;

use cloud_explorer::app::Navigator;
use cloud_explorer::config::Config;
use cloud_explorer::services::remote::{MemoryBackend, SlowRemoteBackend, SlowRemoteConfig};
use cloud_explorer::services::session::RemoteSession;
use std::sync::Arc;

/// Navigator over `backend`, with a call-counting wrapper in between
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub slow: Arc<SlowRemoteBackend>,
    pub navigator: Navigator,
}

impl Harness {
    pub async fn new(backend: MemoryBackend) -> Self {
        Self::with_delays(backend, Default::default()).await
    }

    pub async fn with_delays(backend: MemoryBackend, delays: SlowRemoteConfig) -> Self {
        tracing::init_tracing_from_env();
        let backend = Arc::new(backend);
        let slow = Arc::new(SlowRemoteBackend::new(backend.clone(), delays));
        let session = RemoteSession::connect(slow.clone(), Config::default())
            .await
            .expect("memory backend is connected");
        Self {
            backend,
            slow,
            navigator: Navigator::new(session),
        }
    }
}

/// Root with `/a` (folder) and `/b.txt` (file); `/a` holds `/a/c.png`
pub fn scenario_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.insert_folder("/a");
    backend.insert_file("/b.txt", b"bee".to_vec());
    backend.insert_file("/a/c.png", b"png".to_vec());
    backend
}
