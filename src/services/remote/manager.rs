use super::backend::{AccountInfo, BackendError, RemoteBackend, RemoteEntry, SpaceUsage};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type ListingResult = Result<Vec<RemoteEntry>, BackendError>;

type Waiters = HashMap<String, Vec<oneshot::Sender<ListingResult>>>;

/// Type alias for pending listing requests map
type PendingListings = Arc<Mutex<Waiters>>;

fn lock(pending: &PendingListings) -> MutexGuard<'_, Waiters> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns the in-flight entry for one path while its backend call runs
///
/// Dropped without `complete` (the listing future was abandoned), it
/// removes the entry so waiters fail fast and later listings of the path
/// reach the backend again.
struct InFlightListing<'a> {
    pending: &'a PendingListings,
    path: &'a str,
    completed: bool,
}

impl InFlightListing<'_> {
    fn complete(mut self, result: &ListingResult) {
        let senders = lock(self.pending).remove(self.path).unwrap_or_default();
        self.completed = true;
        for sender in senders {
            let _ = sender.send(result.clone());
        }
    }
}

impl Drop for InFlightListing<'_> {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!("Listing {:?} abandoned", self.path);
            lock(self.pending).remove(self.path);
        }
    }
}

/// Manages remote lookups with listing deduplication
///
/// The RemoteManager sits between the navigator and the storage backend:
/// - Concurrent listings of the same folder share one backend call
/// - Every backend failure is logged once, here
pub struct RemoteManager {
    backend: Arc<dyn RemoteBackend>,
    /// Map of folder path -> channels waiting for the in-flight listing
    pending_listings: PendingListings,
}

impl fmt::Debug for RemoteManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteManager")
            .field("backend", &"<dyn RemoteBackend>")
            .field("pending_listings", &"<mutex>")
            .finish()
    }
}

impl RemoteManager {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend,
            pending_listings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// List a folder with request deduplication
    ///
    /// If several requests for the same folder overlap, only one backend
    /// call is made and every requester receives the same result.
    pub async fn list(&self, path: &str) -> ListingResult {
        let waiter = {
            let mut pending = lock(&self.pending_listings);
            if let Some(senders) = pending.get_mut(path) {
                // There's already a listing in flight, just add our channel
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                Some(rx)
            } else {
                pending.insert(path.to_string(), Vec::new());
                None
            }
        };

        if let Some(rx) = waiter {
            return rx
                .await
                .unwrap_or_else(|_| Err(BackendError::Network("listing abandoned".to_string())));
        }

        let in_flight = InFlightListing {
            pending: &self.pending_listings,
            path,
            completed: false,
        };
        tracing::debug!("Listing remote folder {:?}", path);
        let result = self.backend.list(path).await;
        if let Err(e) = &result {
            tracing::warn!("Listing {:?} failed: {}", path, e);
        }
        in_flight.complete(&result);

        result
    }

    pub async fn folder_exists(&self, path: &str) -> Result<bool, BackendError> {
        self.backend.folder_exists(path).await
    }

    pub async fn check_connection(&self) -> bool {
        self.backend.check_connection().await
    }

    pub async fn current_account(&self) -> Result<AccountInfo, BackendError> {
        self.backend.current_account().await
    }

    pub async fn space_usage(&self) -> Result<SpaceUsage, BackendError> {
        self.backend.space_usage().await
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        &self.backend
    }
}

impl Clone for RemoteManager {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            pending_listings: Arc::clone(&self.pending_listings),
        }
    }
}
