use super::request::{TransferKind, TransferRequest, TransferResult};
use crate::error::{ExplorerError, Result};
use crate::services::remote::{
    BackendError, CancelToken, ProgressSink, RemoteBackend, TransferContext,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Lifecycle of a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

/// Terminal outcome of a session; exactly one per session
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Completed(TransferResult),
    Failed(BackendError),
    Cancelled,
}

impl TransferOutcome {
    pub fn state(&self) -> TransferState {
        match self {
            TransferOutcome::Completed(_) => TransferState::Completed,
            TransferOutcome::Failed(_) => TransferState::Failed,
            TransferOutcome::Cancelled => TransferState::Cancelled,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }

    fn from_result(kind: TransferKind, result: std::result::Result<TransferResult, BackendError>) -> Self {
        match result {
            Ok(result) => TransferOutcome::Completed(result),
            Err(BackendError::Cancelled) if kind.is_cancellable() => TransferOutcome::Cancelled,
            Err(e) => TransferOutcome::Failed(e),
        }
    }
}

/// Item of a session's event stream
///
/// Zero or more `Progress` values, in backend order, then one `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Raw percent as reported by the backend
    Progress(f64),
    Finished(TransferOutcome),
}

/// Caller side of a running session
#[derive(Debug)]
pub struct TransferHandle {
    kind: TransferKind,
    events: mpsc::UnboundedReceiver<TransferEvent>,
    finished: bool,
}

impl TransferHandle {
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Next event, or None once the terminal event has been consumed
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        if self.finished {
            return None;
        }
        let event = match self.events.recv().await {
            Some(event) => event,
            // Session task went away without reporting
            None => TransferEvent::Finished(TransferOutcome::Failed(BackendError::Network(
                "transfer task ended without an outcome".to_string(),
            ))),
        };
        if matches!(event, TransferEvent::Finished(_)) {
            self.finished = true;
        }
        Some(event)
    }

    /// Wait for the outcome, discarding progress
    pub async fn wait(self) -> TransferOutcome {
        self.wait_with(|_| {}).await
    }

    /// Wait for the outcome, passing each progress value to `on_progress`
    pub async fn wait_with<F>(mut self, mut on_progress: F) -> TransferOutcome
    where
        F: FnMut(f64),
    {
        loop {
            match self.next_event().await {
                Some(TransferEvent::Progress(percent)) => on_progress(percent),
                Some(TransferEvent::Finished(outcome)) => return outcome,
                None => {
                    return TransferOutcome::Failed(BackendError::Network(
                        "transfer handle already finished".to_string(),
                    ))
                }
            }
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    kind: TransferKind,
    state: TransferState,
    cancel: CancelToken,
}

type SessionSlot = Arc<Mutex<Option<ActiveSession>>>;

fn lock(slot: &SessionSlot) -> MutexGuard<'_, Option<ActiveSession>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Frees the session slot when the session task ends, even by panic
struct SlotRelease(SessionSlot);

impl Drop for SlotRelease {
    fn drop(&mut self) {
        lock(&self.0).take();
    }
}

/// Runs at most one transfer session at a time
///
/// `start` spawns the backend call on the current tokio runtime and returns
/// a [`TransferHandle`] streaming progress and the terminal outcome. The
/// session slot is released before the terminal event is sent, so a caller
/// that has seen `Finished` can start the next transfer right away.
#[derive(Clone)]
pub struct TransferCoordinator {
    backend: Arc<dyn RemoteBackend>,
    active: SessionSlot,
}

impl fmt::Debug for TransferCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCoordinator")
            .field("active", &*lock(&self.active))
            .finish()
    }
}

impl TransferCoordinator {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Current session state (`Idle` when nothing runs)
    pub fn state(&self) -> TransferState {
        lock(&self.active)
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(TransferState::Idle)
    }

    /// Kind of the running session, if any
    pub fn active_kind(&self) -> Option<TransferKind> {
        lock(&self.active).as_ref().map(|s| s.kind)
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Start a session
    ///
    /// Fails with `AlreadyRunning` while another session is outstanding.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: TransferRequest) -> Result<TransferHandle> {
        let kind = request.kind();
        let cancel = CancelToken::new();
        {
            let mut slot = lock(&self.active);
            if let Some(active) = slot.as_ref() {
                tracing::debug!("Rejecting {} while {} is running", kind, active.kind);
                return Err(ExplorerError::AlreadyRunning(active.kind));
            }
            *slot = Some(ActiveSession {
                kind,
                state: TransferState::Running,
                cancel: cancel.clone(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sink: ProgressSink = {
            let tx = tx.clone();
            Arc::new(move |percent: f64| {
                let _ = tx.send(TransferEvent::Progress(percent));
            })
        };
        let ctx = TransferContext::new(cancel, sink);
        let backend = Arc::clone(&self.backend);
        let release = SlotRelease(Arc::clone(&self.active));

        tracing::info!("Starting {} of {:?}", kind, request.remote_path());
        tokio::spawn(async move {
            let result = execute(backend.as_ref(), &request, &ctx).await;
            let outcome = TransferOutcome::from_result(kind, result);
            match &outcome {
                TransferOutcome::Completed(_) => {
                    tracing::info!("{} of {:?} completed", kind, request.remote_path())
                }
                TransferOutcome::Failed(e) => {
                    tracing::warn!("{} of {:?} failed: {}", kind, request.remote_path(), e)
                }
                TransferOutcome::Cancelled => {
                    tracing::info!("{} of {:?} cancelled", kind, request.remote_path())
                }
            }
            drop(ctx);
            drop(release);
            let _ = tx.send(TransferEvent::Finished(outcome));
        });

        Ok(TransferHandle {
            kind,
            events: rx,
            finished: false,
        })
    }

    /// Request cooperative cancellation of the running session
    ///
    /// Returns true if a request was registered. Nothing happens (false)
    /// when idle, when already cancelling, or for a delete.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.active);
        match slot.as_mut() {
            Some(session) if session.state == TransferState::Running => {
                if !session.kind.is_cancellable() {
                    tracing::debug!("Ignoring cancel for {}", session.kind);
                    return false;
                }
                session.state = TransferState::Cancelling;
                session.cancel.cancel();
                tracing::info!("Cancelling {}", session.kind);
                true
            }
            _ => false,
        }
    }
}

async fn execute(
    backend: &dyn RemoteBackend,
    request: &TransferRequest,
    ctx: &TransferContext,
) -> std::result::Result<TransferResult, BackendError> {
    match request {
        TransferRequest::Upload {
            source,
            remote_path,
            mode,
        } => backend
            .upload(source, remote_path, *mode, ctx)
            .await
            .map(TransferResult::Entry),
        TransferRequest::Download {
            remote_path,
            destination,
        } => {
            let bytes = backend.download(remote_path, destination, ctx).await?;
            Ok(TransferResult::File {
                destination: destination.clone(),
                bytes,
            })
        }
        TransferRequest::Copy {
            remote_path,
            destination,
        } => backend
            .copy(remote_path, destination, ctx)
            .await
            .map(TransferResult::Entry),
        TransferRequest::Delete { remote_path } => {
            backend.delete(remote_path).await.map(TransferResult::Entry)
        }
        TransferRequest::Preview {
            remote_path,
            destination,
        } => {
            let bytes = backend.render_preview(remote_path, destination, ctx).await?;
            Ok(TransferResult::File {
                destination: destination.clone(),
                bytes,
            })
        }
        TransferRequest::Thumbnail {
            remote_path,
            destination,
            format,
            size,
        } => {
            let bytes = backend
                .render_thumbnail(remote_path, destination, *format, *size, ctx)
                .await?;
            Ok(TransferResult::File {
                destination: destination.clone(),
                bytes,
            })
        }
    }
}
