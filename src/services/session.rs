//! Connected remote session
//!
//! A `RemoteSession` wraps the client handle supplied by the auth
//! collaborator. It is built once, after the user has signed in, and handed
//! to the navigator and the folder picker.

use crate::config::Config;
use crate::error::Result;
use crate::model::AccountSummary;
use crate::services::remote::{BackendError, RemoteBackend, RemoteManager};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RemoteSession {
    manager: Arc<RemoteManager>,
    config: Arc<Config>,
}

impl RemoteSession {
    /// Wrap a signed-in backend, verifying the handle is usable
    ///
    /// A rejected handle surfaces as `InvalidGrant`, unchanged.
    pub async fn connect(backend: Arc<dyn RemoteBackend>, config: Config) -> Result<Self> {
        if !backend.check_connection().await {
            tracing::warn!("Remote session is not connected");
            return Err(BackendError::InvalidGrant("client is not connected".to_string()).into());
        }
        tracing::info!("Remote session connected");

        Ok(Self {
            manager: Arc::new(RemoteManager::new(backend)),
            config: Arc::new(config),
        })
    }

    pub fn manager(&self) -> &Arc<RemoteManager> {
        &self.manager
    }

    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        self.manager.backend()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the signed-in account and its quota
    pub async fn account_summary(&self) -> Result<AccountSummary> {
        let account = self.manager.current_account().await?;
        let usage = self.manager.space_usage().await?;
        Ok(AccountSummary::new(account, usage))
    }
}
