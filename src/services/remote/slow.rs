//! Slow remote backend for testing
//!
//! This module provides a decorator around any RemoteBackend that adds
//! configurable latency to listings, lookups and transfers, and counts every
//! call. It is used to test that the navigator stays single-flight and never
//! issues duplicate listings while a request is outstanding.

use super::backend::{
    AccountInfo, BackendError, RemoteBackend, RemoteEntry, SpaceUsage, ThumbnailFormat,
    ThumbnailSize, TransferContext, WriteMode,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Configuration for slow backend simulation
#[derive(Debug, Clone)]
pub struct SlowRemoteConfig {
    /// Delay for list operations
    pub list_delay: Duration,
    /// Delay for folder_exists and account lookups
    pub lookup_delay: Duration,
    /// Delay before a transfer starts
    pub transfer_delay: Duration,
}

impl SlowRemoteConfig {
    /// Create a config with uniform delay for all operations
    pub fn uniform(delay: Duration) -> Self {
        Self {
            list_delay: delay,
            lookup_delay: delay,
            transfer_delay: delay,
        }
    }

    /// Create a config with no delays (useful as a baseline)
    pub fn none() -> Self {
        Self::uniform(Duration::ZERO)
    }

    /// Create a config simulating a congested cloud API
    pub fn slow_network() -> Self {
        Self {
            list_delay: Duration::from_millis(500),
            lookup_delay: Duration::from_millis(100),
            transfer_delay: Duration::from_millis(250),
        }
    }
}

impl Default for SlowRemoteConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Metrics tracking for backend calls
#[derive(Debug, Clone, Default)]
pub struct BackendMetrics {
    /// Number of list calls, and the paths listed in call order
    pub list_calls: usize,
    pub listed_paths: Vec<String>,
    /// Number of folder_exists calls
    pub folder_exists_calls: usize,
    /// Number of transfer calls (upload, download, copy, delete, preview, thumbnail)
    pub transfer_calls: usize,
    /// Number of account and quota lookups
    pub account_calls: usize,
    /// Total time spent in artificial delays
    pub total_delay_time: Duration,
}

impl BackendMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Get total number of backend calls
    pub fn total_calls(&self) -> usize {
        self.list_calls + self.folder_exists_calls + self.transfer_calls + self.account_calls
    }
}

/// Slow remote backend wrapper for testing
pub struct SlowRemoteBackend {
    inner: Arc<dyn RemoteBackend>,
    config: SlowRemoteConfig,
    metrics: Arc<Mutex<BackendMetrics>>,
}

impl SlowRemoteBackend {
    pub fn new(inner: Arc<dyn RemoteBackend>, config: SlowRemoteConfig) -> Self {
        Self {
            inner,
            config,
            metrics: Arc::new(Mutex::new(BackendMetrics::new())),
        }
    }

    /// Create with uniform delay for all operations
    pub fn with_uniform_delay(inner: Arc<dyn RemoteBackend>, delay: Duration) -> Self {
        Self::new(inner, SlowRemoteConfig::uniform(delay))
    }

    /// Get a snapshot of current metrics
    pub async fn metrics(&self) -> BackendMetrics {
        self.metrics.lock().await.clone()
    }

    pub async fn reset_metrics(&self) {
        self.metrics.lock().await.reset();
    }

    async fn add_delay(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            self.metrics.lock().await.total_delay_time += delay;
        }
    }

    async fn count_transfer(&self) {
        self.add_delay(self.config.transfer_delay).await;
        self.metrics.lock().await.transfer_calls += 1;
    }
}

#[async_trait]
impl RemoteBackend for SlowRemoteBackend {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, BackendError> {
        {
            let mut metrics = self.metrics.lock().await;
            metrics.list_calls += 1;
            metrics.listed_paths.push(path.to_string());
        }
        self.add_delay(self.config.list_delay).await;
        self.inner.list(path).await
    }

    async fn folder_exists(&self, path: &str) -> Result<bool, BackendError> {
        self.add_delay(self.config.lookup_delay).await;
        self.metrics.lock().await.folder_exists_calls += 1;
        self.inner.folder_exists(path).await
    }

    async fn upload(
        &self,
        source: &Path,
        remote_path: &str,
        mode: WriteMode,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError> {
        self.count_transfer().await;
        self.inner.upload(source, remote_path, mode, ctx).await
    }

    async fn download(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.count_transfer().await;
        self.inner.download(remote_path, destination, ctx).await
    }

    async fn copy(
        &self,
        remote_path: &str,
        destination: &str,
        ctx: &TransferContext,
    ) -> Result<RemoteEntry, BackendError> {
        self.count_transfer().await;
        self.inner.copy(remote_path, destination, ctx).await
    }

    async fn delete(&self, remote_path: &str) -> Result<RemoteEntry, BackendError> {
        self.count_transfer().await;
        self.inner.delete(remote_path).await
    }

    async fn render_preview(
        &self,
        remote_path: &str,
        destination: &Path,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.count_transfer().await;
        self.inner.render_preview(remote_path, destination, ctx).await
    }

    async fn render_thumbnail(
        &self,
        remote_path: &str,
        destination: &Path,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        ctx: &TransferContext,
    ) -> Result<u64, BackendError> {
        self.count_transfer().await;
        self.inner
            .render_thumbnail(remote_path, destination, format, size, ctx)
            .await
    }

    async fn check_connection(&self) -> bool {
        self.add_delay(self.config.lookup_delay).await;
        self.inner.check_connection().await
    }

    async fn current_account(&self) -> Result<AccountInfo, BackendError> {
        self.add_delay(self.config.lookup_delay).await;
        self.metrics.lock().await.account_calls += 1;
        self.inner.current_account().await
    }

    async fn space_usage(&self) -> Result<SpaceUsage, BackendError> {
        self.add_delay(self.config.lookup_delay).await;
        self.metrics.lock().await.account_calls += 1;
        self.inner.space_usage().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::MemoryBackend;
    use std::time::Instant;

    fn memory() -> Arc<MemoryBackend> {
        let backend = MemoryBackend::new();
        backend.insert_file("/a/c.png", b"png".to_vec());
        Arc::new(backend)
    }

    #[tokio::test]
    async fn test_slow_backend_adds_delay() {
        let delay = Duration::from_millis(50);
        let slow = SlowRemoteBackend::with_uniform_delay(memory(), delay);

        let start = Instant::now();
        let entries = slow.list("").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(entries.len(), 1);
        assert!(elapsed >= delay, "expected at least {:?}, got {:?}", delay, elapsed);
    }

    #[tokio::test]
    async fn test_metrics_tracking() {
        let slow = SlowRemoteBackend::new(memory(), SlowRemoteConfig::none());

        slow.list("").await.unwrap();
        slow.list("/a").await.unwrap();
        slow.folder_exists("/a").await.unwrap();
        slow.delete("/a/c.png").await.unwrap();
        slow.space_usage().await.unwrap();

        let metrics = slow.metrics().await;
        assert_eq!(metrics.list_calls, 2);
        assert_eq!(metrics.listed_paths, vec!["".to_string(), "/a".to_string()]);
        assert_eq!(metrics.folder_exists_calls, 1);
        assert_eq!(metrics.transfer_calls, 1);
        assert_eq!(metrics.account_calls, 1);
        assert_eq!(metrics.total_calls(), 5);

        slow.reset_metrics().await;
        assert_eq!(slow.metrics().await.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_listing_counted_before_delay() {
        let slow = Arc::new(SlowRemoteBackend::with_uniform_delay(
            memory(),
            Duration::from_millis(100),
        ));
        let pending = {
            let slow = Arc::clone(&slow);
            tokio::spawn(async move { slow.list("").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(slow.metrics().await.list_calls, 1);
        pending.await.unwrap().unwrap();
    }
}
