//! The list of selectable batches.
//!
//! Loading is cache-first: a cached catalog is returned at once and a
//! server refresh runs in the background, replacing the in-memory and
//! persisted catalog for later loads. Without a cache the server fetch is
//! awaited and its failure is reported as `NoBatchesAvailable`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ProxyClient, TimetableError};
use crate::cache::TimetableCache;
use crate::config::Config;
use crate::models::Batch;
use crate::parse::parse_batch_options;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clone is cheap; clones share the in-memory catalog and refresh task.
#[derive(Clone)]
pub struct BatchCatalog {
    client: ProxyClient,
    cache: TimetableCache,
    base_url: Arc<str>,
    control_id: Arc<str>,
    current: Arc<Mutex<Option<Vec<Batch>>>>,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BatchCatalog {
    pub fn new(client: ProxyClient, cache: TimetableCache, config: &Config) -> Self {
        Self {
            client,
            cache,
            base_url: Arc::from(config.base_url.as_str()),
            control_id: Arc::from(config.batch_control_id.as_str()),
            current: Arc::new(Mutex::new(None)),
            refresh_task: Arc::new(Mutex::new(None)),
        }
    }

    /// The latest catalog known in memory, empty before the first load
    pub fn current(&self) -> Vec<Batch> {
        lock(&self.current).clone().unwrap_or_default()
    }

    fn cached(&self) -> Option<Vec<Batch>> {
        if let Some(batches) = lock(&self.current).clone() {
            return Some(batches);
        }
        match self.cache.load_catalog() {
            Ok(Some(cached)) => {
                if let Some(ts) = cached.timestamp {
                    debug!(cached_at = %ts, "Catalog cache timestamp");
                }
                info!(count = cached.batches.len(), "Loaded batches from cache");
                *lock(&self.current) = Some(cached.batches.clone());
                Some(cached.batches)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load cached batches");
                None
            }
        }
    }

    /// Cache-first load. See the module docs.
    pub async fn load(&self) -> Result<Vec<Batch>, TimetableError> {
        if let Some(batches) = self.cached() {
            self.spawn_refresh();
            return Ok(batches);
        }

        match self.refresh().await {
            Ok(batches) => Ok(batches),
            Err(e) => {
                warn!(error = %e, "Failed to fetch batches and no cache is available");
                Err(TimetableError::NoBatchesAvailable)
            }
        }
    }

    /// Fetch and parse the batch picker without touching any state
    pub async fn fetch(&self) -> Result<Vec<Batch>, TimetableError> {
        let html = self.client.get(&self.base_url).await?;
        parse_batch_options(&html, &self.control_id)
    }

    /// Fetch from the server, then overwrite the persisted and in-memory catalog
    pub async fn refresh(&self) -> Result<Vec<Batch>, TimetableError> {
        let batches = self.fetch().await?;
        info!(count = batches.len(), "Loaded batches from server");
        if let Err(e) = self.cache.save_catalog(&batches) {
            warn!(error = %e, "Failed to cache batches");
        }
        *lock(&self.current) = Some(batches.clone());
        Ok(batches)
    }

    fn spawn_refresh(&self) {
        let mut task = lock(&self.refresh_task);
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("Batch refresh already in flight");
                return;
            }
        }

        let this = self.clone();
        *task = Some(tokio::spawn(async move {
            if let Err(e) = this.refresh().await {
                warn!(error = %e, "Background batch refresh failed");
            }
        }));
    }

    /// Wait for an in-flight background refresh, if any
    pub async fn wait_for_refresh(&self) {
        let handle = lock(&self.refresh_task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background batch refresh task failed");
            }
        }
    }
}
