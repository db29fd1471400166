//! Timetable state and course retrieval.
//!
//! `TimetableCoordinator` owns the active date, the batch selection and the
//! course list on display. Course loads go through the cache first:
//!
//! - empty selection: "no batch" sentinel, no request
//! - cache hit: the cached list is shown at once and a refresh is spawned
//! - cache miss: the fetch is awaited
//!
//! Background refreshes report back over an mpsc channel, tagged with the
//! key they were started for. A result is persisted under its own key and
//! only reaches the display if that key is still the active one.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ProxyClient, TimetableError};
use crate::cache::{CacheKey, FileStore, KeyValueStore, TimetableCache};
use crate::catalog::BatchCatalog;
use crate::config::Config;
use crate::models::{filter_batches, sentinel_kind, Batch, Course, CourseKind, Selection};
use crate::report::ReportClient;
use crate::utils::age_display;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// Only one course refresh is tracked at a time; superseded tasks may
/// still deliver, so leave headroom.
const CHANNEL_BUFFER_SIZE: usize = 16;

// ============================================================================
// State Types
// ============================================================================

/// Sync indicator shown next to the course list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// A fetch or refresh is in flight
    Syncing,
    /// Fresh or validly cached data is shown
    UpToDate,
    /// The relays could not be reached
    Network,
    /// The server answered with something unusable
    Error,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Syncing => "Updating...",
            SyncStatus::UpToDate => "Up to Date",
            SyncStatus::Network => "Network Issue",
            SyncStatus::Error => "Backend Error",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SyncStatus::Syncing => "~",
            SyncStatus::UpToDate => "✓",
            SyncStatus::Network => "⚠",
            SyncStatus::Error => "✕",
        }
    }

    fn from_error(e: &TimetableError) -> Self {
        if e.is_transport() {
            SyncStatus::Network
        } else {
            SyncStatus::Error
        }
    }
}

/// Whether the batch catalog could be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogState {
    Loading,
    Ready,
    /// No cache and no server; the view offers a retry
    Unavailable(String),
}

/// Messages from background tasks
#[derive(Debug)]
pub enum RefreshResult {
    Courses {
        key: CacheKey,
        outcome: Result<Vec<Course>, TimetableError>,
    },
}

pub struct TimetableCoordinator {
    catalog: BatchCatalog,
    cache: TimetableCache,
    reports: ReportClient,

    catalog_state: CatalogState,
    selection: Selection,
    date: NaiveDate,
    courses: Vec<Course>,
    status: SyncStatus,
    /// When the displayed courses were fetched
    shown_at: Option<DateTime<Utc>>,

    // Background task channel
    refresh_tx: mpsc::Sender<RefreshResult>,
    refresh_rx: mpsc::Receiver<RefreshResult>,
    in_flight: Option<(CacheKey, JoinHandle<()>)>,
}

impl TimetableCoordinator {
    pub fn new(
        config: &Config,
        client: ProxyClient,
        store: Arc<dyn KeyValueStore>,
        today: NaiveDate,
    ) -> Self {
        let cache = TimetableCache::new(store);
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            catalog: BatchCatalog::new(client.clone(), cache.clone(), config),
            reports: ReportClient::new(client, config),
            cache,

            catalog_state: CatalogState::Loading,
            selection: Selection::new(),
            date: today,
            courses: Vec::new(),
            status: SyncStatus::Syncing,
            shown_at: None,

            refresh_tx: tx,
            refresh_rx: rx,
            in_flight: None,
        }
    }

    /// Production wiring: reqwest relays and a file cache
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ProxyClient::from_config(config)?;
        let cache_dir = config.cache_dir()?;
        debug!(?cache_dir, "Cache directory configured");
        let store = Arc::new(FileStore::new(cache_dir)?);
        Ok(Self::new(config, client, store, Local::now().date_naive()))
    }

    /// Load the catalog, restore the saved selection, and load courses for
    /// the active date.
    pub async fn start(&mut self) {
        self.load_catalog().await;
        if self.catalog_state == CatalogState::Ready {
            self.load_courses().await;
        }
    }

    /// Load the batch catalog and restore the saved selection against it
    pub async fn load_catalog(&mut self) {
        self.catalog_state = CatalogState::Loading;
        let batches = match self.catalog.load().await {
            Ok(batches) => batches,
            Err(e) => {
                error!(error = %e, "Batch catalog unavailable");
                self.catalog_state = CatalogState::Unavailable(e.to_string());
                self.status = SyncStatus::from_error(&e);
                return;
            }
        };
        self.catalog_state = CatalogState::Ready;

        self.selection = match self.cache.load_selection(&batches) {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "Failed to load saved selection");
                Selection::new()
            }
        };
        info!(batches = batches.len(), selected = self.selection.len(), "Timetable ready");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn catalog_state(&self) -> &CatalogState {
        &self.catalog_state
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.catalog.current()
    }

    /// Batches whose name contains `query`, case-insensitively
    pub fn filter_batches(&self, query: &str) -> Vec<Batch> {
        let batches = self.catalog.current();
        filter_batches(&batches, query).into_iter().cloned().collect()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Age of the displayed data, e.g. "5m ago"
    pub fn last_synced(&self) -> Option<String> {
        self.shown_at.map(|ts| age_display(ts, Utc::now()))
    }

    pub fn active_key(&self) -> CacheKey {
        CacheKey::new(self.date, &self.selection)
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    // =========================================================================
    // User actions
    // =========================================================================

    /// Build a selection from catalog names. Unknown names are returned
    /// separately.
    pub fn selection_from_names(&self, names: &[String]) -> (Selection, Vec<String>) {
        let catalog = self.catalog.current();
        let mut selection = Selection::new();
        let mut unknown = Vec::new();
        for name in names {
            match catalog.iter().find(|b| &b.name == name) {
                Some(batch) => {
                    selection.insert(batch.clone());
                }
                None => unknown.push(name.clone()),
            }
        }
        (selection, unknown)
    }

    /// Persist a new selection and reload courses for it
    pub async fn save_selection(&mut self, selection: Selection) {
        if let Err(e) = self.cache.save_selection(&selection) {
            warn!(error = %e, "Failed to save selection");
        }
        self.selection = selection;
        self.load_courses().await;
    }

    /// Move the active date by `days` and reload. A move past the
    /// representable calendar leaves the date and courses untouched.
    pub async fn offset_day(&mut self, days: i64) {
        let Some(target) = Duration::try_days(days).and_then(|d| self.date.checked_add_signed(d))
        else {
            warn!(date = %self.date, days, "Date offset out of range, staying on current date");
            return;
        };
        self.date = target;
        self.load_courses().await;
    }

    /// Set the active date without loading, e.g. before `start`
    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    pub async fn go_to_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.load_courses().await;
    }

    /// iCalendar export of the current selection over `from..=to`
    pub async fn export_calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<String, TimetableError> {
        self.reports.fetch_calendar(from, to, &self.selection).await
    }

    // =========================================================================
    // Course loading
    // =========================================================================

    /// Load courses for the active key. See the module docs.
    pub async fn load_courses(&mut self) {
        let catalog = self.catalog.current();
        self.selection.resolve_against(&catalog);
        let key = self.active_key();
        self.supersede(&key);

        if self.selection.is_empty() {
            self.courses = vec![Course::no_batch()];
            self.status = SyncStatus::UpToDate;
            self.shown_at = None;
            return;
        }

        match self.cache.load_courses(&key) {
            Ok(Some(entry)) => {
                debug!(key = %key.storage_key(), count = entry.courses.len(), "Serving cached courses");
                self.courses = entry.courses;
                self.shown_at = Some(entry.timestamp);
                self.status = SyncStatus::Syncing;
                self.spawn_refresh(key);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read cached courses"),
        }

        self.status = SyncStatus::Syncing;
        let outcome = self.reports.fetch_courses(self.date, &self.selection).await;
        match outcome {
            Ok(courses) => self.accept_courses(&key, courses),
            Err(e) => {
                warn!(key = %key.storage_key(), error = %e, "Failed to load courses");
                self.courses = vec![Course::load_failed()];
                self.shown_at = None;
                self.status = SyncStatus::from_error(&e);
            }
        }
    }

    /// Persist a successful fetch under `key` and, if it is still active,
    /// display it. Error and no-batch sentinels are never cached.
    fn accept_courses(&mut self, key: &CacheKey, courses: Vec<Course>) {
        let cacheable = !matches!(
            sentinel_kind(&courses),
            Some(CourseKind::Error) | Some(CourseKind::NoBatch)
        );
        if cacheable {
            if let Err(e) = self.cache.save_courses(key, &courses) {
                warn!(error = %e, "Failed to cache courses");
            }
        }

        if *key == self.active_key() {
            self.courses = courses;
            self.shown_at = Some(Utc::now());
            self.status = SyncStatus::UpToDate;
        } else {
            debug!(key = %key.storage_key(), "Refresh finished for inactive key, not displayed");
        }
    }

    /// Abort a tracked refresh that belongs to a different key
    fn supersede(&mut self, key: &CacheKey) {
        if let Some((running, handle)) = self.in_flight.take() {
            if running == *key {
                self.in_flight = Some((running, handle));
            } else {
                debug!(key = %running.storage_key(), "Superseding course refresh");
                handle.abort();
            }
        }
    }

    fn spawn_refresh(&mut self, key: CacheKey) {
        if let Some((running, handle)) = self.in_flight.as_ref() {
            if *running == key && !handle.is_finished() {
                return;
            }
        }

        let tx = self.refresh_tx.clone();
        let reports = self.reports.clone();
        let selection = self.selection.clone();
        let date = self.date;
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let outcome = reports.fetch_courses(date, &selection).await;
            Self::send_result(&tx, RefreshResult::Courses { key: task_key, outcome }).await;
        });
        self.in_flight = Some((key, handle));
    }

    /// Helper to send refresh results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<RefreshResult>, result: RefreshResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send refresh result - channel closed");
        }
    }

    /// Apply every result that has already arrived
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.refresh_rx.try_recv() {
            results.push(result);
        }
        for result in results {
            self.process_refresh_result(result);
        }
    }

    /// Wait for the tracked course refresh and the catalog refresh, then
    /// apply whatever they produced.
    pub async fn wait_for_refresh(&mut self) {
        if let Some((key, handle)) = self.in_flight.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(key = %key.storage_key(), error = %e, "Course refresh task failed");
                }
            }
        }
        self.catalog.wait_for_refresh().await;
        self.check_background_tasks();
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Courses { key, outcome } => {
                if let Some((running, handle)) = self.in_flight.as_ref() {
                    if *running == key && handle.is_finished() {
                        self.in_flight = None;
                    }
                }
                match outcome {
                    Ok(courses) => self.accept_courses(&key, courses),
                    Err(e) => {
                        // Stale-but-valid data stays on screen
                        warn!(key = %key.storage_key(), error = %e, "Background refresh failed");
                        if key == self.active_key() {
                            self.status = SyncStatus::from_error(&e);
                        }
                    }
                }
            }
        }
    }
}
