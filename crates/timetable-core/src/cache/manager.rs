use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::store::KeyValueStore;
use crate::models::{Batch, Course, Selection};

const CACHED_BATCHES: &str = "cachedBatches";
const CACHED_BATCHES_TIMESTAMP: &str = "cachedBatchesTimestamp";
const SELECTED_BATCHES: &str = "selectedBatches";

/// Identifies one cached course list: a date plus the sorted set of
/// selected batch names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    date: NaiveDate,
    names: Vec<String>,
}

impl CacheKey {
    pub fn new(date: NaiveDate, selection: &Selection) -> Self {
        Self {
            date,
            names: selection.sorted_names().into_iter().map(str::to_string).collect(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `timetable_{year}_{monthIndex}_{day}_{names joined by _}`, month zero-based
    pub fn storage_key(&self) -> String {
        format!(
            "timetable_{}_{}_{}_{}",
            self.date.year(),
            self.date.month0(),
            self.date.day(),
            self.names.join("_")
        )
    }
}

/// Stored as `{timestamp: <epoch millis>, courses: [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub courses: Vec<Course>,
}

impl CacheEntry {
    pub fn new(courses: Vec<Course>) -> Self {
        Self {
            timestamp: Utc::now(),
            courses,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedCatalog {
    pub batches: Vec<Batch>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Persisted selection. Older builds stored bare names.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSelection {
    Batches(Vec<Batch>),
    Names(Vec<String>),
}

/// Typed snapshots over a `KeyValueStore`.
/// Clone is cheap - the store is shared.
#[derive(Clone)]
pub struct TimetableCache {
    store: Arc<dyn KeyValueStore>,
}

impl TimetableCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse cache entry: {}", key))?;
        Ok(Some(value))
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(key, &bytes)
    }

    // ===== Courses =====

    pub fn load_courses(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.load(&key.storage_key())
    }

    pub fn save_courses(&self, key: &CacheKey, courses: &[Course]) -> Result<()> {
        debug!(key = %key.storage_key(), count = courses.len(), "Caching courses");
        self.save(&key.storage_key(), &CacheEntry::new(courses.to_vec()))
    }

    // ===== Batch catalog =====

    /// The cached catalog, or `None` if absent or empty
    pub fn load_catalog(&self) -> Result<Option<CachedCatalog>> {
        let Some(batches) = self.load::<Vec<Batch>>(CACHED_BATCHES)? else {
            return Ok(None);
        };
        if batches.is_empty() {
            return Ok(None);
        }
        let timestamp = self
            .store
            .get(CACHED_BATCHES_TIMESTAMP)?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|millis| millis.trim().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());
        Ok(Some(CachedCatalog { batches, timestamp }))
    }

    /// Overwrite the cached catalog
    pub fn save_catalog(&self, batches: &[Batch]) -> Result<()> {
        self.save(CACHED_BATCHES, batches)?;
        self.store.set(
            CACHED_BATCHES_TIMESTAMP,
            Utc::now().timestamp_millis().to_string().as_bytes(),
        )
    }

    // ===== Selection =====

    /// Restore the saved selection, resolved against `catalog`.
    /// Accepts both the current `[{name, value}]` form and legacy `["name"]`.
    pub fn load_selection(&self, catalog: &[Batch]) -> Result<Selection> {
        let Some(stored) = self.load::<StoredSelection>(SELECTED_BATCHES)? else {
            return Ok(Selection::new());
        };
        let mut selection: Selection = match stored {
            StoredSelection::Batches(batches) => batches.into_iter().collect(),
            StoredSelection::Names(names) => names
                .iter()
                .filter_map(|name| catalog.iter().find(|b| &b.name == name).cloned())
                .collect(),
        };
        selection.resolve_against(catalog);
        Ok(selection)
    }

    pub fn save_selection(&self, selection: &Selection) -> Result<()> {
        self.save(SELECTED_BATCHES, selection.batches())
    }
}
