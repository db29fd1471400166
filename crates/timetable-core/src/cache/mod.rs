//! Local caching module for offline timetable access.
//!
//! This module provides the `KeyValueStore` persistence seam (file-backed
//! or in-memory) and the `TimetableCache` that stores typed snapshots on
//! top of it:
//! - the batch catalog and when it was fetched
//! - the user's selected batches
//! - one course list per (date, selected batches)
//!
//! Entries never expire; freshness comes from background refresh.

pub mod manager;
pub mod store;

pub use manager::{CacheEntry, CacheKey, CachedCatalog, TimetableCache};
pub use store::{FileStore, KeyValueStore, MemoryStore};
