//! Core library for the SICSR timetable.
//!
//! The timetable server publishes a batch picker page and a CSV report but
//! no CORS headers, so everything is fetched through rotating public relays
//! and cached locally for offline use.
//!
//! - `api`: relay-rotating HTTP client and error types
//! - `parse`: CSV report rows and the batch picker HTML
//! - `catalog`: cache-first batch catalog
//! - `report`: report URLs, course and calendar fetches
//! - `cache`: key-value persistence and typed snapshots
//! - `coordinator`: active date, selection, course list and sync status

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod models;
pub mod parse;
pub mod report;
pub mod utils;

pub use api::{FetchError, ProxyClient, TimetableError};
pub use catalog::BatchCatalog;
pub use config::Config;
pub use coordinator::{CatalogState, SyncStatus, TimetableCoordinator};
pub use models::{Batch, Course, CourseKind, Selection};
