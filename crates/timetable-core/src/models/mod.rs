//! Data models for the timetable.
//!
//! - `Batch`, `Selection`: cohorts and the user's chosen set of them
//! - `Course`, `CourseKind`: scheduled classes and the sentinel records
//!   that stand in for "no batch", "no classes" and "fetch failed"

pub mod batch;
pub mod course;

pub use batch::{filter_batches, Batch, Selection};
pub use course::{sentinel_kind, Course, CourseKind};
