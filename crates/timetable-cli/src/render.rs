//! Plain-text rendering of timetable state.

use std::fmt::Write;

use timetable_core::models::{sentinel_kind, Batch, Course, Selection};
use timetable_core::utils::format_date_long;
use timetable_core::{CatalogState, SyncStatus, TimetableCoordinator};

/// Width of the time column ("10:00 AM - 11:00 AM")
const TIME_COLUMN_WIDTH: usize = 19;

pub fn courses(courses: &[Course]) -> String {
    if let Some(kind) = sentinel_kind(courses) {
        return format!("  {}\n  {}\n", kind.title(), kind.message());
    }

    let mut out = String::new();
    for course in courses {
        let time = format!("{} - {}", course.start_time, course.end_time);
        let _ = writeln!(
            out,
            "  {:<width$}  {}\n  {:<width$}  Room: {}",
            time,
            course.description,
            "",
            course.room,
            width = TIME_COLUMN_WIDTH
        );
    }
    out
}

pub fn status_line(status: SyncStatus, last_synced: Option<&str>) -> String {
    match last_synced {
        Some(age) => format!("{} {} (data from {})", status.icon(), status.label(), age),
        None => format!("{} {}", status.icon(), status.label()),
    }
}

pub fn day(coordinator: &TimetableCoordinator) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format_date_long(coordinator.date()));
    let _ = writeln!(out, "{}", selection_summary(coordinator.selection()));
    out.push('\n');
    out.push_str(&courses(coordinator.courses()));
    out.push('\n');
    out.push_str(&status_line(coordinator.status(), coordinator.last_synced().as_deref()));
    out.push('\n');
    out
}

pub fn selection_summary(selection: &Selection) -> String {
    if selection.is_empty() {
        "Batches: (none selected)".to_string()
    } else {
        format!("Batches: {}", selection.sorted_names().join(", "))
    }
}

pub fn batch_list(batches: &[Batch], selection: &Selection) -> String {
    let mut out = String::new();
    for batch in batches {
        let mark = if selection.contains(&batch.name) { "[x]" } else { "[ ]" };
        let _ = writeln!(out, "{} {}", mark, batch.name);
    }
    out
}

/// Full-page prompt shown when no batch catalog can be loaded
pub fn catalog_unavailable(state: &CatalogState) -> Option<String> {
    match state {
        CatalogState::Unavailable(message) => Some(format!(
            "Connection Error\n{}\nRun the command again to retry.",
            message
        )),
        _ => None,
    }
}
