//! Parsers for the two documents the timetable server returns:
//! the CSV report rows and the HTML page carrying the batch picker.

pub mod batches;
pub mod csv;

pub use batches::parse_batch_options;
pub use csv::{format_time, parse_csv_line, parse_line, parse_report};
