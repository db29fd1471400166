//! Report queries against the timetable server.
//!
//! One endpoint serves both formats: `output_format=1` returns CSV rows,
//! `output_format=2` an iCalendar export of the same range.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::debug;

use crate::api::{ProxyClient, TimetableError};
use crate::config::Config;
use crate::models::{Course, Selection};
use crate::parse::parse_report;

const OUTPUT_CSV: u8 = 1;
const OUTPUT_ICAL: u8 = 2;

/// Fixed report-mode flags the server expects alongside `output_format`
const REPORT_FLAGS: &str = "match_confirmed=1&output=0";
const REPORT_SORTING: &str = "sortby=s&sumby=t&phase=2&datatable=1";

/// Repeated once per selected batch
const BATCH_PARAM: &str = "typematch[]";

const ICAL_MARKER: &str = "BEGIN:VCALENDAR";

/// Builds report URLs and fetches them through the relay client.
/// Clone is cheap.
#[derive(Clone)]
pub struct ReportClient {
    client: ProxyClient,
    base_url: Arc<str>,
}

impl ReportClient {
    pub fn new(client: ProxyClient, config: &Config) -> Self {
        Self {
            client,
            base_url: Arc::from(config.base_url.as_str()),
        }
    }

    fn report_url(&self, from: NaiveDate, to: NaiveDate, selection: &Selection, format: u8) -> String {
        let mut url = format!(
            "{}?from_day={}&from_month={}&from_year={}&to_day={}&to_month={}&to_year={}&{}&output_format={}&{}",
            self.base_url,
            from.day(),
            from.month(),
            from.year(),
            to.day(),
            to.month(),
            to.year(),
            REPORT_FLAGS,
            format,
            REPORT_SORTING,
        );
        for code in selection.codes() {
            url.push_str(&format!("&{}={}", BATCH_PARAM, utf8_percent_encode(code, NON_ALPHANUMERIC)));
        }
        url
    }

    /// CSV report for a single day
    pub fn courses_url(&self, date: NaiveDate, selection: &Selection) -> String {
        self.report_url(date, date, selection, OUTPUT_CSV)
    }

    /// iCalendar export for an inclusive date range
    pub fn calendar_url(&self, from: NaiveDate, to: NaiveDate, selection: &Selection) -> String {
        self.report_url(from, to, selection, OUTPUT_ICAL)
    }

    /// Courses for `date`. An empty selection yields the "no batch" sentinel
    /// without any request.
    pub async fn fetch_courses(
        &self,
        date: NaiveDate,
        selection: &Selection,
    ) -> Result<Vec<Course>, TimetableError> {
        if selection.is_empty() {
            return Ok(vec![Course::no_batch()]);
        }
        let body = self.client.get(&self.courses_url(date, selection)).await?;
        let courses = parse_report(&body)?;
        debug!(%date, count = courses.len(), "Parsed report");
        Ok(courses)
    }

    /// Raw iCalendar text for `from..=to`
    pub async fn fetch_calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        selection: &Selection,
    ) -> Result<String, TimetableError> {
        if selection.is_empty() {
            return Err(TimetableError::NoSelection);
        }
        let body = self.client.get(&self.calendar_url(from, to, selection)).await?;
        if !body.contains(ICAL_MARKER) {
            return Err(TimetableError::Parse("response is not an iCalendar document".to_string()));
        }
        Ok(body)
    }
}
