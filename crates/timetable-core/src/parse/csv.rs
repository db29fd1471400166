//! Course rows from the CSV report.
//!
//! Rows are loosely quoted: a `"` toggles quoted mode, commas inside quotes
//! are literal, and the quotes themselves are dropped. There is no escaped
//! quote handling. Columns used:
//!
//! | index | meaning                          |
//! |-------|----------------------------------|
//! | 2     | room                             |
//! | 3     | start, `H:MM-...`                |
//! | 4     | end, `H:MM-...`                  |
//! | 6     | description                      |

use tracing::debug;

use crate::api::TimetableError;
use crate::models::Course;

/// Rows with fewer fields are skipped
const MIN_FIELDS: usize = 7;

/// Split one row into trimmed fields
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// 24-hour `H:MM` to 12-hour `h:MM AM|PM`. Unparseable input is returned as-is.
pub fn format_time(time: &str) -> String {
    let time = time.trim();
    let mut parts = time.split(':');
    let (Some(hours), Some(minutes)) = (parts.next(), parts.next()) else {
        return time.to_string();
    };
    let Ok(hour) = hours.trim().parse::<u32>() else {
        return time.to_string();
    };

    let period = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{}:{} {}", display_hour, minutes, period)
}

fn before_dash(field: &str) -> &str {
    field.split('-').next().unwrap_or(field)
}

/// Parse one data row, or `None` if it has too few fields
pub fn parse_line(line: &str) -> Option<Course> {
    let fields = parse_csv_line(line);
    if fields.len() < MIN_FIELDS {
        return None;
    }
    Some(Course::class(
        &fields[6],
        &fields[2],
        &format_time(before_dash(&fields[3])),
        &format_time(before_dash(&fields[4])),
    ))
}

/// Parse a whole report body.
///
/// The first line is a header. Blank lines and malformed rows are skipped.
/// A body with no data rows yields the single "no classes" sentinel; a body
/// whose data rows are all malformed is a `Parse` error, since that means
/// the server sent something other than a report.
pub fn parse_report(body: &str) -> Result<Vec<Course>, TimetableError> {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() <= 1 {
        return Ok(vec![Course::no_classes()]);
    }

    let mut courses = Vec::new();
    let mut malformed = 0usize;
    for line in lines.iter().skip(1).map(|l| l.trim()).filter(|l| !l.is_empty()) {
        match parse_line(line) {
            Some(course) => courses.push(course),
            None => {
                debug!(line = %line, "Skipping malformed report row");
                malformed += 1;
            }
        }
    }

    if courses.is_empty() {
        if malformed > 0 {
            return Err(TimetableError::Parse(format!(
                "report had {} rows and none were readable",
                malformed
            )));
        }
        return Ok(vec![Course::no_classes()]);
    }
    Ok(courses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseKind;

    const HEADER: &str = "Area,Room,Room Name,Start time,End time,Duration,Description,Type";

    #[test]
    fn test_format_time() {
        assert_eq!(format_time("0:00"), "12:00 AM");
        assert_eq!(format_time("12:30"), "12:30 PM");
        assert_eq!(format_time("23:15"), "11:15 PM");
        assert_eq!(format_time("9:05"), "9:05 AM");
        assert_eq!(format_time("11:59"), "11:59 AM");
    }

    #[test]
    fn test_format_time_passes_through_garbage() {
        assert_eq!(format_time("TBA"), "TBA");
        assert_eq!(format_time("xx:10"), "xx:10");
        assert_eq!(format_time(""), "");
    }

    #[test]
    fn test_parse_csv_line_quotes() {
        let fields = parse_csv_line(r#" "Lab, Block A" ,x, "R 1" "#);
        assert_eq!(fields, vec!["Lab, Block A", "x", "R 1"]);
    }

    #[test]
    fn test_parse_line_requires_seven_fields() {
        assert!(parse_line("a,b,c,d,e,f").is_none());
        assert!(parse_line(r#""a,b,c,d,e,f,g""#).is_none());
        assert!(parse_line("a,b,c,d,e,f,g").is_some());
    }

    #[test]
    fn test_parse_line_maps_columns() {
        let course = parse_line(r#""CS101 Intro",x,R101,9:00-10:00,10:00-11:00,y,Room 101"#)
            .expect("seven fields");
        assert_eq!(course.room, "R101");
        assert_eq!(course.start_time, "9:00 AM");
        assert_eq!(course.end_time, "10:00 AM");
        assert_eq!(course.description, "Room 101");
        assert_eq!(course.kind, CourseKind::Class);
    }

    #[test]
    fn test_parse_report_skips_header_blank_and_malformed() {
        let body = format!(
            "{}\r\nIT,Lab 2,Lab 2,14:00-15:00,15:00-16:00,1h,\"Java, Practical\",L\r\n\r\nbroken,row\n",
            HEADER
        );
        let courses = parse_report(&body).expect("one good row");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].description, "Java, Practical");
        assert_eq!(courses[0].start_time, "2:00 PM");
    }

    #[test]
    fn test_parse_report_header_only_is_empty_day() {
        let courses = parse_report(HEADER).expect("header only");
        assert_eq!(courses, vec![Course::no_classes()]);

        let courses = parse_report(&format!("{}\n\n", HEADER)).expect("trailing blank lines");
        assert_eq!(courses, vec![Course::no_classes()]);
    }

    #[test]
    fn test_parse_report_all_malformed_is_error() {
        let body = format!("{}\n<html>\n<body>Service unavailable</body>", HEADER);
        assert!(matches!(parse_report(&body), Err(TimetableError::Parse(_))));
    }
}
