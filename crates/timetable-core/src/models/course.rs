use serde::{Deserialize, Serialize};

/// What a `Course` record stands for.
/// Anything other than `Class` is a sentinel and is always the only
/// element of its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CourseKind {
    #[default]
    Class,
    /// The day has no scheduled classes
    Empty,
    /// No batch is selected
    NoBatch,
    /// The timetable could not be fetched
    Error,
}

impl CourseKind {
    pub fn is_class(&self) -> bool {
        matches!(self, CourseKind::Class)
    }

    /// Heading shown in place of the course list
    pub fn title(&self) -> &'static str {
        match self {
            CourseKind::Class => "",
            CourseKind::Empty => "No Classes Found",
            CourseKind::NoBatch => "No Batch Selected",
            CourseKind::Error => "Connection Error",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CourseKind::Class => "",
            CourseKind::Empty => "There are no classes scheduled for this day.",
            CourseKind::NoBatch => "Please select one or more batches to view the timetable.",
            CourseKind::Error => {
                "Failed to load timetable. Please check your connection and try again."
            }
        }
    }
}

/// Stored as `{description, room, startTime, endTime}` plus one of the
/// `isEmpty` / `isNoBatch` / `isError` flags for sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CourseRecord", into = "CourseRecord")]
pub struct Course {
    pub description: String,
    pub room: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: CourseKind,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseRecord {
    description: String,
    room: String,
    start_time: String,
    end_time: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_empty: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    is_no_batch: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    is_error: bool,
}

impl From<CourseRecord> for Course {
    fn from(record: CourseRecord) -> Self {
        let kind = if record.is_error {
            CourseKind::Error
        } else if record.is_no_batch {
            CourseKind::NoBatch
        } else if record.is_empty {
            CourseKind::Empty
        } else {
            CourseKind::Class
        };
        Self {
            description: record.description,
            room: record.room,
            start_time: record.start_time,
            end_time: record.end_time,
            kind,
        }
    }
}

impl From<Course> for CourseRecord {
    fn from(course: Course) -> Self {
        Self {
            is_empty: course.kind == CourseKind::Empty,
            is_no_batch: course.kind == CourseKind::NoBatch,
            is_error: course.kind == CourseKind::Error,
            description: course.description,
            room: course.room,
            start_time: course.start_time,
            end_time: course.end_time,
        }
    }
}

impl Course {
    pub fn class(description: &str, room: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            description: description.to_string(),
            room: room.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            kind: CourseKind::Class,
        }
    }

    fn sentinel(description: &str, kind: CourseKind) -> Self {
        Self {
            description: description.to_string(),
            room: "-".to_string(),
            start_time: "-".to_string(),
            end_time: "-".to_string(),
            kind,
        }
    }

    pub fn no_classes() -> Self {
        Self::sentinel("No Classes Scheduled", CourseKind::Empty)
    }

    pub fn no_batch() -> Self {
        Self::sentinel("Please select a batch", CourseKind::NoBatch)
    }

    pub fn load_failed() -> Self {
        Self::sentinel("Failed to load - tap to retry", CourseKind::Error)
    }

    pub fn is_sentinel(&self) -> bool {
        !self.kind.is_class()
    }
}

/// The sentinel kind of a course list, if it is a single sentinel record
pub fn sentinel_kind(courses: &[Course]) -> Option<CourseKind> {
    match courses {
        [only] if only.is_sentinel() => Some(only.kind),
        _ => None,
    }
}
