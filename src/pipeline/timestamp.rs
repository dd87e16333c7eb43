use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::table::Cell;

const OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OUTPUT_TIME_FORMAT: &str = "%H:%M:%S";

// Two-digit years go first: chrono's %Y happily reads "24" as year 24.
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

const TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%I:%M:%S%p",
    "%I:%M%p",
];

static DATETIME_FORMATS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut formats = Vec::new();
    for date in DATE_FORMATS {
        for sep in [" ", "T"] {
            for time in TIME_FORMATS {
                formats.push(format!("{date}{sep}{time}"));
            }
        }
    }
    formats
});

/// What to emit when a value looks like it should be a timestamp but does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFallback {
    /// Keep the original (trimmed) text so no information is lost
    #[default]
    Verbatim,
    Empty,
}

impl TimestampFallback {
    fn apply(self, original: &str) -> String {
        match self {
            TimestampFallback::Verbatim => original.trim().to_string(),
            TimestampFallback::Empty => String::new(),
        }
    }
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(OUTPUT_DATETIME_FORMAT).to_string()
}

pub fn format_time(t: &NaiveTime) -> String {
    t.format(OUTPUT_TIME_FORMAT).to_string()
}

/// Parse a pure time-of-day text such as `14:05`, `2:05:09 PM`.
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Parse a date or date+time text into a full timestamp. Dates without a
/// time component resolve to midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Normalize a single date-like cell from the append flow.
///
/// Never fails: empty input gives `""`, a time of day gives `HH:MM:SS`, a date
/// or date+time gives `YYYY-MM-DD HH:MM:SS`, anything else goes through `fallback`.
pub fn normalize_cell(cell: &Cell, fallback: TimestampFallback) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Time(t) => format_time(t),
        Cell::DateTime(dt) => format_datetime(dt),
        Cell::Text(s) => normalize_text(s, fallback),
        Cell::Float(f) if f.is_nan() => String::new(),
        other => fallback.apply(&other.to_text()),
    }
}

pub fn normalize_text(raw: &str, fallback: TimestampFallback) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }
    if let Some(t) = parse_time_of_day(text) {
        return format_time(&t);
    }
    match parse_timestamp(text) {
        Some(dt) => format_datetime(&dt),
        None => fallback.apply(text),
    }
}

/// Drop alphabetic characters from a date text, then the whitespace and the
/// comma a weekday prefix leaves around it ("Tue, 01/02/2024" -> "01/02/2024").
pub fn clean_date(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_alphabetic())
        .collect::<String>()
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_string()
}

/// Build the call-log timestamp from its separate date and time cells.
///
/// The cleaned date and the time are joined with a space and parsed as a full
/// timestamp. Both empty gives `""`; an unparsable combination goes through
/// `fallback` with the joined text.
pub fn combine_date_time(date: &Cell, time: &Cell, fallback: TimestampFallback) -> String {
    let date_text = match date {
        Cell::DateTime(dt) => dt.date().format("%Y-%m-%d").to_string(),
        other => clean_date(&other.to_text()),
    };
    let time_text = match time {
        Cell::Time(t) => format_time(t),
        Cell::DateTime(dt) => format_time(&dt.time()),
        other => other.to_text().trim().to_string(),
    };

    let combined = [date_text.as_str(), time_text.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    if combined.is_empty() {
        return String::new();
    }

    match parse_timestamp(&combined) {
        Some(dt) => format_datetime(&dt),
        None => fallback.apply(&combined),
    }
}
