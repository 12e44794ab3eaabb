// Publication date parsing with fallbacks.
//
// Scraped dates come in whatever shape the source page used: ISO timestamps
// from `<time datetime>`, "May 1, 2023" from bylines, US numeric dates from
// spreadsheets, or a date buried inside "Published on ... at 9:00 am".

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const NUMERIC_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

/// `%B` also accepts the three-letter abbreviation when parsing.
const MONTH_NAME_FORMATS: &[&str] = &["%B %d, %Y", "%B %d %Y", "%d %B %Y", "%d %B, %Y"];

/// Parse a story's free-form date string into a calendar date.
///
/// Returns `None` for blank or unrecognizable input.
pub fn parse_story_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_exact(trimmed).or_else(|| parse_embedded(trimmed))
}

fn parse_exact(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in NUMERIC_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    let cleaned = s.replace('.', "").replace("Sept ", "Sep ");
    MONTH_NAME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

fn embedded_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}",
            r"\b\d{4}-\d{1,2}-\d{1,2}\b",
            r"\b\d{1,2}/\d{1,2}/\d{4}\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn parse_embedded(s: &str) -> Option<NaiveDate> {
    embedded_patterns()
        .iter()
        .filter_map(|re| re.find(s))
        .find_map(|m| parse_exact(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn iso_dates_and_timestamps() {
        assert_eq!(parse_story_date("2023-05-01"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("2023-05-01T12:30:00-04:00"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("2023-05-01T12:30:00"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("2023-05-01T12:30:00.250"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date(" 2023-05-01 08:00:00 "), ymd(2023, 5, 1));
    }

    #[test]
    fn us_numeric_dates() {
        assert_eq!(parse_story_date("05/01/2023"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("5/1/2023"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("12-25-2022"), ymd(2022, 12, 25));
    }

    #[test]
    fn month_name_dates() {
        assert_eq!(parse_story_date("May 1, 2023"), ymd(2023, 5, 1));
        assert_eq!(parse_story_date("September 12, 2022"), ymd(2022, 9, 12));
        assert_eq!(parse_story_date("Jan. 5, 2024"), ymd(2024, 1, 5));
        assert_eq!(parse_story_date("1 May 2023"), ymd(2023, 5, 1));
    }

    #[test]
    fn embedded_dates_are_found() {
        assert_eq!(
            parse_story_date("Published on May 1, 2023 at 9:00 am"),
            ymd(2023, 5, 1)
        );
        assert_eq!(parse_story_date("Updated 2023-05-01 10:00"), ymd(2023, 5, 1));
    }

    #[test]
    fn unparseable_input_is_none() {
        assert_eq!(parse_story_date(""), None);
        assert_eq!(parse_story_date("   "), None);
        assert_eq!(parse_story_date("yesterday"), None);
        assert_eq!(parse_story_date("2023-13-45"), None);
    }
}
