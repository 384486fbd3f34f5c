//! Publish-date normalization.
//!
//! Article pages print their publish time in a handful of human formats
//! (`2024-03-05 14:30:00`, `2024年03月05日 14:30`, `3月5日`, ...). This module
//! reduces all of them to a calendar date.
//!
//! Patterns are tried in a fixed order and the first full match wins. Longer
//! patterns come first: a bare date pattern must never get a chance at a
//! string that also carries a time of day.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::DateFormatError;

/// One accepted date layout.
#[derive(Debug, Clone, Copy)]
struct DatePattern {
    format: &'static str,
    has_year: bool,
    has_time: bool,
}

const PATTERNS: &[DatePattern] = &[
    DatePattern {
        format: "%Y-%m-%d %H:%M:%S",
        has_year: true,
        has_time: true,
    },
    DatePattern {
        format: "%Y-%m-%d %H:%M",
        has_year: true,
        has_time: true,
    },
    DatePattern {
        format: "%Y年%m月%d日 %H:%M",
        has_year: true,
        has_time: true,
    },
    DatePattern {
        format: "%Y年%m月%d日",
        has_year: true,
        has_time: false,
    },
    DatePattern {
        format: "%Y-%m-%d",
        has_year: true,
        has_time: false,
    },
    DatePattern {
        format: "%m月%d日 %H:%M",
        has_year: false,
        has_time: true,
    },
    DatePattern {
        format: "%m月%d日",
        has_year: false,
        has_time: false,
    },
];

impl DatePattern {
    /// Parse `input` with this layout, stamping `year` on year-less layouts.
    fn parse(&self, input: &str, year: i32) -> Option<NaiveDate> {
        if self.has_year {
            return parse_with(input, self.format, self.has_time);
        }
        // chrono cannot build a date without a year, so the processing year is
        // parsed along with the month and day. Feb 29 then resolves against
        // the real year instead of a placeholder one.
        let stamped = format!("{year} {input}");
        let format = format!("%Y {}", self.format);
        parse_with(&stamped, &format, self.has_time)
    }
}

fn parse_with(input: &str, format: &str, has_time: bool) -> Option<NaiveDate> {
    if has_time {
        NaiveDateTime::parse_from_str(input, format)
            .ok()
            .map(|dt| dt.date())
    } else {
        NaiveDate::parse_from_str(input, format).ok()
    }
}

/// Whether the string carries any year marker at all.
fn has_year_indicator(s: &str) -> bool {
    s.contains('年') || s.contains('-')
}

/// Normalize a raw publish-date string to a calendar date.
///
/// `year` is the processing year: it is injected into strings that carry no
/// year of their own, and it overrides whatever a year-less pattern produced.
///
/// # Errors
///
/// [`DateFormatError`] when no pattern matches.
///
/// # Examples
///
/// ```ignore
/// let d = normalize("3月5日", 2024).unwrap();
/// assert_eq!(canonical(d), "2024-03-05");
/// ```
pub fn normalize(raw: &str, year: i32) -> Result<NaiveDate, DateFormatError> {
    let trimmed = raw.trim();
    let input = if has_year_indicator(trimmed) {
        trimmed.to_string()
    } else {
        format!("{year}年{trimmed}")
    };

    for pattern in PATTERNS {
        if let Some(date) = pattern.parse(&input, year) {
            debug!(raw, format = pattern.format, %date, "Normalized date");
            return Ok(date);
        }
    }
    Err(DateFormatError(raw.to_string()))
}

/// Canonical `YYYY-MM-DD` rendering.
pub fn canonical(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a strictly canonical `YYYY-MM-DD` string (CLI input).
pub fn parse_canonical(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
