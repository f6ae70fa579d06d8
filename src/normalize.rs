use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{Cell, CoercedDate};

const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Trims the name and turns full-width spaces into ASCII spaces.
/// This is the form used for dictionary lookup, scoring, and passthrough output.
pub fn normalize_whitespace(input: &str) -> String {
    input.replace(IDEOGRAPHIC_SPACE, " ").trim().to_string()
}

/// NFKC-folds full-width Latin letters and digits to their ASCII forms.
/// Only used to build fuzzy comparison keys; never changes returned names.
pub fn fold_width(input: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    input.nfkc().collect::<String>()
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];
// `%.f` also matches a missing fractional part
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// `YYYYMMDD` with exactly eight digits.
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = normalize_whitespace(raw);
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt.date());
        }
    }
    // timestamps carrying `Z` or an offset keep their local calendar date
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.date_naive());
    }
    parse_compact_date(&s)
}

/// Coerces a date cell. Failures become `Unparseable`, never an error.
pub fn coerce_date(cell: Option<&Cell>) -> CoercedDate {
    match cell {
        None => CoercedDate::Missing,
        Some(c) if c.is_empty() => CoercedDate::Missing,
        Some(Cell::Date(d)) => CoercedDate::Date(*d),
        Some(Cell::Text(s)) => parse_date_str(s)
            .map(CoercedDate::Date)
            .unwrap_or(CoercedDate::Unparseable),
        Some(_) => CoercedDate::Unparseable,
    }
}
