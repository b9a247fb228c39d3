//! Field normalization: turns raw CSV strings into canonical values.
//!
//! Every function here is pure and total. Unparsable input is not an error
//! for the migration: the `try_*` variants return a [`ParseError`] so callers
//! can count it, and the plain variants degrade it to `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};

use crate::error::ParseError;

/// Cell values treated as missing, in addition to empty/whitespace cells.
pub const MISSING_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "NULL", "null", "None", "#N/A"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Returns true if a raw cell should be read as a missing value.
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed)
}

/// Trimmed text, or `None` for a missing cell.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !is_missing(s)).map(|s| s.trim().to_string())
}

/// Trim and title-case a person name.
///
/// A letter that follows a non-letter starts a word and is upper-cased, every
/// other letter is lower-cased.
///
/// ```
/// use caremigrate::normalize::normalize_name;
///
/// assert_eq!(normalize_name(Some("  john DOE ")), Some("John Doe".to_string()));
/// assert_eq!(normalize_name(None), None);
/// ```
pub fn normalize_name(raw: Option<&str>) -> Option<String> {
    let raw = raw.filter(|s| !is_missing(s))?;

    let mut out = String::with_capacity(raw.len());
    let mut in_word = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    Some(out)
}

/// Parse a date or date-time. Date-only values become midnight.
///
/// Sub-second precision is dropped so the parsed value equals what
/// [`format_date`] stores.
pub fn try_parse_date(raw: &str) -> Result<NaiveDateTime, ParseError> {
    parse_date_exact(raw.trim()).map(|dt| dt.trunc_subsecs(0))
}

fn parse_date_exact(s: &str) -> Result<NaiveDateTime, ParseError> {

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }
    // Offsets are dropped, the dataset has no time zone notion
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }

    Err(ParseError::InvalidDate(s.to_string()))
}

/// Parse a date, `None` when missing or unparsable.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDateTime> {
    raw.filter(|s| !is_missing(s))
        .and_then(|s| try_parse_date(s).ok())
}

/// Parse an integer. Integral floats such as `"42.0"` are accepted.
pub fn try_parse_integer(raw: &str) -> Result<i64, ParseError> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Ok(n);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(ParseError::InvalidInteger(s.to_string())),
    }
}

/// Parse a finite decimal number.
pub fn try_parse_decimal(raw: &str) -> Result<f64, ParseError> {
    let s = raw.trim();
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f),
        _ => Err(ParseError::InvalidDecimal(s.to_string())),
    }
}

/// Format a parsed date the way it is stored in documents.
pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}
