use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::NormalizationFailure;
use super::types::CellValue;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

// Roughly year 9999 measured from the spreadsheet epoch.
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

static SPREADSHEET_EPOCH: Lazy<NaiveDateTime> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("spreadsheet epoch is a valid date")
});

static CJK_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*[日号]?\s*(.*)$").expect("valid CJK date pattern")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%d %H:%M:%S",
    "%Y%m%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y.%m.%d", "%Y%m%d"];

/// Turns a raw cell into a timestamp.
///
/// Anything that reads as a number is a day count from 1899-12-30 with the
/// fraction as time of day. Everything else, and numeric text that is out of
/// serial range, goes through text parsing.
/// Implausible years are returned as-is.
pub fn normalize(raw: &CellValue) -> Result<NaiveDateTime, NormalizationFailure> {
    match raw {
        CellValue::Empty => Err(NormalizationFailure::Empty),
        CellValue::Number(serial) => from_serial(*serial),
        CellValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(NormalizationFailure::Empty);
            }
            match text.parse::<f64>() {
                // Compact keys like "20260101" read as numbers but overflow as serials.
                Ok(serial) => from_serial(serial).or_else(|err| parse_text(text).map_err(|_| err)),
                Err(_) => parse_text(text),
            }
        }
    }
}

pub fn from_serial(serial: f64) -> Result<NaiveDateTime, NormalizationFailure> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL_DAYS {
        return Err(NormalizationFailure::OutOfRange(serial));
    }
    let micros = (serial * MICROS_PER_DAY).round() as i64;
    SPREADSHEET_EPOCH
        .checked_add_signed(Duration::microseconds(micros))
        .ok_or(NormalizationFailure::OutOfRange(serial))
}

pub fn parse_text(text: &str) -> Result<NaiveDateTime, NormalizationFailure> {
    let text = text.trim();

    if let Some(caps) = CJK_DATE.captures(text) {
        let rest = caps[4].trim();
        let rebuilt = if rest.is_empty() {
            format!("{}-{}-{}", &caps[1], &caps[2], &caps[3])
        } else {
            format!("{}-{}-{} {}", &caps[1], &caps[2], &caps[3], rest)
        };
        return parse_plain(&rebuilt).ok_or_else(|| NormalizationFailure::Unparseable(text.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.naive_local());
    }

    parse_plain(text).ok_or_else(|| NormalizationFailure::Unparseable(text.to_string()))
}

fn parse_plain(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// True when the text reads as a calendar date or date-time.
pub fn is_date_text(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.parse::<f64>().is_err() && parse_text(text).is_ok()
}
