use std::collections::HashSet;

use rayon::prelude::*;
use smallvec::SmallVec;

use super::types::{ColumnKind, ColumnProfile, SAMPLE_SIZE};
use crate::services::engine::normalizer::is_date_text;
use crate::services::engine::{CellValue, RawTable};

const PROFILE_ROWS: usize = 1000;
const TYPE_DETECTION_ROWS: usize = 100;

// Serial day numbers for 2000-01-01 and 2100-01-01.
const SERIAL_RANGE: std::ops::Range<f64> = 36526.0..73051.0;

#[derive(Default)]
struct Tally {
    nulls: usize,
    numeric: usize,
    dates: usize,
    serial_like: usize,
}

impl Tally {
    fn merge(self, other: Tally) -> Tally {
        Tally {
            nulls: self.nulls + other.nulls,
            numeric: self.numeric + other.numeric,
            dates: self.dates + other.dates,
            serial_like: self.serial_like + other.serial_like,
        }
    }
}

pub struct SheetAnalyzer;

impl SheetAnalyzer {
    /// Profiles every column over the leading rows of the table.
    pub fn profile(&self, table: &RawTable) -> Vec<ColumnProfile> {
        let start = std::time::Instant::now();
        let profiles: Vec<ColumnProfile> = table
            .headers
            .par_iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<CellValue> = table
                    .rows
                    .iter()
                    .take(PROFILE_ROWS)
                    .map(|row| row.get(idx).cloned().unwrap_or(CellValue::Empty))
                    .collect();
                self.analyze_column(&values, name)
            })
            .collect();

        tracing::debug!("Profiled {} columns in {:?}", profiles.len(), start.elapsed());
        profiles
    }

    fn analyze_column(&self, values: &[CellValue], name: &str) -> ColumnProfile {
        let null_count = values.iter().filter(|v| v.is_empty()).count();

        let seen_values: HashSet<String> = values
            .par_iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();

        let sample_values: SmallVec<[String; SAMPLE_SIZE]> = values
            .iter()
            .filter(|v| !v.is_empty())
            .take(SAMPLE_SIZE)
            .map(|v| v.to_string())
            .collect();

        let (kind, looks_like_serial) = self.detect_column_kind(values);

        ColumnProfile {
            name: name.to_string(),
            kind,
            sample_values,
            null_count,
            unique_count: seen_values.len(),
            looks_like_serial,
        }
    }

    fn detect_column_kind(&self, values: &[CellValue]) -> (ColumnKind, bool) {
        let tally = values
            .par_iter()
            .take(TYPE_DETECTION_ROWS)
            .fold(Tally::default, |mut tally, value| {
                match value {
                    v if v.is_empty() => tally.nulls += 1,
                    CellValue::Text(s) if is_date_text(s) => tally.dates += 1,
                    v => {
                        if let Some(n) = v.as_number() {
                            tally.numeric += 1;
                            if SERIAL_RANGE.contains(&n) {
                                tally.serial_like += 1;
                            }
                        }
                    }
                }
                tally
            })
            .reduce(Tally::default, Tally::merge);

        let total = values.len().min(TYPE_DETECTION_ROWS) - tally.nulls;
        if total == 0 {
            return (ColumnKind::Empty, false);
        }

        let threshold = total as f64 * 0.8;
        let kind = match () {
            _ if tally.numeric as f64 >= threshold => ColumnKind::Numeric,
            _ if tally.dates as f64 >= threshold => ColumnKind::Date,
            _ => ColumnKind::Text,
        };
        let looks_like_serial = kind == ColumnKind::Numeric && tally.serial_like as f64 >= threshold;
        (kind, looks_like_serial)
    }
}
