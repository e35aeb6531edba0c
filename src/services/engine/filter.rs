use std::collections::BTreeSet;

use tracing::debug;

use super::error::EngineError;
use super::types::{CleanRecord, Dimension, FilterSelection, HourBucket};

/// One record's value along a dimension.
///
/// Hours order numerically and performers lexicographically, which is the
/// order the legal choice lists are returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DimValue<'a> {
    Hour(HourBucket),
    Performer(&'a str),
}

fn value_of(dimension: Dimension, record: &CleanRecord) -> DimValue<'_> {
    match dimension {
        Dimension::Hour => DimValue::Hour(record.hour_bucket()),
        Dimension::Performer => DimValue::Performer(&record.performer_id),
    }
}

fn admitted(selection: &FilterSelection, value: DimValue<'_>) -> bool {
    match value {
        DimValue::Hour(hour) => selection.hours.admits(&hour),
        DimValue::Performer(id) => selection.performers.admits(id),
    }
}

fn is_blank(selection: &FilterSelection, dimension: Dimension) -> bool {
    match dimension {
        Dimension::Hour => selection.hours.is_blank(),
        Dimension::Performer => selection.performers.is_blank(),
    }
}

fn legal_values<'a>(dimension: Dimension, records: &[&'a CleanRecord]) -> BTreeSet<DimValue<'a>> {
    records.iter().map(|r| value_of(dimension, *r)).collect()
}

fn restrict<'a>(
    records: &[&'a CleanRecord],
    dimension: Dimension,
    selection: &FilterSelection,
) -> Vec<&'a CleanRecord> {
    records
        .iter()
        .copied()
        .filter(|r| admitted(selection, value_of(dimension, r)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a> {
    pub records: Vec<&'a CleanRecord>,
    pub legal_hours: Vec<HourBucket>,
    pub legal_performers: Vec<String>,
    /// Rows inside the date range before either dimension was applied.
    pub period_rows: usize,
}

impl<'a> FilterOutcome<'a> {
    fn assign(&mut self, legal: BTreeSet<DimValue<'a>>) {
        for value in legal {
            match value {
                DimValue::Hour(hour) => self.legal_hours.push(hour),
                DimValue::Performer(id) => self.legal_performers.push(id.to_string()),
            }
        }
    }
}

/// Applies the date range and both dimension selections.
///
/// The secondary dimension's legal choices always come from rows already
/// narrowed by the primary dimension, so shrinking the primary selection can
/// never widen them.
pub fn filter<'a>(
    records: &'a [CleanRecord],
    selection: &FilterSelection,
) -> Result<FilterOutcome<'a>, EngineError> {
    let range = selection.date_range;
    if range.start > range.end {
        return Err(EngineError::InvalidSelection(format!(
            "date range starts ({}) after it ends ({})",
            range.start, range.end
        )));
    }

    let period: Vec<&CleanRecord> = records.iter().filter(|r| range.contains(r.date())).collect();
    if period.is_empty() {
        return Err(EngineError::NoDataInPeriod {
            start: range.start,
            end: range.end,
        });
    }

    let (primary, secondary) = selection.mode.order();
    if is_blank(selection, primary) {
        return Err(EngineError::SelectionRequired(primary));
    }

    let mut outcome = FilterOutcome {
        records: Vec::new(),
        legal_hours: Vec::new(),
        legal_performers: Vec::new(),
        period_rows: period.len(),
    };
    outcome.assign(legal_values(primary, &period));
    let narrowed = restrict(&period, primary, selection);

    outcome.assign(legal_values(secondary, &narrowed));
    outcome.records = restrict(&narrowed, secondary, selection);

    debug!(
        "Filter {:?}: period {} -> {} {} -> {} rows",
        selection.mode,
        period.len(),
        primary,
        narrowed.len(),
        outcome.records.len()
    );

    Ok(outcome)
}
