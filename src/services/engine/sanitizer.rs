use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{EngineError, NormalizationFailure};
use super::normalizer::normalize;
use super::types::{
    CellValue, CleanRecord, ColumnMapping, DateRange, HourBucket, RawRecord, RawTable,
    ResolvedMapping, ResolvedRevenue,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    UnparseableTime(NormalizationFailure),
    ImplausibleYear(i32),
    MissingPerformer,
    NonPositiveSpend(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SanitizeReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub unparseable_time: usize,
    pub implausible_year: usize,
    pub missing_performer: usize,
    pub non_positive_spend: usize,
}

impl SanitizeReport {
    fn record_drop(&mut self, reason: &DropReason) {
        match reason {
            DropReason::UnparseableTime(_) => self.unparseable_time += 1,
            DropReason::ImplausibleYear(_) => self.implausible_year += 1,
            DropReason::MissingPerformer => self.missing_performer += 1,
            DropReason::NonPositiveSpend(_) => self.non_positive_spend += 1,
        }
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.rows_kept
    }
}

/// A sanitized record set. Read-only once built and shared between queries.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<CleanRecord>,
    report: SanitizeReport,
}

impl Dataset {
    pub fn new(records: Vec<CleanRecord>, report: SanitizeReport) -> Self {
        Self { records, report }
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn report(&self) -> &SanitizeReport {
        &self.report
    }

    pub fn date_bounds(&self) -> Option<DateRange> {
        let first = self.records.first()?.date();
        let (start, end) = self.records.iter().map(CleanRecord::date).fold(
            (first, first),
            |(lo, hi): (NaiveDate, NaiveDate), day| (lo.min(day), hi.max(day)),
        );
        Some(DateRange::new(start, end))
    }

    pub fn hours(&self) -> Vec<HourBucket> {
        let set: BTreeSet<HourBucket> = self.records.iter().map(CleanRecord::hour_bucket).collect();
        set.into_iter().collect()
    }

    pub fn performers(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.performer_id.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }
}

/// Coerces a cell to a number; anything unreadable becomes zero.
pub fn coerce_number(cell: &CellValue) -> f64 {
    cell.as_number().unwrap_or(0.0)
}

fn performer_id(cell: &CellValue) -> Option<String> {
    let id = match cell {
        CellValue::Empty => return None,
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) if !n.is_finite() => return None,
        CellValue::Number(_) => cell.to_string(),
    };
    (!id.is_empty()).then_some(id)
}

/// Cleans one row. Every failure is a drop, never an error.
pub fn sanitize(
    raw: RawRecord<'_>,
    mapping: &ResolvedMapping,
    min_year: i32,
) -> Result<CleanRecord, DropReason> {
    let timestamp = normalize(raw.at(mapping.time)).map_err(DropReason::UnparseableTime)?;
    if timestamp.year() <= min_year {
        return Err(DropReason::ImplausibleYear(timestamp.year()));
    }

    let spend = coerce_number(raw.at(mapping.spend));
    let sales_count = coerce_number(raw.at(mapping.sales)).max(0.0);

    let performer_id = performer_id(raw.at(mapping.performer)).ok_or(DropReason::MissingPerformer)?;

    if spend <= 0.0 {
        return Err(DropReason::NonPositiveSpend(spend));
    }

    let revenue = match mapping.revenue {
        ResolvedRevenue::Column(idx) => coerce_number(raw.at(idx)).max(0.0),
        ResolvedRevenue::Derived(unit_price) => sales_count * unit_price,
    };

    Ok(CleanRecord {
        timestamp,
        performer_id,
        spend,
        sales_count,
        revenue,
    })
}

/// Resolves the mapping and cleans every row of the table.
pub fn sanitize_table(
    table: &RawTable,
    mapping: &ColumnMapping,
    min_year: i32,
) -> Result<Dataset, EngineError> {
    let start = std::time::Instant::now();
    let resolved = mapping.resolve(&table.headers)?;
    debug!("Resolved column mapping: {:?}", resolved);

    let mut report = SanitizeReport {
        rows_read: table.rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());

    for (row_idx, raw) in table.records().enumerate() {
        match sanitize(raw, &resolved, min_year) {
            Ok(record) => records.push(record),
            Err(reason) => {
                if matches!(reason, DropReason::UnparseableTime(NormalizationFailure::Unparseable(_))) {
                    debug!("Row {} dropped: {:?}", row_idx + 1, reason);
                }
                report.record_drop(&reason);
            }
        }
    }
    report.rows_kept = records.len();

    info!(
        "Sanitized {} rows into {} records in {:?}; {} dropped (time: {}, year: {}, performer: {}, spend: {})",
        report.rows_read,
        report.rows_kept,
        start.elapsed(),
        report.rows_dropped(),
        report.unparseable_time,
        report.implausible_year,
        report.missing_performer,
        report.non_positive_spend,
    );

    if records.is_empty() {
        warn!("No rows survived sanitizing");
        return Err(EngineError::EmptyDataset(format!(
            "all {} rows were dropped; check the column mapping",
            report.rows_dropped()
        )));
    }

    Ok(Dataset::new(records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::types::{ColumnRole, RevenueSource};
    use chrono::Timelike;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn table(rows: Vec<Vec<CellValue>>) -> RawTable {
        let headers = ["time", "performer", "cost", "sales", "revenue"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        RawTable::new(headers, rows)
    }

    fn mapping(revenue: RevenueSource) -> ColumnMapping {
        ColumnMapping {
            time: Some("time".into()),
            performer: Some("performer".into()),
            spend: Some("cost".into()),
            sales: Some("sales".into()),
            revenue: Some(revenue),
        }
    }

    fn derived(unit_price: f64) -> ColumnMapping {
        mapping(RevenueSource::Derived { unit_price })
    }

    #[test]
    fn test_scenario_row_with_unit_price() {
        let t = table(vec![vec![
            CellValue::Number(46023.25),
            text("Amy"),
            text("100"),
            text("2"),
            text(""),
        ]]);
        let dataset = sanitize_table(&t, &derived(50.0), 2000).unwrap();
        let record = &dataset.records()[0];

        assert_eq!(record.timestamp.hour(), 6);
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(record.hour_bucket().to_string(), "6:00");
        assert_eq!(record.spend, 100.0);
        assert_eq!(record.sales_count, 2.0);
        assert_eq!(record.revenue, 100.0);
        assert_eq!(record.roi(), 1.0);
        assert_eq!(record.cost_per_sale(), 50.0);
    }

    #[test]
    fn test_non_positive_spend_is_dropped() {
        let t = table(vec![
            vec![CellValue::Number(46023.25), text("Amy"), text("0"), text("3"), text("90")],
            vec![CellValue::Number(46023.25), text("Amy"), text("-5"), text("3"), text("90")],
            vec![CellValue::Number(46023.25), text("Amy"), text("n/a"), text("3"), text("90")],
            vec![CellValue::Number(46023.25), text("Amy"), CellValue::Empty, text("3"), text("90")],
            vec![CellValue::Number(46023.25), text("Bob"), text("10"), text("3"), text("90")],
        ]);
        let dataset = sanitize_table(&t, &mapping(RevenueSource::Column("revenue".into())), 2000).unwrap();

        assert_eq!(dataset.records().len(), 1);
        assert_eq!(dataset.records()[0].performer_id, "Bob");
        assert_eq!(dataset.report().non_positive_spend, 4);
        assert!(dataset.records().iter().all(|r| r.spend > 0.0));
    }

    #[test]
    fn test_unreadable_numbers_coerce_to_zero() {
        let t = table(vec![vec![
            text("2026-01-02 10:00"),
            text("  Cara  "),
            text(" 1,200.5 "),
            text("many"),
            text("oops"),
        ]]);
        let dataset = sanitize_table(&t, &mapping(RevenueSource::Column("revenue".into())), 2000).unwrap();
        let record = &dataset.records()[0];

        assert_eq!(record.performer_id, "Cara");
        assert_eq!(record.spend, 1200.5);
        assert_eq!(record.sales_count, 0.0);
        assert_eq!(record.revenue, 0.0);
        assert_eq!(record.cost_per_sale(), 0.0);
    }

    #[test]
    fn test_row_level_drops_are_counted() {
        let t = table(vec![
            vec![text("garbage"), text("Amy"), text("10"), text("1"), text("10")],
            vec![text("1970-01-01 00:00"), text("Amy"), text("10"), text("1"), text("10")],
            vec![CellValue::Number(46023.0), text("   "), text("10"), text("1"), text("10")],
            vec![CellValue::Number(46023.0), CellValue::Number(7.0), text("10"), text("1"), text("10")],
        ]);
        let dataset = sanitize_table(&t, &derived(1.0), 2000).unwrap();
        let report = dataset.report();

        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_kept, 1);
        assert_eq!(report.unparseable_time, 1);
        assert_eq!(report.implausible_year, 1);
        assert_eq!(report.missing_performer, 1);
        assert_eq!(report.rows_dropped(), 3);
        assert_eq!(dataset.records()[0].performer_id, "7");
    }

    #[test]
    fn test_year_threshold_is_exclusive() {
        let t = table(vec![vec![text("2000-06-01 12:00"), text("Amy"), text("5"), text("1"), text("")]]);
        let err = sanitize_table(&t, &derived(1.0), 2000).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDataset(_)));

        let dataset = sanitize_table(&t, &derived(1.0), 1999).unwrap();
        assert_eq!(dataset.records().len(), 1);
    }

    #[test]
    fn test_missing_role_is_a_mapping_error() {
        let t = table(vec![]);
        let mut m = derived(1.0);
        m.spend = None;
        assert_eq!(
            sanitize_table(&t, &m, 2000).unwrap_err(),
            EngineError::ColumnMapping {
                role: ColumnRole::Spend,
                reason: "no column selected".into()
            }
        );

        let mut m = derived(1.0);
        m.performer = Some("主播姓名".into());
        assert!(matches!(
            sanitize_table(&t, &m, 2000),
            Err(EngineError::ColumnMapping { role: ColumnRole::Performer, .. })
        ));

        let mut m = derived(1.0);
        m.revenue = None;
        assert!(matches!(
            sanitize_table(&t, &m, 2000),
            Err(EngineError::ColumnMapping { role: ColumnRole::Revenue, .. })
        ));
    }

    #[test]
    fn test_dataset_views() {
        let t = table(vec![
            vec![text("2026-01-03 14:00"), text("Bob"), text("5"), text("1"), text("")],
            vec![text("2026-01-01 09:00"), text("Amy"), text("5"), text("1"), text("")],
            vec![text("2026-01-02 14:30"), text("Amy"), text("5"), text("1"), text("")],
        ]);
        let dataset = sanitize_table(&t, &derived(1.0), 2000).unwrap();

        let bounds = dataset.date_bounds().unwrap();
        assert_eq!(bounds.start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(bounds.end, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
        let hours: Vec<String> = dataset.hours().iter().map(|h| h.to_string()).collect();
        assert_eq!(hours, vec!["9:00", "14:00"]);
        assert_eq!(dataset.performers(), vec!["Amy", "Bob"]);
    }
}
