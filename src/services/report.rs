use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::services::engine::{
    aggregate, filter, rank, totals, Choice, CleanRecord, DateRange, Dataset, EngineError,
    FilterMode, FilterSelection, HourBucket, PerformerSummary, RankMetric, Totals,
};

pub const DEFAULT_DETAIL_LIMIT: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    /// Defaults to the dataset's first and last day.
    pub date_range: Option<DateRange>,
    pub mode: FilterMode,
    pub hours: Choice<HourBucket>,
    pub performers: Choice<String>,
    pub rank_by: RankMetric,
    pub detail_limit: Option<usize>,
}

/// One filtered row with its display-only ratios.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    pub hour: HourBucket,
    pub performer_id: String,
    pub spend: f64,
    pub sales_count: f64,
    pub revenue: f64,
    pub roi: f64,
    pub cost_per_sale: f64,
}

impl From<&CleanRecord> for RecordView {
    fn from(record: &CleanRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            date: record.date(),
            hour: record.hour_bucket(),
            performer_id: record.performer_id.clone(),
            spend: record.spend,
            sales_count: record.sales_count,
            revenue: record.revenue,
            roi: record.roi(),
            cost_per_sale: record.cost_per_sale(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub date_range: DateRange,
    pub mode: FilterMode,
    pub rank_by: RankMetric,
    pub legal_hours: Vec<HourBucket>,
    pub legal_performers: Vec<String>,
    pub period_rows: usize,
    pub matched_rows: usize,
    pub totals: Totals,
    pub rankings: Vec<PerformerSummary>,
    pub rows: Vec<RecordView>,
    pub rows_truncated: bool,
}

/// Runs one full filter → aggregate → rank pass over a sanitized dataset.
pub fn build_report(dataset: &Dataset, query: &ReportQuery) -> Result<Report, EngineError> {
    let start = std::time::Instant::now();
    let date_range = match query.date_range.or_else(|| dataset.date_bounds()) {
        Some(range) => range,
        None => return Err(EngineError::EmptyDataset("dataset has no records".to_string())),
    };

    let selection = FilterSelection::new(date_range, query.mode)
        .with_hours(query.hours.clone())
        .with_performers(query.performers.clone());

    let outcome = filter(dataset.records(), &selection)?;
    let rankings = rank(aggregate(&outcome.records), query.rank_by);
    let totals = totals(&outcome.records);

    let limit = query.detail_limit.unwrap_or(DEFAULT_DETAIL_LIMIT);
    let rows: Vec<RecordView> = outcome
        .records
        .iter()
        .take(limit)
        .map(|r| RecordView::from(*r))
        .collect();

    if outcome.records.is_empty() {
        tracing::info!("Selection matched no rows inside {} row period", outcome.period_rows);
    }
    tracing::info!(
        "Report built: {} of {} period rows, {} performers, in {:?}",
        outcome.records.len(),
        outcome.period_rows,
        rankings.len(),
        start.elapsed()
    );

    Ok(Report {
        date_range,
        mode: query.mode,
        rank_by: query.rank_by,
        legal_hours: outcome.legal_hours,
        legal_performers: outcome.legal_performers,
        period_rows: outcome.period_rows,
        matched_rows: outcome.records.len(),
        totals,
        rankings,
        rows_truncated: outcome.records.len() > rows.len(),
        rows,
    })
}
