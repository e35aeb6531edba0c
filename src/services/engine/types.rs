use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::EngineError;

/// An untyped spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Numeric reading of the cell: numbers as-is, text parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => parse_number(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Parses a human-entered number, tolerating surrounding whitespace and
/// thousands separators.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A header row plus data rows, exactly as read from the sheet.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> + '_ {
        self.rows.iter().map(|cells| RawRecord { cells })
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    cells: &'a [CellValue],
}

impl<'a> RawRecord<'a> {
    pub fn at(&self, idx: usize) -> &'a CellValue {
        self.cells.get(idx).unwrap_or(&EMPTY_CELL)
    }
}

/// Hour-of-day bucket, rendered as `"6:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourBucket(u8);

impl HourBucket {
    pub fn new(hour: u32) -> Option<Self> {
        (hour < 24).then_some(Self(hour as u8))
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:00", self.0)
    }
}

impl FromStr for HourBucket {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hour_part = match trimmed.split_once(':') {
            Some((hour, minutes)) if minutes == "00" => hour,
            Some(_) => return Err(EngineError::InvalidSelection(format!("hour label {:?}", s))),
            None => trimmed,
        };
        hour_part
            .parse::<u32>()
            .ok()
            .and_then(HourBucket::new)
            .ok_or_else(|| EngineError::InvalidSelection(format!("hour label {:?}", s)))
    }
}

impl Serialize for HourBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HourBucket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// A sanitized broadcast row.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub timestamp: NaiveDateTime,
    pub performer_id: String,
    pub spend: f64,
    pub sales_count: f64,
    pub revenue: f64,
}

impl CleanRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn hour_bucket(&self) -> HourBucket {
        HourBucket(self.timestamp.hour() as u8)
    }

    /// Row-level ROI. Detail views only.
    pub fn roi(&self) -> f64 {
        ratio(self.revenue, self.spend)
    }

    /// Row-level cost per sale. Detail views only.
    pub fn cost_per_sale(&self) -> f64 {
        ratio(self.spend, self.sales_count)
    }
}

pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Time,
    Performer,
    Spend,
    Sales,
    Revenue,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Time => "time",
            ColumnRole::Performer => "performer",
            ColumnRole::Spend => "spend",
            ColumnRole::Sales => "sales",
            ColumnRole::Revenue => "revenue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevenueSource {
    Column(String),
    Derived { unit_price: f64 },
}

/// Which input column feeds each role. Unset roles are reported at resolve time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    pub time: Option<String>,
    pub performer: Option<String>,
    pub spend: Option<String>,
    pub sales: Option<String>,
    pub revenue: Option<RevenueSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedRevenue {
    Column(usize),
    Derived(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMapping {
    pub time: usize,
    pub performer: usize,
    pub spend: usize,
    pub sales: usize,
    pub revenue: ResolvedRevenue,
}

impl ColumnMapping {
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedMapping, EngineError> {
        let find = |role: ColumnRole, column: &Option<String>| -> Result<usize, EngineError> {
            let name = column.as_deref().map(str::trim).filter(|n| !n.is_empty()).ok_or(
                EngineError::ColumnMapping {
                    role,
                    reason: "no column selected".to_string(),
                },
            )?;
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EngineError::ColumnMapping {
                    role,
                    reason: format!("column {:?} not found", name),
                })
        };

        let time = find(ColumnRole::Time, &self.time)?;
        let performer = find(ColumnRole::Performer, &self.performer)?;
        let spend = find(ColumnRole::Spend, &self.spend)?;
        let sales = find(ColumnRole::Sales, &self.sales)?;

        let revenue = match &self.revenue {
            Some(RevenueSource::Column(name)) => {
                ResolvedRevenue::Column(find(ColumnRole::Revenue, &Some(name.clone()))?)
            }
            Some(RevenueSource::Derived { unit_price }) if unit_price.is_finite() && *unit_price >= 0.0 => {
                ResolvedRevenue::Derived(*unit_price)
            }
            Some(RevenueSource::Derived { unit_price }) => {
                return Err(EngineError::ColumnMapping {
                    role: ColumnRole::Revenue,
                    reason: format!("unit price {} must be a non-negative number", unit_price),
                })
            }
            None => {
                return Err(EngineError::ColumnMapping {
                    role: ColumnRole::Revenue,
                    reason: "neither a revenue column nor a unit price was given".to_string(),
                })
            }
        };

        Ok(ResolvedMapping {
            time,
            performer,
            spend,
            sales,
            revenue,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Hour,
    Performer,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Hour => f.write_str("hour"),
            Dimension::Performer => f.write_str("performer"),
        }
    }
}

/// Which dimension restricts the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    TimeThenPerformer,
    PerformerThenTime,
}

impl FilterMode {
    /// `(primary, secondary)` dimensions for this mode.
    pub fn order(self) -> (Dimension, Dimension) {
        match self {
            FilterMode::TimeThenPerformer => (Dimension::Hour, Dimension::Performer),
            FilterMode::PerformerThenTime => (Dimension::Performer, Dimension::Hour),
        }
    }
}

/// A multiselect state: everything legal, or an explicit (possibly empty) set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: Ord> Choice<T> {
    pub fn only<I: IntoIterator<Item = T>>(values: I) -> Self {
        Choice::Only(values.into_iter().collect())
    }

    pub fn admits<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Choice::All => true,
            Choice::Only(set) => set.contains(value),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Choice::Only(set) if set.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSelection {
    pub date_range: DateRange,
    pub mode: FilterMode,
    pub hours: Choice<HourBucket>,
    pub performers: Choice<String>,
}

impl FilterSelection {
    pub fn new(date_range: DateRange, mode: FilterMode) -> Self {
        Self {
            date_range,
            mode,
            hours: Choice::All,
            performers: Choice::All,
        }
    }

    pub fn with_hours(mut self, hours: Choice<HourBucket>) -> Self {
        self.hours = hours;
        self
    }

    pub fn with_performers(mut self, performers: Choice<String>) -> Self {
        self.performers = performers;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformerSummary {
    pub performer_id: String,
    pub row_count: usize,
    pub total_spend: f64,
    pub total_sales: f64,
    pub total_revenue: f64,
    pub roi: f64,
    pub cost_per_sale: f64,
}

/// Headline figures over a filtered record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub row_count: usize,
    pub total_spend: f64,
    pub total_sales: f64,
    pub total_revenue: f64,
    pub roi: f64,
    pub cost_per_sale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Roi,
    Revenue,
    RowCount,
    Sales,
    Spend,
    CostPerSale,
}

impl RankMetric {
    /// Lower cost per sale is better; every other metric ranks high-first.
    pub fn ascending(self) -> bool {
        matches!(self, RankMetric::CostPerSale)
    }

    pub fn value(self, summary: &PerformerSummary) -> f64 {
        match self {
            RankMetric::Roi => summary.roi,
            RankMetric::Revenue => summary.total_revenue,
            RankMetric::RowCount => summary.row_count as f64,
            RankMetric::Sales => summary.total_sales,
            RankMetric::Spend => summary.total_spend,
            RankMetric::CostPerSale => summary.cost_per_sale,
        }
    }
}
