use serde::Serialize;
use smallvec::SmallVec;

pub const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Date,
    Text,
    Empty,
}

#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub sample_values: SmallVec<[String; SAMPLE_SIZE]>,
    pub null_count: usize,
    pub unique_count: usize,
    /// Numeric columns whose values sit in the spreadsheet-serial range of
    /// recent years.
    pub looks_like_serial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

/// Column suggestions for each role; `None` where nothing fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestedMapping {
    pub time: Option<String>,
    pub performer: Option<String>,
    pub spend: Option<String>,
    pub sales: Option<String>,
    pub revenue: Option<String>,
    pub positional: bool,
}
