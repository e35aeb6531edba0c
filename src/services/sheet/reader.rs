use std::collections::HashSet;
use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Ods, Reader, Xls, Xlsx};

use super::types::SheetFormat;
use super::utils::{clean_header, detect_format};
use crate::error::AppError;
use crate::services::engine::{CellValue, RawTable};

pub struct SheetReader;

impl SheetReader {
    /// Decodes the first sheet of a workbook, or a CSV file, into a raw table.
    pub fn read(&self, file_data: Bytes, file_name: Option<&str>) -> Result<RawTable, AppError> {
        let start = std::time::Instant::now();
        let format = detect_format(file_name, &file_data);
        tracing::info!("Reading {:?} sheet ({}KB)", format, file_data.len() / 1024);

        let rows = match format {
            SheetFormat::Csv => self.read_csv(&file_data)?,
            SheetFormat::Xlsx => self.read_workbook::<Xlsx<_>>(file_data)?,
            SheetFormat::Xls => self.read_workbook::<Xls<_>>(file_data)?,
            SheetFormat::Ods => self.read_workbook::<Ods<_>>(file_data)?,
        };

        let table = self.build_table(rows)?;
        tracing::info!(
            "Read {} rows x {} columns in {:?}",
            table.rows.len(),
            table.headers.len(),
            start.elapsed()
        );
        Ok(table)
    }

    fn read_workbook<R>(&self, file_data: Bytes) -> Result<Vec<Vec<CellValue>>, AppError>
    where
        R: Reader<Cursor<Bytes>>,
        R::Error: std::fmt::Display,
    {
        let cursor = Cursor::new(file_data);
        let mut workbook: R = open_workbook_from_rs(cursor).map_err(|e| {
            tracing::error!("Failed to open workbook: {}", e);
            AppError::FileProcessingError(format!("Failed to open workbook: {}", e))
        })?;

        let sheet_names = workbook.sheet_names().to_vec();
        tracing::debug!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);
        let sheet_name = sheet_names
            .first()
            .ok_or_else(|| AppError::FileProcessingError("No sheets found in workbook".to_string()))?;
        if sheet_names.len() > 1 {
            tracing::warn!("Workbook has {} sheets; only {} is read", sheet_names.len(), sheet_name);
        }

        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| AppError::FileProcessingError(format!("Failed to read worksheet {}: {}", sheet_name, e)))?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect())
    }

    fn read_csv(&self, file_data: &[u8]) -> Result<Vec<Vec<CellValue>>, AppError> {
        let data = file_data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(file_data);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| AppError::ParseError(format!("CSV line {}: {}", line + 1, e)))?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn build_table(&self, rows: Vec<Vec<CellValue>>) -> Result<RawTable, AppError> {
        let mut rows = rows.into_iter().skip_while(|row| row.iter().all(CellValue::is_empty));

        let header_row = rows
            .next()
            .ok_or_else(|| AppError::FileProcessingError("Sheet has no header row".to_string()))?;

        let mut existing_names = HashSet::new();
        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(idx, cell)| clean_header(&cell.to_string(), idx, &mut existing_names))
            .collect();

        let data: Vec<Vec<CellValue>> = rows
            .filter(|row| !row.iter().all(CellValue::is_empty))
            .collect();

        if data.is_empty() {
            tracing::warn!("Sheet has headers but no data rows");
        }

        Ok(RawTable::new(headers, data))
    }
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(d) => CellValue::Number(d.as_f64()),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}
