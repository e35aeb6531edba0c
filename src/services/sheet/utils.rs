use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;

use super::types::SheetFormat;
use crate::error::AppError;

/// Trims a header and makes it unique among the headers seen so far.
pub fn clean_header(name: &str, position: usize, existing_names: &mut HashSet<String>) -> String {
    let trimmed = name.trim();
    let mut cleaned = if trimmed.is_empty() {
        format!("column_{}", position + 1)
    } else {
        trimmed.to_string()
    };

    // If the name already exists, add a numeric suffix
    let mut counter = 1;
    let original_name = cleaned.clone();
    while !existing_names.insert(cleaned.clone()) {
        cleaned = format!("{}_{}", original_name, counter);
        counter += 1;
    }

    cleaned
}

/// Picks a decoder from the file extension, falling back to magic bytes.
pub fn detect_format(file_name: Option<&str>, data: &[u8]) -> SheetFormat {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.trim().to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") | Some("txt") => SheetFormat::Csv,
        Some("xlsx") | Some("xlsm") | Some("xlsb") => SheetFormat::Xlsx,
        Some("xls") => SheetFormat::Xls,
        Some("ods") => SheetFormat::Ods,
        _ if data.starts_with(b"PK\x03\x04") => SheetFormat::Xlsx,
        _ if data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) => SheetFormat::Xls,
        _ => SheetFormat::Csv,
    }
}

pub async fn load_file_from_url(url: &str, timeout: Duration) -> Result<Bytes, AppError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::HttpError(format!(
            "Failed to fetch file. Status: {}",
            response.status()
        )));
    }

    response
        .bytes()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to read response bytes: {}", e)))
}

/// Last path segment of a URL, without its query string.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?.trim();
    (!name.is_empty() && name.contains('.')).then(|| name.to_string())
}
