//! Feed file readers.
//!
//! Turns a supplier file into [`FeedRow`]s. The reconciliation engine is
//! format-agnostic; this module is the only place that knows about files.
//!
//! | Extension | Reader |
//! |-----------|--------|
//! | `.csv` | comma-delimited, header row required |
//! | `.tsv` | tab-delimited, header row required |
//! | `.json` | array of objects |
//!
//! CSV rows are numbered by their line in the file, so with the header on
//! line 1 the first data row is row 2. JSON rows are numbered from 1.

use anyhow::{Context, Result};
use std::path::Path;

use catalog_sync_core::models::{CellValue, FeedRow};
use catalog_sync_core::SyncError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Csv,
    Tsv,
    Json,
}

impl FeedFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(FeedFormat::Csv),
            Some("tsv") => Ok(FeedFormat::Tsv),
            Some("json") => Ok(FeedFormat::Json),
            _ => Err(SyncError::Configuration(format!(
                "unsupported feed format: {} (expected .csv, .tsv or .json)",
                path.display()
            ))
            .into()),
        }
    }
}

/// Read every data row of the feed at `path`.
pub fn read_feed(path: &Path) -> Result<Vec<FeedRow>> {
    let format = FeedFormat::from_path(path)?;
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read feed file: {}", path.display()))?;
    let rows = parse_feed(&data, format)
        .with_context(|| format!("Failed to parse feed file: {}", path.display()))?;
    tracing::debug!(file = %path.display(), rows = rows.len(), ?format, "feed read");
    Ok(rows)
}

pub fn parse_feed(data: &[u8], format: FeedFormat) -> Result<Vec<FeedRow>> {
    let data = strip_utf8_bom(data);
    match format {
        FeedFormat::Csv => parse_delimited(data, b','),
        FeedFormat::Tsv => parse_delimited(data, b'\t'),
        FeedFormat::Json => parse_json(data),
    }
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(UTF8_BOM) {
        &data[UTF8_BOM.len()..]
    } else {
        data
    }
}

fn parse_delimited(data: &[u8], delimiter: u8) -> Result<Vec<FeedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse data record {}", idx + 1))?;
        let row_number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let mut row = FeedRow::new(row_number);
        for (header, value) in headers.iter().zip(record.iter()) {
            if header.is_empty() {
                continue;
            }
            let cell = if value.trim().is_empty() {
                CellValue::Blank
            } else {
                CellValue::Text(value.to_string())
            };
            row.cells.insert(header.clone(), cell);
        }

        if row.cells.values().all(|c| matches!(c, CellValue::Blank)) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_json(data: &[u8]) -> Result<Vec<FeedRow>> {
    let value: serde_json::Value = serde_json::from_slice(data).context("Invalid JSON")?;
    let items = value
        .as_array()
        .context("JSON feed must be an array of objects")?;

    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .with_context(|| format!("JSON feed element {} is not an object", idx + 1))?;
        let mut row = FeedRow::new(idx + 1);
        for (key, v) in object {
            let cell = match v {
                serde_json::Value::Null => CellValue::Blank,
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(f) => CellValue::Number(f),
                    None => CellValue::Text(n.to_string()),
                },
                serde_json::Value::String(s) => CellValue::Text(s.clone()),
                other => CellValue::Text(other.to_string()),
            };
            row.cells.insert(key.clone(), cell);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_numbered_from_two() {
        let data = b"modelRef,color,stock\nBG100,BLACK,8\nBG200,RED,3\n";
        let rows = parse_feed(data, FeedFormat::Csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[1].row_number, 3);
        assert_eq!(
            rows[0].cells.get("stock"),
            Some(&CellValue::Text("8".to_string()))
        );
    }

    #[test]
    fn test_csv_bom_stripped() {
        let mut data = UTF8_BOM.to_vec();
        data.extend_from_slice(b"modelRef,color\nBG100,BLACK\n");
        let rows = parse_feed(&data, FeedFormat::Csv).unwrap();
        assert!(rows[0].cells.contains_key("modelRef"));
    }

    #[test]
    fn test_csv_blank_rows_skipped() {
        let data = b"modelRef,color\nBG100,BLACK\n,\nBG200,RED\n";
        let rows = parse_feed(data, FeedFormat::Csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_number, 4);
    }

    #[test]
    fn test_tsv_delimiter() {
        let data = b"modelRef\tcolor\tprice\nBG100\tBLACK\t12,50\n";
        let rows = parse_feed(data, FeedFormat::Tsv).unwrap();
        assert_eq!(
            rows[0].cells.get("price"),
            Some(&CellValue::Text("12,50".to_string()))
        );
    }

    #[test]
    fn test_json_values() {
        let data = br#"[{"modelRef": "BG100", "stock": 8, "size": null}]"#;
        let rows = parse_feed(data, FeedFormat::Json).unwrap();
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].cells.get("stock"), Some(&CellValue::Number(8.0)));
        assert_eq!(rows[0].cells.get("size"), Some(&CellValue::Blank));
    }

    #[test]
    fn test_json_must_be_array() {
        assert!(parse_feed(br#"{"modelRef": "BG100"}"#, FeedFormat::Json).is_err());
    }

    #[test]
    fn test_unknown_extension() {
        let err = FeedFormat::from_path(Path::new("feed.xlsx")).unwrap_err();
        assert!(err.downcast_ref::<SyncError>().is_some());
    }
}
