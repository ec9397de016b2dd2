//! Core data models used throughout Catalog Sync.
//!
//! These types represent the catalog entries, normalized feed records, and
//! change records that flow through the reconciliation pipeline. All types
//! are serializable so they can be persisted inside history entries and
//! rendered as JSON by the CLI.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix carried by identifiers minted by the pipeline for entries whose
/// feed row supplied no `id`.
pub const SYNTHETIC_ID_PREFIX: &str = "auto-";

/// A product as it exists in the catalog store.
///
/// `id` is the store key. Entries created from rows without an explicit
/// identifier carry a synthetic id (see [`SYNTHETIC_ID_PREFIX`]).
/// `(model_ref, color, size)` is **not** guaranteed unique: legacy
/// duplicates may exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub model_ref: String,
    pub color: String,
    #[serde(default)]
    pub size: Option<String>,
    pub stock_quantity: i64,
    pub price_retail: f64,
    pub price_wholesale: f64,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CatalogEntry {
    /// Whether `id` was supplied by a feed or an operator rather than minted
    /// by the pipeline.
    pub fn has_stable_id(&self) -> bool {
        !self.id.trim().is_empty() && !self.id.starts_with(SYNTHETIC_ID_PREFIX)
    }

    /// Short human label used in suggestions and log lines.
    pub fn label(&self) -> String {
        match &self.size {
            Some(size) => format!("{} / {} / {}", self.model_ref, self.color, size),
            None => format!("{} / {}", self.model_ref, self.color),
        }
    }
}

/// Partial update applied to a stored entry. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub model_ref: Option<String>,
    pub color: Option<String>,
    pub size: Option<Option<String>>,
    pub stock_quantity: Option<i64>,
    pub price_retail: Option<f64>,
    pub price_wholesale: Option<f64>,
    pub product_name: Option<Option<String>>,
    pub brand: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

impl EntryPatch {
    /// A patch that overwrites every mutable field with the values in `entry`.
    pub fn replace_with(entry: &CatalogEntry) -> Self {
        Self {
            model_ref: Some(entry.model_ref.clone()),
            color: Some(entry.color.clone()),
            size: Some(entry.size.clone()),
            stock_quantity: Some(entry.stock_quantity),
            price_retail: Some(entry.price_retail),
            price_wholesale: Some(entry.price_wholesale),
            product_name: Some(entry.product_name.clone()),
            brand: Some(entry.brand.clone()),
            image_url: Some(entry.image_url.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this patch to an in-memory entry.
    pub fn apply_to(&self, entry: &mut CatalogEntry) {
        if let Some(v) = &self.model_ref {
            entry.model_ref = v.clone();
        }
        if let Some(v) = &self.color {
            entry.color = v.clone();
        }
        if let Some(v) = &self.size {
            entry.size = v.clone();
        }
        if let Some(v) = self.stock_quantity {
            entry.stock_quantity = v;
        }
        if let Some(v) = self.price_retail {
            entry.price_retail = v;
        }
        if let Some(v) = self.price_wholesale {
            entry.price_wholesale = v;
        }
        if let Some(v) = &self.product_name {
            entry.product_name = v.clone();
        }
        if let Some(v) = &self.brand {
            entry.brand = v.clone();
        }
        if let Some(v) = &self.image_url {
            entry.image_url = v.clone();
        }
    }
}

/// One raw cell from a feed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Blank,
}

impl CellValue {
    /// Trimmed text content, `None` when the cell is blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Blank => None,
            CellValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

/// One raw row from a feed: column name → cell, plus its position in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRow {
    pub row_number: usize,
    pub cells: BTreeMap<String, CellValue>,
}

impl FeedRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: BTreeMap::new(),
        }
    }

    /// Builder used by tests and readers: `FeedRow::new(2).cell("stock", 8)`.
    pub fn cell(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    /// Flattened `column → text` view, used when reporting a row back.
    pub fn raw_text(&self) -> BTreeMap<String, String> {
        self.cells
            .iter()
            .map(|(k, v)| (k.clone(), v.as_text().unwrap_or_default()))
            .collect()
    }
}

/// Normalized view of one feed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRecord {
    pub row_number: usize,
    pub model_ref: String,
    pub color: Option<String>,
    pub id: Option<String>,
    pub size: Option<String>,
    pub stock_quantity: Option<i64>,
    pub price_retail: Option<f64>,
    pub price_wholesale: Option<f64>,
    pub product_name: Option<String>,
}

/// A typed field value carried by a [`ChangeRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Decimal(f64),
    Text(Option<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Decimal(v) => write!(f, "{:.2}", v),
            FieldValue::Text(Some(v)) => write!(f, "{}", v),
            FieldValue::Text(None) => write!(f, "-"),
        }
    }
}

/// One field-level change, either from a feed row or from stock sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub model_ref: String,
    pub color: String,
    pub field: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

/// Run counters shared by the report and history entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_rows: usize,
    pub updated: usize,
    pub inserted: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub stock_zeroed: usize,
    pub errors_count: usize,
}

/// An entry updated from a feed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedProduct {
    pub row: usize,
    pub id: String,
    pub model_ref: String,
    pub color: String,
    pub changes: Vec<ChangeRecord>,
}

/// An entry created from a feed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProduct {
    pub row: usize,
    pub id: String,
    pub model_ref: String,
    pub color: String,
    pub size: Option<String>,
    pub stock_quantity: i64,
}

/// A catalog candidate offered for an ambiguous row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub model_ref: String,
    pub color: String,
    pub size: Option<String>,
}

impl From<&CatalogEntry> for Suggestion {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            model_ref: entry.model_ref.clone(),
            color: entry.color.clone(),
            size: entry.size.clone(),
        }
    }
}

/// A row that could not be matched to exactly one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotFoundRow {
    pub row: usize,
    pub raw: BTreeMap<String, String>,
    pub reason: String,
    pub suggestions: Vec<Suggestion>,
}

/// A row-level failure: validation or persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// A row skipped because an earlier row already targeted the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub row: usize,
    pub first_row: usize,
    pub key: String,
}

/// An entry whose stock was zeroed by stock sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroedProduct {
    pub id: String,
    pub model_ref: String,
    pub color: String,
    pub old_stock: i64,
}

/// Full, uncapped result of one reconciliation run.
///
/// Dry-run and apply runs produce the same shape; a dry-run report is what
/// the apply run would report against the same starting catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub stats: RunStats,
    pub updated: Vec<UpdatedProduct>,
    pub created: Vec<CreatedProduct>,
    pub not_found: Vec<NotFoundRow>,
    pub errors: Vec<RowError>,
    pub duplicates_in_file: Vec<DuplicateRow>,
    pub zeroed: Vec<ZeroedProduct>,
    pub changes: Vec<ChangeRecord>,
}

/// Audit record of one applied run, with the catalog as it was before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub stats: RunStats,
    pub changes: Vec<ChangeRecord>,
    pub inserted_products: Vec<CreatedProduct>,
    pub zeroed_products: Vec<ZeroedProduct>,
    pub snapshot_before: Vec<CatalogEntry>,
    pub sync_stock_enabled: bool,
    pub feed_digest: String,
    #[serde(default)]
    pub restored_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: "A1".to_string(),
            model_ref: "BG100".to_string(),
            color: "BLACK".to_string(),
            size: None,
            stock_quantity: 5,
            price_retail: 10.0,
            price_wholesale: 4.0,
            product_name: None,
            brand: None,
            image_url: None,
        }
    }

    #[test]
    fn test_synthetic_id_is_not_stable() {
        let mut e = entry();
        assert!(e.has_stable_id());
        e.id = format!("{}1234", SYNTHETIC_ID_PREFIX);
        assert!(!e.has_stable_id());
        e.id = "  ".to_string();
        assert!(!e.has_stable_id());
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut e = entry();
        let patch = EntryPatch {
            stock_quantity: Some(8),
            product_name: Some(Some("Tote".to_string())),
            ..Default::default()
        };
        patch.apply_to(&mut e);
        assert_eq!(e.stock_quantity, 8);
        assert_eq!(e.product_name.as_deref(), Some("Tote"));
        assert_eq!(e.price_retail, 10.0);
        assert_eq!(e.color, "BLACK");
    }

    #[test]
    fn test_replace_with_restores_every_field() {
        let before = entry();
        let mut after = entry();
        after.stock_quantity = 0;
        after.size = Some("M".to_string());
        after.price_retail = 99.0;
        EntryPatch::replace_with(&before).apply_to(&mut after);
        assert_eq!(after, before);
    }

    #[test]
    fn test_numeric_cell_text() {
        assert_eq!(CellValue::Number(8.0).as_text().as_deref(), Some("8"));
        assert_eq!(CellValue::Number(8.5).as_text().as_deref(), Some("8.5"));
        assert_eq!(CellValue::Text("  ".into()).as_text(), None);
        assert_eq!(CellValue::Blank.as_text(), None);
    }

    #[test]
    fn test_cell_value_from_json() {
        let cells: BTreeMap<String, CellValue> =
            serde_json::from_str(r#"{"stock": 3, "color": "RED", "size": null}"#).unwrap();
        assert_eq!(cells["stock"], CellValue::Number(3.0));
        assert_eq!(cells["color"], CellValue::Text("RED".to_string()));
        assert_eq!(cells["size"], CellValue::Blank);
    }
}
