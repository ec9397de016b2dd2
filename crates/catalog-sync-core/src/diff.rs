//! Field-level comparison between an incoming record and its matched entry.
//!
//! Only fields present in the record are compared, so a partial feed never
//! erases catalog data.

use crate::models::{CatalogEntry, ChangeRecord, EntryPatch, FieldValue, IncomingRecord};

/// Prices closer than this are equal.
pub const PRICE_EPSILON: f64 = 0.01;

pub const FIELD_STOCK: &str = "stock";
pub const FIELD_PRICE_RETAIL: &str = "price_retail";
pub const FIELD_PRICE_WHOLESALE: &str = "price_wholesale";
pub const FIELD_PRODUCT_NAME: &str = "product_name";

/// Changes for one matched row, with the patch that applies them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDiff {
    pub changes: Vec<ChangeRecord>,
    pub patch: EntryPatch,
}

impl EntryDiff {
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compare `record` against `entry`. The returned changes are in a fixed
/// field order: stock, retail price, wholesale price, product name.
pub fn diff_entry(record: &IncomingRecord, entry: &CatalogEntry) -> EntryDiff {
    let mut diff = EntryDiff::default();
    let mut push = |field: &str, old_value: FieldValue, new_value: FieldValue| {
        diff.changes.push(ChangeRecord {
            model_ref: entry.model_ref.clone(),
            color: entry.color.clone(),
            field: field.to_string(),
            old_value,
            new_value,
        });
    };

    let mut patch = EntryPatch::default();

    if let Some(stock) = record.stock_quantity {
        if stock != entry.stock_quantity {
            push(
                FIELD_STOCK,
                FieldValue::Int(entry.stock_quantity),
                FieldValue::Int(stock),
            );
            patch.stock_quantity = Some(stock);
        }
    }

    if let Some(price) = record.price_retail {
        if (price - entry.price_retail).abs() > PRICE_EPSILON {
            push(
                FIELD_PRICE_RETAIL,
                FieldValue::Decimal(entry.price_retail),
                FieldValue::Decimal(price),
            );
            patch.price_retail = Some(price);
        }
    }

    if let Some(price) = record.price_wholesale {
        if (price - entry.price_wholesale).abs() > PRICE_EPSILON {
            push(
                FIELD_PRICE_WHOLESALE,
                FieldValue::Decimal(entry.price_wholesale),
                FieldValue::Decimal(price),
            );
            patch.price_wholesale = Some(price);
        }
    }

    if let Some(name) = record.product_name.as_deref().map(str::trim) {
        let current = entry.product_name.as_deref().map(str::trim);
        if !name.is_empty() && current != Some(name) {
            push(
                FIELD_PRODUCT_NAME,
                FieldValue::Text(entry.product_name.clone()),
                FieldValue::Text(Some(name.to_string())),
            );
            patch.product_name = Some(Some(name.to_string()));
        }
    }

    diff.patch = patch;
    diff
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
            price_retail: 49.90,
            price_wholesale: 20.0,
            product_name: Some("Tote bag".to_string()),
            brand: None,
            image_url: None,
        }
    }

    fn record() -> IncomingRecord {
        IncomingRecord {
            row_number: 2,
            model_ref: "BG100".to_string(),
            color: Some("BLACK".to_string()),
            id: None,
            size: None,
            stock_quantity: None,
            price_retail: None,
            price_wholesale: None,
            product_name: None,
        }
    }

    #[test]
    fn test_stock_change_recorded() {
        let mut r = record();
        r.stock_quantity = Some(8);
        let d = diff_entry(&r, &entry());
        assert_eq!(d.changes.len(), 1);
        assert_eq!(d.changes[0].field, "stock");
        assert_eq!(d.changes[0].old_value, FieldValue::Int(5));
        assert_eq!(d.changes[0].new_value, FieldValue::Int(8));
        assert_eq!(d.patch.stock_quantity, Some(8));
    }

    #[test]
    fn test_absent_fields_never_compared() {
        let d = diff_entry(&record(), &entry());
        assert!(d.is_unchanged());
        assert!(d.patch.is_empty());
    }

    #[test]
    fn test_price_within_epsilon_is_unchanged() {
        let mut r = record();
        r.price_retail = Some(49.905);
        r.price_wholesale = Some(20.03);
        let d = diff_entry(&r, &entry());
        assert_eq!(d.changes.len(), 1);
        assert_eq!(d.changes[0].field, FIELD_PRICE_WHOLESALE);
    }

    #[test]
    fn test_product_name_trimmed_compare() {
        let mut r = record();
        r.product_name = Some("  Tote bag ".to_string());
        assert!(diff_entry(&r, &entry()).is_unchanged());

        r.product_name = Some("Tote bag XL".to_string());
        let d = diff_entry(&r, &entry());
        assert_eq!(d.changes[0].field, FIELD_PRODUCT_NAME);
        assert_eq!(d.patch.product_name, Some(Some("Tote bag XL".to_string())));
    }

    #[test]
    fn test_change_order_is_fixed() {
        let r = IncomingRecord {
            stock_quantity: Some(1),
            price_retail: Some(1.0),
            price_wholesale: Some(1.0),
            product_name: Some("X".to_string()),
            ..record()
        };
        let fields: Vec<String> = diff_entry(&r, &entry())
            .changes
            .into_iter()
            .map(|c| c.field)
            .collect();
        assert_eq!(
            fields,
            vec![FIELD_STOCK, FIELD_PRICE_RETAIL, FIELD_PRICE_WHOLESALE, FIELD_PRODUCT_NAME]
        );
    }
}
