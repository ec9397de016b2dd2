//! Absence-driven stock zeroing.
//!
//! When a feed is the complete list of what is on offer, an entry it never
//! referenced has its stock set to zero. Entries are never deleted, and an
//! entry already at zero is neither touched nor reported.

use std::collections::HashSet;

use crate::models::{CatalogEntry, ChangeRecord, FieldValue, ZeroedProduct};

/// Field label for changes produced by this pass.
pub const FIELD_STOCK_SYNC: &str = "stock (sync)";

/// Entries absent from `seen` that still hold stock, in catalog order.
pub fn entries_to_zero<'a>(catalog: &'a [CatalogEntry], seen: &HashSet<String>) -> Vec<&'a CatalogEntry> {
    catalog
        .iter()
        .filter(|e| e.stock_quantity > 0 && !seen.contains(&e.id))
        .collect()
}

pub fn zeroed_product(entry: &CatalogEntry) -> ZeroedProduct {
    ZeroedProduct {
        id: entry.id.clone(),
        model_ref: entry.model_ref.clone(),
        color: entry.color.clone(),
        old_stock: entry.stock_quantity,
    }
}

pub fn zero_change(entry: &CatalogEntry) -> ChangeRecord {
    ChangeRecord {
        model_ref: entry.model_ref.clone(),
        color: entry.color.clone(),
        field: FIELD_STOCK_SYNC.to_string(),
        old_value: FieldValue::Int(entry.stock_quantity),
        new_value: FieldValue::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, stock: i64) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            model_ref: format!("M-{}", id),
            color: "RED".to_string(),
            size: None,
            stock_quantity: stock,
            price_retail: 0.0,
            price_wholesale: 0.0,
            product_name: None,
            brand: None,
            image_url: None,
        }
    }

    #[test]
    fn test_only_unseen_stocked_entries_zeroed() {
        let catalog = vec![entry("C1", 4), entry("C2", 3), entry("C3", 0)];
        let seen: HashSet<String> = ["C1".to_string()].into_iter().collect();
        let ids: Vec<&str> = entries_to_zero(&catalog, &seen)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["C2"]);
    }

    #[test]
    fn test_zero_change_shape() {
        let c = zero_change(&entry("C2", 3));
        assert_eq!(c.field, FIELD_STOCK_SYNC);
        assert_eq!(c.old_value, FieldValue::Int(3));
        assert_eq!(c.new_value, FieldValue::Int(0));
        assert_eq!(zeroed_product(&entry("C2", 3)).old_stock, 3);
    }
}
