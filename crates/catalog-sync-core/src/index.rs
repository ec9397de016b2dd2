//! Lookup structures over a catalog snapshot.
//!
//! Built once per run and read-only afterwards. Every map stores *all*
//! positions sharing a key so the resolver can tell a unique hit from an
//! ambiguous one. Keys are trimmed and case-folded.

use std::collections::HashMap;

use crate::models::CatalogEntry;

/// Trim and case-fold one key component.
pub fn norm_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Join normalized components with `|`.
pub fn composite_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| norm_key(p))
        .collect::<Vec<_>>()
        .join("|")
}

/// Index over a borrowed catalog snapshot.
pub struct CatalogIndex<'a> {
    entries: &'a [CatalogEntry],
    by_id: HashMap<String, Vec<usize>>,
    by_id_model_color: HashMap<String, Vec<usize>>,
    by_model_color: HashMap<String, Vec<usize>>,
    by_model: HashMap<String, Vec<usize>>,
}

impl<'a> CatalogIndex<'a> {
    pub fn build(entries: &'a [CatalogEntry]) -> Self {
        let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id_model_color: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_model_color: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_model: HashMap<String, Vec<usize>> = HashMap::new();

        for (pos, entry) in entries.iter().enumerate() {
            if !entry.id.trim().is_empty() {
                by_id.entry(norm_key(&entry.id)).or_default().push(pos);
                by_id_model_color
                    .entry(composite_key(&[
                        entry.id.as_str(),
                        entry.model_ref.as_str(),
                        entry.color.as_str(),
                    ]))
                    .or_default()
                    .push(pos);
            }
            by_model_color
                .entry(composite_key(&[entry.model_ref.as_str(), entry.color.as_str()]))
                .or_default()
                .push(pos);
            by_model
                .entry(norm_key(&entry.model_ref))
                .or_default()
                .push(pos);
        }

        Self {
            entries,
            by_id,
            by_id_model_color,
            by_model_color,
            by_model,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &'a [CatalogEntry] {
        self.entries
    }

    fn collect(&self, map: &HashMap<String, Vec<usize>>, key: &str) -> Vec<&'a CatalogEntry> {
        let entries = self.entries;
        map.get(key)
            .map(|positions| positions.iter().map(|&p| &entries[p]).collect())
            .unwrap_or_default()
    }

    pub fn by_id(&self, id: &str) -> Vec<&'a CatalogEntry> {
        self.collect(&self.by_id, &norm_key(id))
    }

    pub fn by_id_model_color(&self, id: &str, model_ref: &str, color: &str) -> Vec<&'a CatalogEntry> {
        self.collect(
            &self.by_id_model_color,
            &composite_key(&[id, model_ref, color]),
        )
    }

    pub fn by_model_color(&self, model_ref: &str, color: &str) -> Vec<&'a CatalogEntry> {
        self.collect(&self.by_model_color, &composite_key(&[model_ref, color]))
    }

    /// Entries sharing `modelRef + color` whose size equals `size`. An absent
    /// size only matches entries without one.
    pub fn by_model_color_size(
        &self,
        model_ref: &str,
        color: &str,
        size: Option<&str>,
    ) -> Vec<&'a CatalogEntry> {
        let wanted = size.map(norm_key);
        self.by_model_color(model_ref, color)
            .into_iter()
            .filter(|e| e.size.as_deref().map(norm_key) == wanted)
            .collect()
    }

    pub fn by_model(&self, model_ref: &str) -> Vec<&'a CatalogEntry> {
        self.collect(&self.by_model, &norm_key(model_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, model: &str, color: &str, size: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            model_ref: model.to_string(),
            color: color.to_string(),
            size: size.map(str::to_string),
            stock_quantity: 1,
            price_retail: 0.0,
            price_wholesale: 0.0,
            product_name: None,
            brand: None,
            image_url: None,
        }
    }

    #[test]
    fn test_keys_are_trimmed_and_case_folded() {
        let catalog = vec![entry("A1", " BG100 ", "Black", None)];
        let idx = CatalogIndex::build(&catalog);
        assert_eq!(idx.by_model_color("bg100", "BLACK ").len(), 1);
        assert_eq!(idx.by_id("a1").len(), 1);
        assert_eq!(idx.by_id_model_color("A1", "bg100", "black").len(), 1);
    }

    #[test]
    fn test_shared_keys_keep_every_entry() {
        let catalog = vec![
            entry("A1", "BG999", "BLACK", None),
            entry("A2", "BG999", "WHITE", None),
            entry("A3", "BG999", "WHITE", Some("L")),
        ];
        let idx = CatalogIndex::build(&catalog);
        assert_eq!(idx.by_model("BG999").len(), 3);
        assert_eq!(idx.by_model_color("BG999", "WHITE").len(), 2);
        assert_eq!(idx.by_model_color_size("BG999", "WHITE", Some("l")).len(), 1);
        let no_size_white = idx.by_model_color_size("BG999", "WHITE", None);
        assert_eq!(no_size_white.len(), 1);
        assert_eq!(no_size_white[0].id, "A2");
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn test_unknown_key_is_empty() {
        let catalog = vec![entry("A1", "BG100", "BLACK", None)];
        let idx = CatalogIndex::build(&catalog);
        assert!(idx.by_model("BG200").is_empty());
        assert!(idx.by_id("Z9").is_empty());
    }
}
