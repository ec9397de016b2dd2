//! Tiered key resolution.
//!
//! A record is resolved against a [`CatalogIndex`] by trying tiers in strict
//! order and stopping at the first one that yields exactly one entry:
//!
//! | Tier | Key | Confidence |
//! |------|-----|------------|
//! | [`MatchTier::IdModelColor`] | `id + modelRef + color` | 100 |
//! | [`MatchTier::Id`] | `id` | 100 |
//! | [`MatchTier::ModelColorSize`] | `modelRef + color + size` | 95 |
//! | [`MatchTier::ModelColor`] | `modelRef + color` | 85 |
//! | [`MatchTier::Model`] | `modelRef` | 70 |
//!
//! Tiers whose key fields are absent from the record are skipped, except
//! size: a record without one matches entries without one. A tier that
//! matches several entries does not resolve; if no later tier resolves
//! either, the record is ambiguous and carries the candidates of the first
//! (narrowest) tier that matched more than one. A record no tier matched at
//! all is new.

use serde::Serialize;

use crate::index::CatalogIndex;
use crate::models::{CatalogEntry, IncomingRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    IdModelColor,
    Id,
    ModelColorSize,
    ModelColor,
    Model,
    /// No tier produced a candidate.
    None,
}

impl MatchTier {
    pub fn confidence(self) -> u8 {
        match self {
            MatchTier::IdModelColor | MatchTier::Id => 100,
            MatchTier::ModelColorSize => 95,
            MatchTier::ModelColor => 85,
            MatchTier::Model => 70,
            MatchTier::None => 0,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            MatchTier::IdModelColor => "id + modelRef + color",
            MatchTier::Id => "id",
            MatchTier::ModelColorSize => "modelRef + color + size",
            MatchTier::ModelColor => "modelRef + color",
            MatchTier::Model => "modelRef",
            MatchTier::None => "no match",
        }
    }
}

/// Outcome of resolving one record.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    /// Tier that resolved, or that produced the ambiguity.
    pub tier: MatchTier,
    pub confidence: u8,
    pub entry: Option<&'a CatalogEntry>,
    pub ambiguous_candidates: Vec<&'a CatalogEntry>,
}

impl<'a> MatchResult<'a> {
    fn matched(tier: MatchTier, entry: &'a CatalogEntry) -> Self {
        Self {
            tier,
            confidence: tier.confidence(),
            entry: Some(entry),
            ambiguous_candidates: Vec::new(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.entry.is_none() && !self.ambiguous_candidates.is_empty()
    }

    pub fn is_new(&self) -> bool {
        self.entry.is_none() && self.ambiguous_candidates.is_empty()
    }
}

/// Resolves records against an index. Holds no state of its own.
pub struct KeyResolver<'i, 'a> {
    index: &'i CatalogIndex<'a>,
}

impl<'i, 'a> KeyResolver<'i, 'a> {
    pub fn new(index: &'i CatalogIndex<'a>) -> Self {
        Self { index }
    }

    pub fn resolve(&self, record: &IncomingRecord) -> MatchResult<'a> {
        let model = record.model_ref.as_str();
        let color = record.color.as_deref();
        let id = record.id.as_deref();

        let tiers: [(MatchTier, Option<Vec<&'a CatalogEntry>>); 5] = [
            (
                MatchTier::IdModelColor,
                id.zip(color)
                    .map(|(id, color)| self.index.by_id_model_color(id, model, color)),
            ),
            (MatchTier::Id, id.map(|id| self.index.by_id(id))),
            (
                MatchTier::ModelColorSize,
                color.map(|color| {
                    self.index
                        .by_model_color_size(model, color, record.size.as_deref())
                }),
            ),
            (
                MatchTier::ModelColor,
                color.map(|color| self.index.by_model_color(model, color)),
            ),
            (MatchTier::Model, Some(self.index.by_model(model))),
        ];

        let mut ambiguous: Option<(MatchTier, Vec<&'a CatalogEntry>)> = None;
        for (tier, candidates) in tiers {
            let Some(candidates) = candidates else {
                continue;
            };
            match candidates.len() {
                0 => {}
                1 => return MatchResult::matched(tier, candidates[0]),
                _ => {
                    if ambiguous.is_none() {
                        ambiguous = Some((tier, candidates));
                    }
                }
            }
        }

        match ambiguous {
            Some((tier, candidates)) => MatchResult {
                tier,
                confidence: 0,
                entry: None,
                ambiguous_candidates: candidates,
            },
            None => MatchResult {
                tier: MatchTier::None,
                confidence: 0,
                entry: None,
                ambiguous_candidates: Vec::new(),
            },
        }
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

    fn record(id: Option<&str>, model: &str, color: Option<&str>, size: Option<&str>) -> IncomingRecord {
        IncomingRecord {
            row_number: 2,
            model_ref: model.to_string(),
            color: color.map(str::to_string),
            id: id.map(str::to_string),
            size: size.map(str::to_string),
            stock_quantity: None,
            price_retail: None,
            price_wholesale: None,
            product_name: None,
        }
    }

    #[test]
    fn test_id_wins_over_model_color_ambiguity() {
        let catalog = vec![
            entry("A1", "BG100", "BLACK", None),
            entry("A2", "BG100", "BLACK", None),
        ];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(Some("A2"), "BG100", Some("BLACK"), None));
        assert_eq!(r.tier, MatchTier::IdModelColor);
        assert_eq!(r.confidence, 100);
        assert_eq!(r.entry.unwrap().id, "A2");
    }

    #[test]
    fn test_id_alone_when_model_differs() {
        let catalog = vec![entry("A1", "BG100", "BLACK", None)];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(Some("a1"), "BG-OLD", Some("RED"), None));
        assert_eq!(r.tier, MatchTier::Id);
        assert_eq!(r.entry.unwrap().id, "A1");
    }

    #[test]
    fn test_size_disambiguates_model_color() {
        let catalog = vec![
            entry("A1", "BG100", "BLACK", Some("S")),
            entry("A2", "BG100", "BLACK", Some("M")),
        ];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG100", Some("black"), Some("m")));
        assert_eq!(r.tier, MatchTier::ModelColorSize);
        assert_eq!(r.confidence, 95);
        assert_eq!(r.entry.unwrap().id, "A2");
    }

    #[test]
    fn test_unique_model_color() {
        let catalog = vec![
            entry("A1", "BG100", "BLACK", Some("S")),
            entry("A2", "BG100", "WHITE", Some("S")),
        ];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG100", Some("WHITE"), None));
        assert_eq!(r.tier, MatchTier::ModelColor);
        assert_eq!(r.confidence, 85);
        assert_eq!(r.entry.unwrap().id, "A2");
    }

    #[test]
    fn test_missing_size_matches_unsized_entry() {
        let catalog = vec![
            entry("A1", "BG100", "RED", Some("M")),
            entry("A2", "BG100", "RED", None),
        ];
        let idx = CatalogIndex::build(&catalog);
        let resolver = KeyResolver::new(&idx);

        let r = resolver.resolve(&record(None, "BG100", Some("red"), None));
        assert_eq!(r.tier, MatchTier::ModelColorSize);
        assert_eq!(r.entry.unwrap().id, "A2");

        let r = resolver.resolve(&record(None, "BG100", Some("RED"), Some("M")));
        assert_eq!(r.entry.unwrap().id, "A1");
    }

    #[test]
    fn test_model_only_unique() {
        let catalog = vec![entry("A1", "BG100", "BLACK", None)];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG100", None, None));
        assert_eq!(r.tier, MatchTier::Model);
        assert_eq!(r.confidence, 70);
    }

    #[test]
    fn test_model_only_ambiguous_reports_all_candidates() {
        let catalog = vec![
            entry("A1", "BG999", "BLACK", None),
            entry("A2", "BG999", "WHITE", None),
        ];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG999", None, None));
        assert!(r.is_ambiguous());
        assert_eq!(r.tier, MatchTier::Model);
        assert_eq!(r.ambiguous_candidates.len(), 2);
    }

    #[test]
    fn test_ambiguity_surfaces_at_narrowest_tier() {
        let catalog = vec![
            entry("A1", "BG100", "BLACK", Some("S")),
            entry("A2", "BG100", "BLACK", Some("S")),
            entry("A3", "BG100", "WHITE", Some("S")),
        ];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG100", Some("BLACK"), None));
        assert!(r.is_ambiguous());
        assert_eq!(r.tier, MatchTier::ModelColor);
        let ids: Vec<&str> = r.ambiguous_candidates.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"]);
    }

    #[test]
    fn test_no_candidate_is_new_not_ambiguous() {
        let catalog = vec![entry("A1", "BG100", "BLACK", None)];
        let idx = CatalogIndex::build(&catalog);
        let r = KeyResolver::new(&idx).resolve(&record(None, "BG200", Some("RED"), None));
        assert!(r.is_new());
        assert!(!r.is_ambiguous());
        assert_eq!(r.tier, MatchTier::None);
    }
}
