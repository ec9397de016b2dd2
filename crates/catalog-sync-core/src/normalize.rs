//! Feed row normalization.
//!
//! Turns one raw [`FeedRow`] into a typed [`IncomingRecord`]. Column names are
//! resolved through a declarative alias table ([`AliasTable`]): each logical
//! field has an ordered list of accepted column names, compared after folding
//! case, whitespace, `_` and `-`. New feed variants only add table entries.
//!
//! Numeric cells never fail a row. Currency symbols and spaces are stripped,
//! separators are disambiguated (see [`parse_number`]), and anything still
//! unparseable becomes `0`.

use std::collections::HashMap;

use crate::models::{CellValue, FeedRow, IncomingRecord, RowError};

/// Message recorded when a row lacks the fields needed to place it.
pub const MISSING_REQUIRED: &str = "modelRef or color missing";

/// Logical fields of an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Id,
    ModelRef,
    Color,
    Size,
    StockQuantity,
    PriceRetail,
    PriceWholesale,
    ProductName,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Id,
        Field::ModelRef,
        Field::Color,
        Field::Size,
        Field::StockQuantity,
        Field::PriceRetail,
        Field::PriceWholesale,
        Field::ProductName,
    ];

    /// Canonical config key.
    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::ModelRef => "model_ref",
            Field::Color => "color",
            Field::Size => "size",
            Field::StockQuantity => "stock_quantity",
            Field::PriceRetail => "price_retail",
            Field::PriceWholesale => "price_wholesale",
            Field::ProductName => "product_name",
        }
    }

    /// Parse a config key such as `stock_quantity` or `modelRef`.
    pub fn from_key(key: &str) -> Option<Field> {
        match fold_header(key).as_str() {
            "id" => Some(Field::Id),
            "modelref" => Some(Field::ModelRef),
            "color" => Some(Field::Color),
            "size" => Some(Field::Size),
            "stockquantity" => Some(Field::StockQuantity),
            "priceretail" => Some(Field::PriceRetail),
            "pricewholesale" => Some(Field::PriceWholesale),
            "productname" => Some(Field::ProductName),
            _ => None,
        }
    }
}

/// How a numeric cell treats a lone comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// Prices: a lone `,` is the decimal point (`12,50`).
    Decimal,
    /// Quantities: a lone `,` groups thousands (`1,200`).
    Quantity,
}

const DEFAULT_ALIASES: &[(Field, &[&str])] = &[
    (Field::Id, &["id", "sku", "productid", "itemid"]),
    (
        Field::ModelRef,
        &["modelref", "reference", "ref", "model", "modelreference"],
    ),
    (Field::Color, &["color", "colour", "couleur"]),
    (Field::Size, &["size", "taille"]),
    (
        Field::StockQuantity,
        &["stockquantity", "stock", "quantity", "qty", "quantite"],
    ),
    (
        Field::PriceRetail,
        &["priceretail", "price", "retailprice", "prix", "prixvente"],
    ),
    (
        Field::PriceWholesale,
        &["pricewholesale", "wholesale", "wholesaleprice", "prixgros"],
    ),
    (
        Field::ProductName,
        &["productname", "name", "title", "designation"],
    ),
];

/// Ordered column aliases per logical field.
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: Vec<(Field, Vec<String>)>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(field, names)| (*field, names.iter().map(|n| fold_header(n)).collect()))
                .collect(),
        }
    }
}

impl AliasTable {
    /// Append extra accepted column names for `field`, after the built-ins.
    pub fn extend(&mut self, field: Field, names: impl IntoIterator<Item = impl AsRef<str>>) {
        let idx = match self.aliases.iter().position(|(f, _)| *f == field) {
            Some(i) => i,
            None => {
                self.aliases.push((field, Vec::new()));
                self.aliases.len() - 1
            }
        };
        let slot = &mut self.aliases[idx].1;
        for name in names {
            let folded = fold_header(name.as_ref());
            if !folded.is_empty() && !slot.contains(&folded) {
                slot.push(folded);
            }
        }
    }

    pub fn aliases_for(&self, field: Field) -> &[String] {
        self.aliases
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }
}

/// Stateless row normalizer bound to an alias table.
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    aliases: AliasTable,
}

impl RowNormalizer {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// Normalize one row.
    ///
    /// Fails only when `modelRef` cannot be found. A missing `color` is kept
    /// as `None` here: the row can still resolve against existing entries,
    /// and the pipeline rejects it with [`MISSING_REQUIRED`] if it would have
    /// to create a new entry.
    pub fn normalize(&self, row: &FeedRow) -> Result<IncomingRecord, RowError> {
        let folded: HashMap<String, &CellValue> = row
            .cells
            .iter()
            .map(|(k, v)| (fold_header(k), v))
            .collect();

        let lookup = |field: Field| -> Option<&CellValue> {
            self.aliases
                .aliases_for(field)
                .iter()
                .filter_map(|alias| folded.get(alias).copied())
                .find(|cell| cell.as_text().is_some())
        };
        let text = |field: Field| lookup(field).and_then(CellValue::as_text);

        let model_ref = text(Field::ModelRef).ok_or_else(|| RowError {
            row: row.row_number,
            message: MISSING_REQUIRED.to_string(),
        })?;

        Ok(IncomingRecord {
            row_number: row.row_number,
            model_ref,
            color: text(Field::Color),
            id: text(Field::Id),
            size: text(Field::Size),
            stock_quantity: lookup(Field::StockQuantity)
                .map(|c| parse_cell(c, NumericKind::Quantity).round().max(0.0) as i64),
            price_retail: lookup(Field::PriceRetail)
                .map(|c| parse_cell(c, NumericKind::Decimal).max(0.0)),
            price_wholesale: lookup(Field::PriceWholesale)
                .map(|c| parse_cell(c, NumericKind::Decimal).max(0.0)),
            product_name: text(Field::ProductName),
        })
    }
}

/// Fold a column header for alias comparison: lowercase, drop whitespace,
/// `_` and `-`.
pub fn fold_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_cell(cell: &CellValue, kind: NumericKind) -> f64 {
    match cell {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Number(_) | CellValue::Blank => 0.0,
        CellValue::Text(s) => parse_number(s, kind),
    }
}

/// Parse a human-formatted number.
///
/// - Everything but digits, `,`, `.` and a leading `-` is dropped
///   (currency symbols, spaces, NBSP, apostrophes).
/// - When both `,` and `.` appear, the rightmost one is the decimal point.
/// - A lone `,` is decimal for [`NumericKind::Decimal`] (if it appears once)
///   and a thousands separator otherwise. Repeated `.` are thousands too.
/// - Anything still unparseable yields `0.0`.
pub fn parse_number(raw: &str, kind: NumericKind) -> f64 {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('-');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            let (decimal, group) = if c > d { (',', '.') } else { ('.', ',') };
            cleaned
                .chars()
                .filter(|ch| *ch != group)
                .map(|ch| if ch == decimal { '.' } else { ch })
                .collect()
        }
        (Some(_), None) => {
            let commas = cleaned.matches(',').count();
            if kind == NumericKind::Decimal && commas == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    match canonical.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FeedRow {
        FeedRow::new(2)
    }

    #[test]
    fn test_rightmost_separator_is_decimal() {
        assert_eq!(parse_number("1.234,56", NumericKind::Decimal), 1234.56);
        assert_eq!(parse_number("1,234.56", NumericKind::Decimal), 1234.56);
        assert_eq!(parse_number("1,234.56", NumericKind::Quantity), 1234.56);
    }

    #[test]
    fn test_lone_comma_depends_on_kind() {
        assert_eq!(parse_number("12,50", NumericKind::Decimal), 12.5);
        assert_eq!(parse_number("1,200", NumericKind::Quantity), 1200.0);
        assert_eq!(parse_number("1,200,300", NumericKind::Decimal), 1_200_300.0);
    }

    #[test]
    fn test_currency_and_whitespace_stripped() {
        assert_eq!(parse_number(" € 49,90 ", NumericKind::Decimal), 49.9);
        assert_eq!(parse_number("$1,299.00", NumericKind::Decimal), 1299.0);
        assert_eq!(parse_number("12\u{a0}000", NumericKind::Quantity), 12000.0);
        assert_eq!(parse_number("-3", NumericKind::Quantity), -3.0);
    }

    #[test]
    fn test_garbage_defaults_to_zero() {
        assert_eq!(parse_number("n/a", NumericKind::Quantity), 0.0);
        assert_eq!(parse_number("", NumericKind::Decimal), 0.0);
        assert_eq!(parse_number("..", NumericKind::Decimal), 0.0);
    }

    #[test]
    fn test_aliases_are_case_insensitive() {
        let r = row()
            .cell("Reference", "bg100")
            .cell("COLOUR", "Red")
            .cell("Stock", "8")
            .cell("Prix", "12,50");
        let rec = RowNormalizer::default().normalize(&r).unwrap();
        assert_eq!(rec.model_ref, "bg100");
        assert_eq!(rec.color.as_deref(), Some("Red"));
        assert_eq!(rec.stock_quantity, Some(8));
        assert_eq!(rec.price_retail, Some(12.5));
        assert_eq!(rec.row_number, 2);
    }

    #[test]
    fn test_first_non_blank_alias_wins() {
        let r = row()
            .cell("modelRef", "")
            .cell("reference", "BG7")
            .cell("color", "BLUE");
        let rec = RowNormalizer::default().normalize(&r).unwrap();
        assert_eq!(rec.model_ref, "BG7");
    }

    #[test]
    fn test_missing_model_ref_is_row_error() {
        let r = row().cell("color", "RED").cell("stock", 3i64);
        let err = RowNormalizer::default().normalize(&r).unwrap_err();
        assert_eq!(err.row, 2);
        assert_eq!(err.message, MISSING_REQUIRED);
    }

    #[test]
    fn test_missing_color_is_kept_for_resolution() {
        let r = row().cell("modelRef", "BG999");
        let rec = RowNormalizer::default().normalize(&r).unwrap();
        assert_eq!(rec.color, None);
    }

    #[test]
    fn test_blank_numeric_is_absent_but_garbage_is_zero() {
        let r = row()
            .cell("modelRef", "BG1")
            .cell("color", "RED")
            .cell("stock", "")
            .cell("price", "call us");
        let rec = RowNormalizer::default().normalize(&r).unwrap();
        assert_eq!(rec.stock_quantity, None);
        assert_eq!(rec.price_retail, Some(0.0));
    }

    #[test]
    fn test_negative_quantities_clamped() {
        let r = row()
            .cell("modelRef", "BG1")
            .cell("color", "RED")
            .cell("qty", "-4")
            .cell("wholesale", "-1");
        let rec = RowNormalizer::default().normalize(&r).unwrap();
        assert_eq!(rec.stock_quantity, Some(0));
        assert_eq!(rec.price_wholesale, Some(0.0));
    }

    #[test]
    fn test_extra_aliases_extend_table() {
        let mut table = AliasTable::default();
        table.extend(Field::StockQuantity, ["On Hand"]);
        let r = row()
            .cell("modelRef", "BG1")
            .cell("color", "RED")
            .cell("on_hand", 12i64);
        let rec = RowNormalizer::new(table).normalize(&r).unwrap();
        assert_eq!(rec.stock_quantity, Some(12));
    }

    #[test]
    fn test_field_from_config_key() {
        assert_eq!(Field::from_key("stock_quantity"), Some(Field::StockQuantity));
        assert_eq!(Field::from_key("modelRef"), Some(Field::ModelRef));
        assert_eq!(Field::from_key("weight"), None);
    }
}
