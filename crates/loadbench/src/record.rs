//! Product rows as read from the file and as bound to the insert statement

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};

/// Target table columns, in file order
pub const PRODUCT_COLUMNS: [&str; 13] = [
    "Id",
    "Name",
    "Description",
    "Brand",
    "Category",
    "Price",
    "Currency",
    "Stock",
    "EAN",
    "Color",
    "Size",
    "Availability",
    "InternalID",
];

/// Number of fields a well-formed row carries
pub const FIELD_COUNT: usize = PRODUCT_COLUMNS.len();

pub const PRICE_INDEX: usize = 5;
pub const STOCK_INDEX: usize = 7;

/// One data row, fields exactly as they appear in the file
///
/// Arity is not checked here; short or long rows are carried through and
/// dealt with when the row is typed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord(Vec<String>);

impl RawRecord {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field at `index`, or `""` when the row is too short
    pub fn field(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }
}

impl From<Vec<String>> for RawRecord {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl<const N: usize> From<[&str; N]> for RawRecord {
    fn from(fields: [&str; N]) -> Self {
        Self(fields.iter().map(|f| f.to_string()).collect())
    }
}

/// How numeric fields that fail to parse are handled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Substitute zero and keep the row
    #[default]
    Permissive,
    /// Fail the batch and abort the run
    Strict,
}

impl std::str::FromStr for ParseMode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "permissive" | "lenient" => Ok(ParseMode::Permissive),
            "strict" => Ok(ParseMode::Strict),
            _ => Err(LoadError::Config(format!("Invalid parse mode: {s}"))),
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Permissive => write!(f, "permissive"),
            ParseMode::Strict => write!(f, "strict"),
        }
    }
}

/// A row ready to bind: text fields borrowed from the raw row, numerics parsed
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord<'a> {
    raw: &'a RawRecord,
    pub price: f64,
    pub stock: i64,
}

impl<'a> TypedRecord<'a> {
    /// Type `raw`; `row` is its 1-based position in the file, for error reports
    pub fn parse(raw: &'a RawRecord, row: usize, mode: ParseMode) -> Result<Self> {
        let price = match parse_price(raw.field(PRICE_INDEX)) {
            Some(price) => price,
            None => numeric_fallback(raw, row, PRICE_INDEX, mode)?,
        };

        let stock = match parse_stock(raw.field(STOCK_INDEX)) {
            Some(stock) => stock,
            None => numeric_fallback(raw, row, STOCK_INDEX, mode)?,
        };

        Ok(Self { raw, price, stock })
    }

    /// Text value of a non-numeric column, `""` when the row is short
    pub fn text(&self, index: usize) -> &'a str {
        self.raw.field(index)
    }
}

/// Value bound for one column of a typed row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue<'a> {
    Text(&'a str),
    Float(f64),
    Int(i64),
}

impl<'a> TypedRecord<'a> {
    /// Column values in `PRODUCT_COLUMNS` order
    pub fn values(&self) -> impl Iterator<Item = ColumnValue<'a>> + '_ {
        (0..FIELD_COUNT).map(move |index| match index {
            PRICE_INDEX => ColumnValue::Float(self.price),
            STOCK_INDEX => ColumnValue::Int(self.stock),
            _ => ColumnValue::Text(self.text(index)),
        })
    }
}

fn parse_price(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
}

fn parse_stock(value: &str) -> Option<i64> {
    value.trim().parse::<u32>().ok().map(i64::from)
}

fn numeric_fallback<T: Default>(
    raw: &RawRecord,
    row: usize,
    index: usize,
    mode: ParseMode,
) -> Result<T> {
    match mode {
        ParseMode::Permissive => Ok(T::default()),
        ParseMode::Strict => Err(LoadError::Parse {
            row,
            column: PRODUCT_COLUMNS[index],
            value: raw.field(index).to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn product(price: &str, stock: &str) -> RawRecord {
        RawRecord::from([
            "1",
            "Desk Lamp",
            "Brushed steel lamp",
            "Lumen",
            "Lighting",
            price,
            "EUR",
            stock,
            "4006381333931",
            "Silver",
            "M",
            "in_stock",
            "INT-0001",
        ])
    }

    #[test]
    fn test_parses_numeric_fields() {
        let raw = product("19.99", "42");
        let typed = TypedRecord::parse(&raw, 1, ParseMode::Strict).unwrap();

        assert_eq!(typed.price, 19.99);
        assert_eq!(typed.stock, 42);
        assert_eq!(typed.text(1), "Desk Lamp");
    }

    #[test]
    fn test_permissive_defaults_to_zero() {
        let raw = product("about ten", "-");
        let typed = TypedRecord::parse(&raw, 7, ParseMode::Permissive).unwrap();

        assert_eq!(typed.price, 0.0);
        assert_eq!(typed.stock, 0);
        assert_eq!(typed.text(6), "EUR");
    }

    #[test]
    fn test_non_finite_price_is_rejected() {
        let raw = product("NaN", "3");
        let typed = TypedRecord::parse(&raw, 1, ParseMode::Permissive).unwrap();
        assert_eq!(typed.price, 0.0);

        assert!(TypedRecord::parse(&raw, 1, ParseMode::Strict).is_err());
    }

    #[test]
    fn test_strict_reports_row_and_column() {
        let raw = product("12.00", "plenty");
        let err = TypedRecord::parse(&raw, 12, ParseMode::Strict).unwrap_err();

        match err {
            LoadError::Parse { row, column, value } => {
                assert_eq!(row, 12);
                assert_eq!(column, "Stock");
                assert_eq!(value, "plenty");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_row_binds_empty_text() {
        let raw = RawRecord::from(["9", "Chair"]);
        let typed = TypedRecord::parse(&raw, 1, ParseMode::Permissive).unwrap();
        let values: Vec<_> = typed.values().collect();

        assert_eq!(values.len(), FIELD_COUNT);
        assert_eq!(values[0], ColumnValue::Text("9"));
        assert_eq!(values[PRICE_INDEX], ColumnValue::Float(0.0));
        assert_eq!(values[STOCK_INDEX], ColumnValue::Int(0));
        assert_eq!(values[12], ColumnValue::Text(""));
    }

    #[test]
    fn test_parse_mode_from_str() {
        assert_eq!("STRICT".parse::<ParseMode>().unwrap(), ParseMode::Strict);
        assert_eq!("lenient".parse::<ParseMode>().unwrap(), ParseMode::Permissive);
        assert!("sloppy".parse::<ParseMode>().is_err());
    }
}
