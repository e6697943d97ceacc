//! Core table types for representing digitized lab data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A digitized table: ordered headers plus ordered rows.
///
/// Headers double as the storage key of every row, so a header is not a
/// stable column identity. Rows are identified by position only.
///
/// A `Table` has no mutators of its own. Every change goes through
/// [`crate::edit`], which returns a new `Table` and leaves the old one alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column labels, in display order
    #[serde(default)]
    pub headers: Vec<String>,
    /// Row data, in display order
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table (no headers, no rows)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from headers and rows produced elsewhere
    pub fn from_parts(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has neither headers nor rows
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Read a cell; `None` when the row does not exist or holds no value
    pub fn cell(&self, row: usize, header: &str) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(header))
    }

    /// Read a cell as display text, missing entries render as ""
    pub fn cell_text(&self, row: usize, header: &str) -> String {
        self.cell(row, header)
            .map(CellValue::to_string_value)
            .unwrap_or_default()
    }

    /// Keys of a row that are addressable through the current headers
    pub fn reachable_keys<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a str> + 'a {
        row.keys().filter(move |k| self.headers.iter().any(|h| h == k))
    }
}

/// One record of the table, keyed by header text.
///
/// A row may hold keys that no current header points at (left behind by a
/// column removal) and may lack keys for current headers (read as empty).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, CellValue>,
}

impl Row {
    /// Create a row with no entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell value by header
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }

    /// Get a cell as a finite number, if it parses as one
    pub fn number(&self, header: &str) -> Option<f64> {
        self.get(header).and_then(CellValue::as_number)
    }

    /// All keys stored in this row, reachable or not
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the row stores nothing
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn insert(&mut self, header: impl Into<String>, value: CellValue) {
        self.cells.insert(header.into(), value);
    }

    pub(crate) fn remove(&mut self, header: &str) -> Option<CellValue> {
        self.cells.remove(header)
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A cell value as delivered by the digitizer or typed by the user.
///
/// Serialized untagged: numbers as JSON numbers, text as JSON strings,
/// `Empty` as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric value
    Number(f64),
    /// Free text, including numbers typed by the user
    Text(String),
    /// Explicitly blank cell
    Empty,
}

impl CellValue {
    /// Wrap a string as a text cell
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Interpret the cell as a finite number.
    ///
    /// Text is read by [`parse_number`], so a leading number followed by a
    /// unit (`"3.2V"`) counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Text(s) => parse_number(s),
            CellValue::Empty => None,
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Empty => Ok(()),
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

/// Parse the decimal number at the start of `s`.
///
/// Leading whitespace is skipped, then the longest prefix of the form
/// `[+-]digits[.digits][(e|E)[+-]digits]` is read; whatever follows is
/// ignored. An exponent without digits is not part of the number (`"1e"`
/// reads as 1). Returns `None` when no digits lead the text or the value is
/// not finite.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_from(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits_from(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a number the way a browser prints it: shortest round-trip digits,
/// `-0` as `0`, and exponent form (`1e+21`, `1.5e-7`) outside
/// `[1e-6, 1e21)`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }

    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

/// What a digitizer hands back: a table guess plus text it could not place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigitizationResult {
    /// The recognised table
    pub table: Table,
    /// Free-text notes found outside the table
    #[serde(rename = "rawText", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_parts(
            vec!["Time (s)".to_string(), "Voltage (V)".to_string()],
            vec![
                [("Time (s)", CellValue::text("2")), ("Voltage (V)", CellValue::Number(5.0))]
                    .into_iter()
                    .collect(),
                [("Time (s)", CellValue::text("1")), ("stale", CellValue::text("x"))]
                    .into_iter()
                    .collect(),
            ],
        )
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" -2.5 "), Some(-2.5));
        assert_eq!(parse_number("12.5e-3"), Some(0.0125));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("1e999"), None);
    }

    #[test]
    fn test_parse_number_reads_leading_number() {
        assert_eq!(parse_number("3.2V"), Some(3.2));
        assert_eq!(parse_number("1 s"), Some(1.0));
        assert_eq!(parse_number("12abc"), Some(12.0));
        assert_eq!(parse_number("1e"), Some(1.0));
        assert_eq!(parse_number("2e+x"), Some(2.0));
        assert_eq!(parse_number("-.5e2mA"), Some(-50.0));
        assert_eq!(parse_number("5."), Some(5.0));
        assert_eq!(parse_number("1.2.3"), Some(1.2));
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("e5"), None);
        assert_eq!(parse_number("V3"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-1.5e300), "-1.5e+300");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(3.0).as_number(), Some(3.0));
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
        assert_eq!(CellValue::text("3.14").as_number(), Some(3.14));
        assert_eq!(CellValue::text("n/a").as_number(), None);
        assert_eq!(CellValue::text("4.1V").as_number(), Some(4.1));
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(3.0).to_string_value(), "3");
        assert_eq!(CellValue::Number(0.25).to_string_value(), "0.25");
        assert_eq!(CellValue::Number(1e21).to_string_value(), "1e+21");
        assert_eq!(CellValue::Number(-0.0).to_string_value(), "0");
        assert_eq!(CellValue::text("abc").to_string_value(), "abc");
        assert_eq!(CellValue::Empty.to_string_value(), "");
    }

    #[test]
    fn test_cell_value_json_shape() {
        let row: Row = [
            ("a", CellValue::Number(1.5)),
            ("b", CellValue::text("x")),
            ("c", CellValue::Empty),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"a":1.5,"b":"x","c":null}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_missing_cells_read_empty() {
        let table = sample();
        assert_eq!(table.cell_text(1, "Voltage (V)"), "");
        assert_eq!(table.cell_text(7, "Time (s)"), "");
        assert_eq!(table.cell_text(0, "Voltage (V)"), "5");
    }

    #[test]
    fn test_reachable_keys_skip_stale() {
        let table = sample();
        let keys: Vec<&str> = table.reachable_keys(&table.rows[1]).collect();
        assert_eq!(keys, vec!["Time (s)"]);
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn test_table_deserializes_without_rows() {
        let table: Table = serde_json::from_str(r#"{"headers":["A"]}"#).unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.row_count(), 0);
        assert!(Table::new().is_empty());
    }
}
