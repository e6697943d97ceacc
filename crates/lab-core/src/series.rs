//! Numeric series derivation for charting
//!
//! Picks the columns that hold numbers, uses the first as the x axis and the
//! rest as y series, and returns the rows sorted by x.

use crate::table::Table;
use serde::Serialize;
use std::cmp::Ordering;

/// Outcome of inspecting a table for chartable data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Plot {
    /// No rows, or not enough columns to draw anything
    NoData,
    /// Rows exist but fewer than two columns hold numbers
    InsufficientNumericColumns { numeric: usize },
    /// A chartable series
    Series(NumericSeries),
}

impl Plot {
    /// The series, if the table was chartable
    pub fn series(&self) -> Option<&NumericSeries> {
        match self {
            Plot::Series(s) => Some(s),
            _ => None,
        }
    }

    /// Guidance text for the states that cannot be drawn
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Plot::NoData => Some("Not enough data to plot. Digitize a table with at least two columns."),
            Plot::InsufficientNumericColumns { .. } => {
                Some("At least two numeric columns are required to draw a chart.")
            }
            Plot::Series(_) => None,
        }
    }
}

/// Rows projected onto their numeric columns, sorted by x
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSeries {
    /// Header used as the x axis
    pub x_label: String,
    /// Headers plotted against x, one per series
    pub y_labels: Vec<String>,
    /// One point per table row
    pub points: Vec<SeriesPoint>,
}

impl NumericSeries {
    /// Values of the y series at `index`, in point order
    pub fn y_values(&self, index: usize) -> Vec<f64> {
        self.points.iter().map(|p| p.ys[index]).collect()
    }

    /// x values in point order
    pub fn x_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }
}

/// One projected row; unparseable entries are NaN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: f64,
    pub ys: Vec<f64>,
}

/// Headers where at least one row holds a finite number
pub fn numeric_headers(table: &Table) -> Vec<&str> {
    table
        .headers
        .iter()
        .filter(|h| table.rows.iter().any(|r| r.number(h).is_some()))
        .map(String::as_str)
        .collect()
}

/// Derive the chartable series of a table
pub fn derive_series(table: &Table) -> Plot {
    if table.rows.is_empty() || table.headers.len() < 2 {
        return Plot::NoData;
    }

    let numeric = numeric_headers(table);
    if numeric.len() < 2 {
        return Plot::InsufficientNumericColumns {
            numeric: numeric.len(),
        };
    }

    let project = |row: &crate::table::Row, header: &str| row.number(header).unwrap_or(f64::NAN);

    let mut points: Vec<SeriesPoint> = table
        .rows
        .iter()
        .map(|row| SeriesPoint {
            x: project(row, numeric[0]),
            ys: numeric[1..].iter().map(|h| project(row, h)).collect(),
        })
        .collect();

    // stable: equal x keep input order
    points.sort_by(|a, b| compare_x(a.x, b.x));

    Plot::Series(NumericSeries {
        x_label: numeric[0].to_string(),
        y_labels: numeric[1..].iter().map(|h| h.to_string()).collect(),
        points,
    })
}

/// Ascending by value, NaN after every number
fn compare_x(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}
