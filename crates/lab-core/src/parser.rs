//! CSV import for previously exported tables

use crate::error::{Error, Result};
use crate::table::{CellValue, Row, Table};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Parse a CSV file into a Table
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_reader(BufReader::new(file), path.to_path_buf())
}

/// Parse CSV from a string
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    parse_reader(content.as_bytes(), PathBuf::from(source_name))
}

/// Headers come from the first line; every value is kept as text. Rows
/// shorter than the header simply lack the trailing keys, longer rows are
/// truncated.
fn parse_reader<R: Read>(reader: R, path: PathBuf) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(Error::CsvParse {
            path,
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;

        if record.len() > headers.len() {
            warn!(
                "row {} in {} has more cells than columns, truncating",
                row_idx + 1,
                path.display()
            );
        }

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.as_str(), CellValue::text(v)))
            .collect();
        rows.push(row);
    }

    Ok(Table::from_parts(headers, rows))
}
