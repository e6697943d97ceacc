//! Editing engine for digitized tables
//!
//! This module provides:
//! - Pure structural operations (rename header, set cell, append/remove row,
//!   remove column), each taking a table and returning a new one
//! - An [`Edit`] value naming one operation, so edits can be stored and replayed
//! - Edit script files (JSON) holding a sequence of edits
//!
//! The operations treat an out-of-range index as a caller bug and panic.
//! Input that comes from outside the process should go through
//! [`Edit::check`] first.

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rename the header at `index`, moving every row's value to the new key.
///
/// If `label` already names another column, that column's values are
/// overwritten row by row. A row that had no value under the old label ends
/// up with no value under the new one either.
///
/// # Panics
/// Panics if `index` is out of range.
pub fn rename_header(table: &Table, index: usize, label: &str) -> Table {
    let old = &table.headers[index];
    if old == label {
        return table.clone();
    }

    let mut next = table.clone();
    next.headers[index] = label.to_string();

    for row in &mut next.rows {
        match row.remove(old) {
            Some(value) => row.insert(label, value),
            None => {
                row.remove(label);
            }
        }
    }

    next
}

/// Store `value` as text under `header` in row `row`.
///
/// # Panics
/// Panics if `row` is out of range.
pub fn set_cell(table: &Table, row: usize, header: &str, value: &str) -> Table {
    let mut next = table.clone();
    next.rows[row].insert(header, CellValue::text(value));
    next
}

/// Append a row holding an empty text entry for every current header
pub fn append_row(table: &Table) -> Table {
    let mut next = table.clone();
    let row = table
        .headers
        .iter()
        .map(|h| (h.as_str(), CellValue::text("")))
        .collect();
    next.rows.push(row);
    next
}

/// Remove the row at `index`; later rows move up by one.
///
/// # Panics
/// Panics if `index` is out of range.
pub fn remove_row(table: &Table, index: usize) -> Table {
    let mut next = table.clone();
    next.rows.remove(index);
    next
}

/// Remove the header at `index` and its key from every row.
///
/// Other keys the rows may hold are left untouched.
///
/// # Panics
/// Panics if `index` is out of range.
pub fn remove_column(table: &Table, index: usize) -> Table {
    let mut next = table.clone();
    let header = next.headers.remove(index);
    for row in &mut next.rows {
        row.remove(&header);
    }
    next
}

/// A single structural edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    /// Rename a header and migrate its values
    RenameHeader { index: usize, label: String },
    /// Overwrite one cell with text
    SetCell {
        row: usize,
        header: String,
        value: String,
    },
    /// Add an empty row at the end
    AppendRow,
    /// Delete a row by position
    RemoveRow { index: usize },
    /// Delete a column by position
    RemoveColumn { index: usize },
}

impl Edit {
    /// Create a cell edit
    pub fn set_cell(row: usize, header: impl Into<String>, value: impl Into<String>) -> Self {
        Edit::SetCell {
            row,
            header: header.into(),
            value: value.into(),
        }
    }

    /// Create a header rename
    pub fn rename_header(index: usize, label: impl Into<String>) -> Self {
        Edit::RenameHeader {
            index,
            label: label.into(),
        }
    }

    /// Verify that this edit addresses existing rows and columns of `table`
    pub fn check(&self, table: &Table) -> Result<()> {
        let column = |index: usize| {
            if index < table.column_count() {
                Ok(())
            } else {
                Err(Error::InvalidEdit(format!(
                    "column index {} out of range ({} columns)",
                    index,
                    table.column_count()
                )))
            }
        };
        let row = |index: usize| {
            if index < table.row_count() {
                Ok(())
            } else {
                Err(Error::InvalidEdit(format!(
                    "row index {} out of range ({} rows)",
                    index,
                    table.row_count()
                )))
            }
        };

        match self {
            Edit::RenameHeader { index, .. } | Edit::RemoveColumn { index } => column(*index),
            Edit::SetCell { row: r, .. } | Edit::RemoveRow { index: r } => row(*r),
            Edit::AppendRow => Ok(()),
        }
    }

    /// Apply this edit, producing a new table.
    ///
    /// # Panics
    /// Panics if the edit addresses a row or column `table` does not have.
    pub fn apply(&self, table: &Table) -> Table {
        match self {
            Edit::RenameHeader { index, label } => rename_header(table, *index, label),
            Edit::SetCell { row, header, value } => set_cell(table, *row, header, value),
            Edit::AppendRow => append_row(table),
            Edit::RemoveRow { index } => remove_row(table, *index),
            Edit::RemoveColumn { index } => remove_column(table, *index),
        }
    }

    /// Check and apply in one step
    pub fn try_apply(&self, table: &Table) -> Result<Table> {
        self.check(table)?;
        Ok(self.apply(table))
    }
}

/// An edit script file: a sequence of edits applied in order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditScript {
    /// List of edits
    pub edits: Vec<Edit>,
}

impl EditScript {
    /// Create a new empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edit to the script
    pub fn add_edit(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Apply every edit in order.
    ///
    /// Each edit is checked against the table produced by the edits before
    /// it; the first one that does not fit aborts the whole script.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let mut current = table.clone();
        for (i, edit) in self.edits.iter().enumerate() {
            current = edit.try_apply(&current).map_err(|e| match e {
                Error::InvalidEdit(message) => {
                    Error::InvalidEdit(format!("edit #{}: {}", i + 1, message))
                }
                other => other,
            })?;
        }
        Ok(current)
    }

    /// Load an edit script from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the edit script to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
