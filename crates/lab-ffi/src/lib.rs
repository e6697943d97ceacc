//! C FFI bindings for lab-core
//!
//! Exposes the table model and the editing engine to C/C++ front ends.
//! Tables are immutable handles: every edit returns a new handle and the
//! caller frees both.

use lab_core::{render_csv, render_script, Edit, ScriptFlavor, Table};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

/// Opaque handle to a table
pub struct FfiTable {
    inner: Table,
}

unsafe fn to_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn into_handle(table: Table) -> *mut FfiTable {
    Box::into_raw(Box::new(FfiTable { inner: table }))
}

/// Borrow the table behind a handle, `None` for null
unsafe fn table_ref<'a>(table: *const FfiTable) -> Option<&'a Table> {
    table.as_ref().map(|t| &t.inner)
}

unsafe fn apply_edit(table: *const FfiTable, edit: Edit) -> *mut FfiTable {
    let Some(table) = table_ref(table) else {
        return ptr::null_mut();
    };
    match edit.try_apply(table) {
        Ok(table) => into_handle(table),
        Err(_) => ptr::null_mut(),
    }
}

/// Create a table from its JSON form (`{"headers": [...], "rows": [...]}`)
///
/// # Safety
/// - `json` must be a valid C string
/// - Returns null on error
#[no_mangle]
pub unsafe extern "C" fn lab_table_from_json(json: *const c_char) -> *mut FfiTable {
    let Some(json) = to_str(json) else {
        return ptr::null_mut();
    };

    match serde_json::from_str::<Table>(json) {
        Ok(table) => into_handle(table),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a table
///
/// # Safety
/// - `table` must be a valid pointer returned by a lab_* function or null
#[no_mangle]
pub unsafe extern "C" fn lab_free_table(table: *mut FfiTable) {
    if !table.is_null() {
        drop(Box::from_raw(table));
    }
}

/// Get the row count of a table
///
/// # Safety
/// - `table` must be a valid table pointer
#[no_mangle]
pub unsafe extern "C" fn lab_table_row_count(table: *const FfiTable) -> usize {
    table_ref(table).map_or(0, Table::row_count)
}

/// Get the column count of a table
///
/// # Safety
/// - `table` must be a valid table pointer
#[no_mangle]
pub unsafe extern "C" fn lab_table_col_count(table: *const FfiTable) -> usize {
    table_ref(table).map_or(0, Table::column_count)
}

/// Get a header by index
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `lab_free_string`
#[no_mangle]
pub unsafe extern "C" fn lab_table_header(table: *const FfiTable, index: usize) -> *mut c_char {
    let Some(table) = table_ref(table) else {
        return ptr::null_mut();
    };

    table
        .headers
        .get(index)
        .map(|h| into_c_string(h.clone()))
        .unwrap_or(ptr::null_mut())
}

/// Get the display text of the cell under `header` in row `row`
///
/// Missing cells read as an empty string.
///
/// # Safety
/// - `table` must be a valid table pointer
/// - `header` must be a valid C string
/// - Returns null if `row` is out of bounds
/// - Caller must free the returned string with `lab_free_string`
#[no_mangle]
pub unsafe extern "C" fn lab_table_cell(
    table: *const FfiTable,
    row: usize,
    header: *const c_char,
) -> *mut c_char {
    let Some(header) = to_str(header) else {
        return ptr::null_mut();
    };
    match table_ref(table) {
        Some(table) if row < table.row_count() => into_c_string(table.cell_text(row, header)),
        _ => ptr::null_mut(),
    }
}

/// Rename the header at `index`
///
/// # Safety
/// - `table` must be a valid table pointer
/// - `label` must be a valid C string
/// - Returns a new table, or null if the edit is invalid
#[no_mangle]
pub unsafe extern "C" fn lab_rename_header(
    table: *const FfiTable,
    index: usize,
    label: *const c_char,
) -> *mut FfiTable {
    match to_str(label) {
        Some(label) => apply_edit(table, Edit::rename_header(index, label)),
        None => ptr::null_mut(),
    }
}

/// Set the cell under `header` in row `row`
///
/// # Safety
/// - `table` must be a valid table pointer
/// - `header` and `value` must be valid C strings
/// - Returns a new table, or null if the edit is invalid
#[no_mangle]
pub unsafe extern "C" fn lab_set_cell(
    table: *const FfiTable,
    row: usize,
    header: *const c_char,
    value: *const c_char,
) -> *mut FfiTable {
    match (to_str(header), to_str(value)) {
        (Some(header), Some(value)) => apply_edit(table, Edit::set_cell(row, header, value)),
        _ => ptr::null_mut(),
    }
}

/// Append an empty row
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Returns a new table, or null on error
#[no_mangle]
pub unsafe extern "C" fn lab_append_row(table: *const FfiTable) -> *mut FfiTable {
    apply_edit(table, Edit::AppendRow)
}

/// Remove the row at `index`
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Returns a new table, or null if `index` is out of bounds
#[no_mangle]
pub unsafe extern "C" fn lab_remove_row(table: *const FfiTable, index: usize) -> *mut FfiTable {
    apply_edit(table, Edit::RemoveRow { index })
}

/// Remove the column at `index`
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Returns a new table, or null if `index` is out of bounds
#[no_mangle]
pub unsafe extern "C" fn lab_remove_column(table: *const FfiTable, index: usize) -> *mut FfiTable {
    apply_edit(table, Edit::RemoveColumn { index })
}

/// Render a table as delimited text
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Caller must free the returned string with `lab_free_string`
#[no_mangle]
pub unsafe extern "C" fn lab_table_to_csv(table: *const FfiTable) -> *mut c_char {
    match table_ref(table) {
        Some(table) => into_c_string(render_csv(table)),
        None => ptr::null_mut(),
    }
}

/// Render an analysis script; `flavor` is "numpy" or "pandas" (null means numpy)
///
/// # Safety
/// - `table` must be a valid table pointer
/// - `flavor` must be a valid C string or null
/// - Returns null on an unknown flavor
/// - Caller must free the returned string with `lab_free_string`
#[no_mangle]
pub unsafe extern "C" fn lab_table_to_script(
    table: *const FfiTable,
    flavor: *const c_char,
) -> *mut c_char {
    let Some(table) = table_ref(table) else {
        return ptr::null_mut();
    };

    let flavor = if flavor.is_null() {
        ScriptFlavor::default()
    } else {
        match to_str(flavor).map(str::parse::<ScriptFlavor>) {
            Some(Ok(flavor)) => flavor,
            _ => return ptr::null_mut(),
        }
    };

    into_c_string(render_script(table, flavor))
}

/// Serialize a table to JSON
///
/// # Safety
/// - `table` must be a valid table pointer
/// - Caller must free the returned string with `lab_free_string`
#[no_mangle]
pub unsafe extern "C" fn lab_table_to_json(table: *const FfiTable) -> *mut c_char {
    let Some(table) = table_ref(table) else {
        return ptr::null_mut();
    };

    match serde_json::to_string(table) {
        Ok(json) => into_c_string(json),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a lab_* function or null
#[no_mangle]
pub unsafe extern "C" fn lab_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
