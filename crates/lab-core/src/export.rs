//! Export renderers: delimited text and analysis scripts
//!
//! Both renderers are pure functions of a [`Table`] and never fail. The
//! delimited-text output wraps each value in double quotes without escaping
//! quotes or commas inside the value; files produced by earlier versions rely
//! on that exact shape.

use crate::error::{Error, Result};
use crate::table::{format_number, CellValue, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name prefix of delimited-text exports
pub const EXPORT_PREFIX: &str = "telemetry_export";

/// Render a table as comma-separated text.
///
/// The header line is not quoted; every row value is. Lines are joined by
/// `\n` with no trailing newline, so an empty table renders as "".
pub fn render_csv(table: &Table) -> String {
    let mut lines = Vec::with_capacity(table.rows.len() + 1);
    lines.push(table.headers.join(","));

    for row in &table.rows {
        let values: Vec<String> = table
            .headers
            .iter()
            .map(|h| {
                let value = row.get(h).map(CellValue::to_string_value).unwrap_or_default();
                format!("\"{}\"", value)
            })
            .collect();
        lines.push(values.join(","));
    }

    lines.join("\n")
}

/// Which analysis stack the generated script targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFlavor {
    /// One NumPy array per column, plotted with matplotlib
    #[default]
    Numpy,
    /// A pandas DataFrame with a summary and a plot of every column
    Pandas,
}

impl std::str::FromStr for ScriptFlavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "numpy" | "np" => Ok(ScriptFlavor::Numpy),
            "pandas" | "pd" => Ok(ScriptFlavor::Pandas),
            other => Err(Error::Config(format!(
                "unknown script flavor '{}', expected numpy or pandas",
                other
            ))),
        }
    }
}

/// Render a ready-to-run analysis script for the table
pub fn render_script(table: &Table, flavor: ScriptFlavor) -> String {
    match flavor {
        ScriptFlavor::Numpy => render_numpy(table),
        ScriptFlavor::Pandas => render_pandas(table),
    }
}

/// Turn a header into a variable name: every character other than an ASCII
/// letter or digit becomes `_`, then the result is lowercased.
pub fn sanitize_identifier(header: &str) -> String {
    header
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

fn render_numpy(table: &Table) -> String {
    let names: Vec<String> = table.headers.iter().map(|h| sanitize_identifier(h)).collect();

    let mut script = String::from(
        "# Digitized lab data - NumPy\nimport numpy as np\nimport matplotlib.pyplot as plt\n\n",
    );

    for (header, name) in table.headers.iter().zip(&names) {
        let values: Vec<String> = table
            .rows
            .iter()
            .map(|row| match row.number(header) {
                Some(n) => format_number(n),
                None => "np.nan".to_string(),
            })
            .collect();
        script.push_str(&format!("{} = np.array([{}])\n", name, values.join(", ")));
    }

    if names.len() >= 2 {
        script.push_str(&format!(
            "\n# Plot\nplt.figure(figsize=(10, 6))\nplt.plot({}, {}, 'o-', label={})\nplt.grid(True)\nplt.legend()\nplt.show()",
            names[0],
            names[1],
            py_str(&table.headers[1])
        ));
    }

    script
}

fn render_pandas(table: &Table) -> String {
    let columns: Vec<String> = table.headers.iter().map(|h| py_str(h)).collect();
    let rows: Vec<String> = table
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = table
                .headers
                .iter()
                .map(|h| match row.get(h) {
                    None | Some(CellValue::Empty) => "None".to_string(),
                    Some(value) => match value.as_number() {
                        Some(n) => format_number(n),
                        None => py_str(&value.to_string_value()),
                    },
                })
                .collect();
            format!("[{}]", cells.join(", "))
        })
        .collect();

    let mut script = format!(
        "import pandas as pd\nimport matplotlib.pyplot as plt\n\n# Digitized lab data\ncolumns = [{}]\ndata = [\n    {}\n]\n\ndf = pd.DataFrame(data, columns=columns)\nprint(df.describe())\n",
        columns.join(", "),
        rows.join(",\n    ")
    );

    if table.headers.len() >= 2 {
        script.push_str("\n# Plot\ndf.plot(x=columns[0], y=columns[1:], marker='o')\nplt.grid(True)\nplt.show()");
    }

    script
}

/// Single-quoted Python string literal
fn py_str(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Name of a delimited-text export created at `at`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("{}_{}.csv", EXPORT_PREFIX, at.timestamp_millis())
}

/// Write the delimited-text rendering into `dir`, named after `at`
pub fn write_csv_export<P: AsRef<Path>>(table: &Table, dir: P, at: DateTime<Utc>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(export_file_name(at));
    fs::write(&path, render_csv(table)).map_err(|e| Error::FileWrite {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;
    use chrono::TimeZone;

    fn lab_table() -> Table {
        let rows: Vec<Row> = vec![
            [("Time (s)", CellValue::text("0")), ("Voltage (V)", CellValue::text("1.5"))]
                .into_iter()
                .collect(),
            [("Time (s)", CellValue::Number(1.0)), ("Voltage (V)", CellValue::text("n/a"))]
                .into_iter()
                .collect(),
            [("Time (s)", CellValue::text("12.5e-3"))].into_iter().collect(),
        ];
        Table::from_parts(vec!["Time (s)".to_string(), "Voltage (V)".to_string()], rows)
    }

    #[test]
    fn test_render_csv() {
        let csv = render_csv(&lab_table());
        assert_eq!(
            csv,
            "Time (s),Voltage (V)\n\"0\",\"1.5\"\n\"1\",\"n/a\"\n\"12.5e-3\",\"\""
        );
    }

    #[test]
    fn test_render_csv_is_deterministic() {
        let table = lab_table();
        assert_eq!(render_csv(&table), render_csv(&table));
    }

    #[test]
    fn test_render_csv_empty_table() {
        assert_eq!(render_csv(&Table::new()), "");
    }

    #[test]
    fn test_render_csv_does_not_escape() {
        let table = Table::from_parts(
            vec!["Note".to_string()],
            vec![[("Note", CellValue::text("say \"hi\", twice"))].into_iter().collect()],
        );
        assert_eq!(render_csv(&table), "Note\n\"say \"hi\", twice\"");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Time (s)"), "time__s_");
        assert_eq!(sanitize_identifier("Voltage [V]"), "voltage__v_");
        assert_eq!(sanitize_identifier("Δt"), "_t");
        assert_eq!(sanitize_identifier("I2"), "i2");
    }

    #[test]
    fn test_render_numpy() {
        let script = render_script(&lab_table(), ScriptFlavor::Numpy);
        assert!(script.starts_with("# Digitized lab data - NumPy\nimport numpy as np\n"));
        assert!(script.contains("time__s_ = np.array([0, 1, 0.0125])\n"));
        assert!(script.contains("voltage__v_ = np.array([1.5, np.nan, np.nan])\n"));
        assert!(script.contains("plt.plot(time__s_, voltage__v_, 'o-', label='Voltage (V)')"));
        assert!(script.contains("plt.grid(True)\nplt.legend()"));
    }

    #[test]
    fn test_scripts_read_numbers_with_units() {
        let table = Table::from_parts(
            vec!["t".to_string(), "v".to_string(), "note".to_string()],
            vec![
                [("t", "1 s"), ("v", "3.2V"), ("note", "12abc")]
                    .into_iter()
                    .map(|(k, v)| (k, CellValue::text(v)))
                    .collect(),
                [("t", "2 s"), ("v", "4.1V"), ("note", "1e")]
                    .into_iter()
                    .map(|(k, v)| (k, CellValue::text(v)))
                    .collect(),
            ],
        );

        let numpy = render_script(&table, ScriptFlavor::Numpy);
        assert!(numpy.contains("t = np.array([1, 2])\n"));
        assert!(numpy.contains("v = np.array([3.2, 4.1])\n"));
        assert!(numpy.contains("note = np.array([12, 1])\n"));

        let pandas = render_script(&table, ScriptFlavor::Pandas);
        assert!(pandas.contains("[1, 3.2, 12],\n    [2, 4.1, 1]"));
    }

    #[test]
    fn test_numbers_render_like_a_browser() {
        let table = Table::from_parts(
            vec!["big".to_string(), "zero".to_string()],
            vec![[("big", CellValue::Number(1e21)), ("zero", CellValue::Number(-0.0))]
                .into_iter()
                .collect()],
        );

        assert_eq!(render_csv(&table), "big,zero\n\"1e+21\",\"0\"");
        assert!(render_script(&table, ScriptFlavor::Numpy).contains("big = np.array([1e+21])"));
    }

    #[test]
    fn test_render_numpy_single_column_has_no_plot() {
        let table = Table::from_parts(
            vec!["x".to_string()],
            vec![[("x", CellValue::text("1"))].into_iter().collect()],
        );
        let script = render_script(&table, ScriptFlavor::Numpy);
        assert!(script.contains("x = np.array([1])"));
        assert!(!script.contains("plt.plot"));
    }

    #[test]
    fn test_render_pandas() {
        let script = render_script(&lab_table(), ScriptFlavor::Pandas);
        assert!(script.contains("columns = ['Time (s)', 'Voltage (V)']"));
        assert!(script.contains("[0, 1.5],\n    [1, 'n/a'],\n    [0.0125, None]"));
        assert!(script.contains("df.plot(x=columns[0], y=columns[1:], marker='o')"));
    }

    #[test]
    fn test_py_str_escapes_quotes() {
        assert_eq!(py_str("it's"), "'it\\'s'");
        assert_eq!(py_str("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_flavor_from_str() {
        assert_eq!("NumPy".parse::<ScriptFlavor>().unwrap(), ScriptFlavor::Numpy);
        assert_eq!("pd".parse::<ScriptFlavor>().unwrap(), ScriptFlavor::Pandas);
        assert!("r".parse::<ScriptFlavor>().is_err());
    }

    #[test]
    fn test_write_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let path = write_csv_export(&lab_table(), dir.path(), at).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "telemetry_export_1700000000123.csv"
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), render_csv(&lab_table()));
    }
}
