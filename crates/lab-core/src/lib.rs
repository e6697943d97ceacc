//! lab-core: Core library for digitized lab tables
//!
//! This library provides functionality to:
//! - Represent a digitized table (headers + rows keyed by header text)
//! - Edit it through pure, copy-on-write operations
//! - Derive a numeric series for charting
//! - Export it as delimited text or as an analysis script
//! - Keep a bounded archive of past scans
//! - Drive digitizers and the interactive review session

pub mod archive;
pub mod config;
pub mod digitize;
pub mod edit;
pub mod error;
pub mod export;
pub mod gemini;
pub mod parser;
pub mod scanner;
pub mod series;
pub mod session;
pub mod table;

pub use archive::{ArchiveStore, FileStore, MemoryStore, ScanEntry, SessionArchive, ARCHIVE_CAPACITY};
pub use config::Config;
pub use digitize::{Digitizer, ImagePayload, JsonFileDigitizer};
pub use edit::{Edit, EditScript};
pub use error::{DigitizeError, Error, Result};
pub use export::{render_csv, render_script, write_csv_export, ScriptFlavor};
pub use gemini::GeminiDigitizer;
pub use parser::parse_csv;
pub use scanner::scan_images;
pub use series::{derive_series, NumericSeries, Plot, SeriesPoint};
pub use session::{CaptureTicket, Session, View};
pub use table::{CellValue, DigitizationResult, Row, Table};
