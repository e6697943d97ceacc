//! Error types for lab-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lab-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// No archived scan with this ID
    #[error("no archived scan with id '{0}'")]
    EntryNotFound(String),

    /// The archive holds no scans
    #[error("the archive is empty; capture or import a scan first")]
    EmptyArchive,

    /// An edit does not fit the table it is applied to
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// Configuration could not be resolved
    #[error("configuration error: {0}")]
    Config(String),

    /// Digitization failed
    #[error(transparent)]
    Digitize(#[from] DigitizeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by a digitizer.
///
/// The `Display` text is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigitizeError {
    /// The image payload could not be decoded or read
    #[error("the image could not be read: {0}")]
    UnreadableImage(String),

    /// The digitizer found nothing that looks like a table
    #[error("no table was detected in the image")]
    NoTable,

    /// The digitizer service could not be reached or refused the request
    #[error("failed to digitize table ({0}); please ensure the image is clear and contains a table")]
    Request(String),

    /// The digitizer answered with something that is not a table description
    #[error("the digitizer returned unusable data: {0}")]
    Malformed(String),
}
