//! Digitizer interface and payload handling
//!
//! A digitizer turns an image into a [`DigitizationResult`]. The actual
//! recognition happens elsewhere (see [`crate::gemini`]); this module defines
//! the seam, the image payload, and how a JSON table description is turned
//! into a [`Table`].

use crate::error::{DigitizeError, Error, Result};
use crate::table::{CellValue, DigitizationResult, Row, Table};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Something that can read a table out of an image.
///
/// The returned future is awaited by the caller and never cancelled.
pub trait Digitizer {
    fn digitize(
        &self,
        image: &ImagePayload,
    ) -> impl Future<Output = std::result::Result<DigitizationResult, DigitizeError>>;
}

/// An encoded image plus its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Wrap raw bytes
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an image file, guessing the MIME type from its extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(mime_for_path(path), bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    ///
    /// A bare base64 string is accepted too and assumed to be JPEG.
    pub fn from_data_uri(uri: &str) -> std::result::Result<Self, DigitizeError> {
        let (mime_type, encoded) = match uri.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| DigitizeError::UnreadableImage("data URI has no payload".to_string()))?;
                let mime = meta.strip_suffix(";base64").ok_or_else(|| {
                    DigitizeError::UnreadableImage("data URI is not base64 encoded".to_string())
                })?;
                (mime.to_string(), payload)
            }
            None => ("image/jpeg".to_string(), uri),
        };

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DigitizeError::UnreadableImage(e.to_string()))?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Base64 encoding of the bytes
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Encode as a `data:` URI, the form stored in the archive
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// File extensions treated as images, lowercase
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// MIME type for an image path, by extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Turn a JSON table description into a [`DigitizationResult`].
///
/// Expected shape: `{"headers": [..], "rows": [{header: value}], "rawText": ".."}`.
/// Missing `headers` or `rows` read as empty. Strings become text cells,
/// numbers become numeric cells, `null` becomes an empty cell and anything
/// else is kept as its JSON text.
pub fn normalize_response(value: &Value) -> std::result::Result<DigitizationResult, DigitizeError> {
    let object = value
        .as_object()
        .ok_or_else(|| DigitizeError::Malformed("expected a JSON object".to_string()))?;

    let headers = match object.get("headers") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|h| match h {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(_) => return Err(DigitizeError::Malformed("'headers' is not a list".to_string())),
    };

    let rows = match object.get("rows") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(k, v)| (k.as_str(), cell_from_json(v)))
                            .collect::<Row>()
                    })
                    .ok_or_else(|| DigitizeError::Malformed("a row is not an object".to_string()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(_) => return Err(DigitizeError::Malformed("'rows' is not a list".to_string())),
    };

    let notes = object
        .get("rawText")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(DigitizationResult {
        table: Table::from_parts(headers, rows),
        notes,
    })
}

fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Number(n) => n
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(n.to_string())),
        other => CellValue::Text(other.to_string()),
    }
}

/// Digitizer that ignores the image and returns a result stored as JSON.
///
/// Used for offline capture of sheets that were digitized elsewhere.
#[derive(Debug, Clone)]
pub struct JsonFileDigitizer {
    path: PathBuf,
}

impl JsonFileDigitizer {
    /// Create a digitizer reading from `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Digitizer for JsonFileDigitizer {
    async fn digitize(&self, _image: &ImagePayload) -> std::result::Result<DigitizationResult, DigitizeError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| DigitizeError::Request(format!("{}: {}", self.path.display(), e)))?;
        let value: Value =
            serde_json::from_str(&content).map_err(|e| DigitizeError::Malformed(e.to_string()))?;
        normalize_response(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_uri_round_trip() {
        let payload = ImagePayload::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        let uri = payload.to_data_uri();
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
        assert_eq!(ImagePayload::from_data_uri(&uri).unwrap(), payload);
    }

    #[test]
    fn test_bare_base64_is_jpeg() {
        let payload = ImagePayload::from_data_uri("iVBORw==").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.bytes.len(), 4);
    }

    #[test]
    fn test_bad_data_uri() {
        assert!(matches!(
            ImagePayload::from_data_uri("data:image/png,plain"),
            Err(DigitizeError::UnreadableImage(_))
        ));
        assert!(matches!(
            ImagePayload::from_data_uri("data:image/png;base64,@@@"),
            Err(DigitizeError::UnreadableImage(_))
        ));
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/sheet.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("sheet.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("sheet")), "image/jpeg");
    }

    #[test]
    fn test_normalize_response() {
        let value = json!({
            "headers": ["Time (s)", "Voltage (V)"],
            "rows": [
                {"Time (s)": 1, "Voltage (V)": "3.2"},
                {"Time (s)": 2, "Voltage (V)": null, "flag": true}
            ],
            "rawText": "  Room temp 21C "
        });

        let result = normalize_response(&value).unwrap();
        assert_eq!(result.table.headers, vec!["Time (s)", "Voltage (V)"]);
        assert_eq!(result.table.cell(0, "Time (s)"), Some(&CellValue::Number(1.0)));
        assert_eq!(result.table.cell(0, "Voltage (V)"), Some(&CellValue::text("3.2")));
        assert_eq!(result.table.cell(1, "Voltage (V)"), Some(&CellValue::Empty));
        assert_eq!(result.table.cell(1, "flag"), Some(&CellValue::text("true")));
        assert_eq!(result.notes.as_deref(), Some("Room temp 21C"));
    }

    #[test]
    fn test_normalize_defaults() {
        let result = normalize_response(&json!({})).unwrap();
        assert!(result.table.is_empty());
        assert_eq!(result.notes, None);
    }

    #[test]
    fn test_normalize_rejects_bad_shapes() {
        assert!(normalize_response(&json!([1, 2])).is_err());
        assert!(normalize_response(&json!({"headers": "a"})).is_err());
        assert!(normalize_response(&json!({"rows": [1]})).is_err());
    }

    #[tokio::test]
    async fn test_json_file_digitizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        fs::write(&path, r#"{"headers":["a"],"rows":[{"a":"1"}]}"#).unwrap();

        let digitizer = JsonFileDigitizer::new(&path);
        let image = ImagePayload::new("image/png", vec![]);
        let result = digitizer.digitize(&image).await.unwrap();
        assert_eq!(result.table.cell_text(0, "a"), "1");

        let missing = JsonFileDigitizer::new(dir.path().join("missing.json"));
        assert!(matches!(
            missing.digitize(&image).await,
            Err(DigitizeError::Request(_))
        ));
    }
}
