//! Gemini-backed digitizer
//!
//! Sends the image inline to the `generateContent` endpoint together with an
//! extraction prompt and a response schema, then normalizes the JSON table the
//! model returns.

use crate::digitize::{normalize_response, Digitizer, ImagePayload};
use crate::error::DigitizeError;
use crate::table::DigitizationResult;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

/// Default API base URL
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model id
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

const PROMPT: &str = "Extract all table data from this lab experiment image.
Focus on numerical values and their headers (e.g. \"Time (s)\", \"Voltage [V]\", \"Current (mA)\").
Be precise with decimal points.
If a header has a unit, include the unit in the header string.
If a value is unreadable, use null or an empty string.";

/// Digitizer calling the Gemini `generateContent` API
#[derive(Debug, Clone)]
pub struct GeminiDigitizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiDigitizer {
    /// Create a digitizer for `model` at `endpoint`
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Full request URL, without the key
    pub fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    async fn request(&self, image: &ImagePayload) -> Result<GenerateResponse, DigitizeError> {
        let body = build_request(image);

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| DigitizeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!("digitizer returned {}: {}", status, detail);
            return Err(DigitizeError::Request(format!("service answered {}", status)));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| DigitizeError::Malformed(e.to_string()))
    }
}

impl Digitizer for GeminiDigitizer {
    async fn digitize(&self, image: &ImagePayload) -> Result<DigitizationResult, DigitizeError> {
        info!(
            "digitizing {} byte {} image with {}",
            image.bytes.len(),
            image.mime_type,
            self.model
        );

        let response = self.request(image).await.map_err(|e| {
            error!("digitization failed: {}", e);
            e
        })?;

        let result = parse_response(&response)?;
        info!(
            "digitized {} columns, {} rows",
            result.table.column_count(),
            result.table.row_count()
        );
        Ok(result)
    }
}

/// Request body: prompt + inline image, JSON output constrained by a schema
fn build_request(image: &ImagePayload) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": PROMPT },
                { "inlineData": { "mimeType": image.mime_type, "data": image.to_base64() } }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "headers": {
                        "type": "ARRAY",
                        "items": { "type": "STRING" },
                        "description": "The column headers found in the table."
                    },
                    "rows": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "description": "An object representing a row where keys are headers."
                        },
                        "description": "The data rows from the table."
                    },
                    "rawText": {
                        "type": "STRING",
                        "description": "A summary of any other notes or text found on the sheet."
                    }
                },
                "required": ["headers", "rows"]
            }
        }
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Pull the table JSON out of the first candidate
fn parse_response(response: &GenerateResponse) -> Result<DigitizationResult, DigitizeError> {
    let text = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(DigitizeError::NoTable);
    }

    let value: Value = serde_json::from_str(&text).map_err(|e| DigitizeError::Malformed(e.to_string()))?;
    let result = normalize_response(&value)?;

    if result.table.headers.is_empty() {
        return Err(DigitizeError::NoTable);
    }

    Ok(result)
}
