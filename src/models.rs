// Voice Notes API data models
//
// This module contains the request and response types used across the API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response for a transcription request
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// Body of a paraphrase request
#[derive(Debug, Default, Deserialize)]
pub struct ParaphraseRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Response for a paraphrase request
#[derive(Debug, Serialize, Deserialize)]
pub struct ParaphraseResponse {
    pub original: String,
    pub paraphrased: String,
}

/// Query parameters of the log listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct LogQueryParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<usize>,
    pub format: Option<String>,
}

/// Query parameters of the log summary endpoint
#[derive(Debug, Default, Deserialize)]
pub struct LogSummaryParams {
    pub days: Option<u32>,
}

/// Error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Valid endpoints, only sent with 404 responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<BTreeMap<String, String>>,
}

/// API documentation returned by the root route
#[derive(Debug, Serialize)]
pub struct ApiDocumentation {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
}

/// The public endpoints and a one-line description of each
pub fn endpoint_descriptions() -> BTreeMap<String, String> {
    [
        ("/", "API documentation"),
        ("/api/v1/transcribe", "POST - Upload audio file for transcription"),
        ("/api/v1/paraphrase", "POST - Paraphrase text"),
        (
            "/api/v1/paraphrase_logs",
            "GET - List paraphrase logs (start_time, end_time, limit, format)",
        ),
        (
            "/api/v1/paraphrase_logs/summary",
            "GET - Paraphrase counts over the last `days` days",
        ),
    ]
    .into_iter()
    .map(|(path, description)| (path.to_string(), description.to_string()))
    .collect()
}
