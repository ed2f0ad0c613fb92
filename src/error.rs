// Error handling for Voice Notes API
//
// This module defines the error type returned by handlers and middleware. Every variant
// renders as `{"error": message}` with its status code; details of provider and storage
// failures stay in the server log.

use std::io;
use std::time::Duration;
use thiserror::Error;

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::audio::ConversionError;
use crate::models::{endpoint_descriptions, ErrorResponse};
use crate::paraphrase_log::LogStoreError;
use crate::providers::ProviderError;
use crate::rate_limit::RateLimitExceeded;

/// Realm announced in `WWW-Authenticate`
pub const AUTH_REALM: &str = "Voice Notes API";

/// Errors that can occur in the API handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Malformed request input
    #[error("{0}")]
    Validation(String),

    /// Error when processing multipart form data
    #[error("Form error: {0}")]
    FormError(String),

    /// Error when no `file` field was provided
    #[error("No file part")]
    NoAudioFile,

    /// Error when the `file` field has no file name
    #[error("No selected file")]
    NoSelectedFile,

    /// Error when the uploaded file has no content
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Error when a file is too large
    #[error("File too large: {0} bytes exceeds limit of {1} bytes")]
    FileTooLarge(usize, usize),

    /// Missing, malformed or wrong credentials
    #[error("Unauthorized access")]
    Unauthorized,

    /// A request budget is spent
    #[error("Rate limit exceeded: {0}")]
    RateLimited(RateLimitExceeded),

    /// The provider API key is missing or still the placeholder
    #[error("OpenAI API key not configured")]
    ProviderNotConfigured,

    /// Transcription provider failure
    #[error("Error processing audio file")]
    Transcription(#[source] ProviderError),

    /// Audio conversion failure
    #[error("Error processing audio file")]
    Conversion(#[from] ConversionError),

    /// Paraphrase provider failure
    #[error("Error paraphrasing text")]
    Paraphrase(#[source] ProviderError),

    /// Error when saving file data
    #[error("Error processing audio file")]
    FileError(#[from] io::Error),

    /// Error reading the paraphrase log
    #[error("Error reading paraphrase logs")]
    LogStore(#[from] LogStoreError),

    /// No route matched
    #[error("The requested URL was not found")]
    NotFound,

    /// The route exists but not for this method
    #[error("The method is not allowed for the requested URL")]
    MethodNotAllowed,
}

impl HandlerError {
    /// Create a new FormError
    pub fn form_error<S: Into<String>>(msg: S) -> Self {
        Self::FormError(msg.into())
    }

    /// Create a new Validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Seconds a rate-limited caller should wait, rounded up
    fn retry_after_secs(retry_after: Duration) -> u64 {
        let secs = retry_after.as_secs();
        if retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

impl From<RateLimitExceeded> for HandlerError {
    fn from(err: RateLimitExceeded) -> Self {
        HandlerError::RateLimited(err)
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::Validation(_)
            | HandlerError::FormError(_)
            | HandlerError::NoAudioFile
            | HandlerError::NoSelectedFile
            | HandlerError::EmptyFile => StatusCode::BAD_REQUEST,
            HandlerError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            HandlerError::NotFound => StatusCode::NOT_FOUND,
            HandlerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::ProviderNotConfigured
            | HandlerError::Transcription(_)
            | HandlerError::Conversion(_)
            | HandlerError::Paraphrase(_)
            | HandlerError::FileError(_)
            | HandlerError::LogStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: self.to_string(),
            available_endpoints: matches!(self, HandlerError::NotFound)
                .then(endpoint_descriptions),
        };

        let mut builder = HttpResponse::build(self.status_code());
        match self {
            HandlerError::Unauthorized => {
                builder.insert_header((
                    header::WWW_AUTHENTICATE,
                    format!("Basic realm=\"{}\"", AUTH_REALM),
                ));
            }
            HandlerError::RateLimited(exceeded) => {
                builder.insert_header((
                    header::RETRY_AFTER,
                    Self::retry_after_secs(exceeded.retry_after).to_string(),
                ));
            }
            _ => {}
        }
        builder.json(error_response)
    }
}
