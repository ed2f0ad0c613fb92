// API route handlers for Voice Notes API
//
// This module contains the route handlers for the API.
// Authentication and rate limiting run as middleware before any of these.

use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, FixedOffset, Local};
use log::{error, info, warn};

use crate::error::HandlerError;
use crate::handlers::form::extract_audio_upload;
use crate::handlers::request_trace::RequestId;
use crate::models::{
    endpoint_descriptions, ApiDocumentation, LogQueryParams, LogSummaryParams,
    ParaphraseRequest, ParaphraseResponse, TranscriptionResponse,
};
use crate::paraphrase_log::{
    format_records_as_text, parse_timestamp, LogFilter, LogRecord, DEFAULT_QUERY_LIMIT,
    DEFAULT_SUMMARY_DAYS, MAX_QUERY_LIMIT,
};
use crate::state::AppContext;

/// API documentation
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(ApiDocumentation {
        message: String::from("Welcome to Voice Note Taker API"),
        endpoints: endpoint_descriptions(),
    })
}

/// Handler for transcription requests
///
/// Stores the `file` field in a scratch directory, converts it when the provider does not
/// accept its format, and returns the provider's text. The scratch directory is removed when
/// the upload goes out of scope, whichever way this handler returns.
pub async fn transcribe(
    form: Multipart,
    request_id: RequestId,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, HandlerError> {
    if !ctx.transcriber.is_configured() {
        error!("[{}] OpenAI API key not configured", request_id);
        return Err(HandlerError::ProviderNotConfigured);
    }

    let upload = extract_audio_upload(form, &ctx.handler_config)
        .await
        .inspect_err(|e| warn!("[{}] Rejected upload: {}", request_id, e))?;
    info!(
        "[{}] Received '{}' ({} bytes)",
        request_id, upload.original_name, upload.size
    );

    let audio_file = ctx
        .audio_converter
        .prepare(&upload.path)
        .await
        .map_err(|e| {
            error!("[{}] Error converting audio: {}", request_id, e);
            HandlerError::from(e)
        })?;

    info!("[{}] Starting transcription", request_id);
    let text = ctx
        .transcriber
        .transcribe(&audio_file)
        .await
        .map_err(|e| {
            error!("[{}] Error processing audio: {}", request_id, e);
            HandlerError::Transcription(e)
        })?;
    info!("[{}] Successfully transcribed audio", request_id);

    drop(upload);
    Ok(HttpResponse::Ok().json(TranscriptionResponse { text }))
}

/// Handler for paraphrase requests
///
/// A successful paraphrase is appended to the paraphrase log. Failing to write the log is
/// reported in the server log only.
pub async fn paraphrase(
    payload: web::Json<ParaphraseRequest>,
    request_id: RequestId,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, HandlerError> {
    let text = match payload.into_inner().text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            warn!("[{}] No text provided", request_id);
            return Err(HandlerError::validation("No text provided"));
        }
    };

    if !ctx.paraphraser.is_configured() {
        error!("[{}] OpenAI API key not configured", request_id);
        return Err(HandlerError::ProviderNotConfigured);
    }

    info!("[{}] Processing paraphrase request", request_id);
    let paraphrased = ctx.paraphraser.paraphrase(&text).await.map_err(|e| {
        error!("[{}] Error paraphrasing text: {}", request_id, e);
        HandlerError::Paraphrase(e)
    })?;
    info!("[{}] Successfully received paraphrase response", request_id);

    let record = LogRecord::new(request_id.0.clone(), text.clone(), paraphrased.clone());
    match ctx.paraphrase_log.append(&record).await {
        Ok(()) => info!("[{}] Successfully logged paraphrase result", request_id),
        Err(e) => error!("[{}] Error logging paraphrase: {}", request_id, e),
    }

    Ok(HttpResponse::Ok().json(ParaphraseResponse {
        original: text,
        paraphrased,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    fn parse(value: Option<&str>) -> Result<Self, HandlerError> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("json") => Ok(OutputFormat::Json),
            Some("text") => Ok(OutputFormat::Text),
            Some(other) => Err(HandlerError::validation(format!(
                "Invalid format: {}. Valid formats are: json, text",
                other
            ))),
        }
    }
}

fn parse_bound(
    name: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<FixedOffset>>, HandlerError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
            HandlerError::validation(format!(
                "Invalid {}: '{}'. Expected an ISO-8601 timestamp",
                name, raw
            ))
        }),
    }
}

/// Handler listing paraphrase log records
pub async fn paraphrase_logs(
    query: web::Query<LogQueryParams>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, HandlerError> {
    let params = query.into_inner();
    let format = OutputFormat::parse(params.format.as_deref())?;
    let filter = LogFilter {
        start: parse_bound("start_time", params.start_time.as_deref())?,
        end: parse_bound("end_time", params.end_time.as_deref())?,
        limit: params
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(MAX_QUERY_LIMIT),
    };

    let records = ctx.paraphrase_log.query(&filter).await.map_err(|e| {
        error!("Error reading paraphrase logs: {}", e);
        HandlerError::from(e)
    })?;

    Ok(match format {
        OutputFormat::Json => HttpResponse::Ok().json(records),
        OutputFormat::Text => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(format_records_as_text(&records)),
    })
}

/// Handler summarizing the paraphrase log over the trailing `days` days
pub async fn paraphrase_logs_summary(
    query: web::Query<LogSummaryParams>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, HandlerError> {
    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS);
    let summary = ctx
        .paraphrase_log
        .summarize(days, Local::now().fixed_offset())
        .await
        .map_err(|e| {
            error!("Error summarizing paraphrase logs: {}", e);
            HandlerError::from(e)
        })?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Fallback for unmatched routes
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    info!("404 error: {} {}", req.method(), req.uri());
    Err(HandlerError::NotFound)
}

/// Fallback for known routes called with the wrong method
pub async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    info!("405 error: {} {}", req.method(), req.uri());
    Err(HandlerError::MethodNotAllowed)
}
