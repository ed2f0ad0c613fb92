// Voice Notes API Library
//
// This crate provides an HTTP API that turns voice notes into text and tidies text up.
// Transcription and paraphrasing are delegated to an OpenAI-compatible provider, and every
// paraphrase is kept in an append-only JSON Lines log that can be queried over HTTP.

pub mod audio;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod file_utils;
pub mod handlers;
pub mod models;
pub mod paraphrase_log;
pub mod providers;
pub mod rate_limit;
pub mod state;

// Re-export common types for easier access
pub use config::{AppConfig, HandlerConfig};
pub use error::HandlerError;
pub use handlers::{configure, RequestTrace};
pub use models::{ErrorResponse, ParaphraseResponse, TranscriptionResponse};
pub use paraphrase_log::{LogRecord, ParaphraseLog};
pub use providers::{OpenAiProvider, SpeechToText, TextGenerator};
pub use rate_limit::RateLimiter;
pub use state::AppContext;
