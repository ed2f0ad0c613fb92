//! External text providers
//!
//! Speech-to-text and paraphrasing are delegated to remote services. Handlers only see the
//! traits below, so tests can swap in local fakes.

pub mod openai;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Errors returned by a provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No usable API key was configured
    #[error("Provider API key not configured")]
    NotConfigured,

    /// Transport failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered with a body we could not use
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Reading the audio file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts an audio file into text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Whether the provider can be called at all
    fn is_configured(&self) -> bool;

    /// Transcribe the audio stored at `audio_file`
    async fn transcribe(&self, audio_file: &Path) -> Result<String, ProviderError>;
}

/// Rewrites text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Whether the provider can be called at all
    fn is_configured(&self) -> bool;

    /// Return a clearer, more concise version of `text`
    async fn paraphrase(&self, text: &str) -> Result<String, ProviderError>;
}
