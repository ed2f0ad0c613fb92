//! HTTP-level tests for the Voice Notes API
//!
//! The application is assembled exactly as in `main`, with local fakes standing in for the
//! remote providers and every file kept under a temporary directory.


use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{AppConfig, Credentials};
use crate::handlers::authentication::encode_basic_authorization;
use crate::providers::{ProviderError, SpeechToText, TextGenerator};
use crate::rate_limit::RateLimiter;
use crate::state::AppContext;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "s3cret";
pub const BOUNDARY: &str = "voice-notes-test-boundary";

/// Transcriber that records each call and whether the audio file existed at that moment
pub struct FakeTranscriber {
    configured: bool,
    fail: bool,
    calls: AtomicUsize,
    saw_file: AtomicBool,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            configured: true,
            fail: false,
            calls: AtomicUsize::new(0),
            saw_file: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_file(&self) -> bool {
        self.saw_file.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for FakeTranscriber {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn transcribe(&self, audio_file: &Path) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_file.store(audio_file.is_file(), Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                message: String::from("upstream unavailable"),
            });
        }
        Ok(String::from("Buy milk and call the plumber."))
    }
}

/// Paraphraser that upper-cases its input
pub struct FakeParaphraser {
    configured: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeParaphraser {
    pub fn new() -> Self {
        Self {
            configured: true,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeParaphraser {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn paraphrase(&self, text: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::InvalidResponse(String::from("no choices")));
        }
        Ok(text.to_uppercase())
    }
}

/// Everything one test needs; the temporary directory lives as long as the harness
pub struct Harness {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub transcriber: Arc<FakeTranscriber>,
    pub paraphraser: Arc<FakeParaphraser>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            FakeTranscriber::new(),
            FakeParaphraser::new(),
            RateLimiter::disabled(),
        )
    }

    pub fn with(
        transcriber: FakeTranscriber,
        paraphraser: FakeParaphraser,
        rate_limiter: RateLimiter,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let transcriber = Arc::new(transcriber);
        let paraphraser = Arc::new(paraphraser);
        let ctx = AppContext::new(
            &config,
            transcriber.clone(),
            paraphraser.clone(),
            rate_limiter,
        );
        Self {
            dir,
            ctx,
            transcriber,
            paraphraser,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        Path::new(&self.ctx.handler_config.temp_dir)
    }

    /// Entries left in the scratch directory
    pub fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub fn log_path(&self) -> &Path {
        self.ctx.paraphrase_log.path()
    }
}

fn test_config(root: &Path) -> AppConfig {
    let scratch = root.join("scratch").display().to_string();
    let log_file = root.join("logs").join("paraphrase_logs.jsonl").display().to_string();
    AppConfig::from_lookup(|key| match key {
        "API_USERNAME" => Some(USERNAME.to_string()),
        "API_PASSWORD" => Some(PASSWORD.to_string()),
        "VOICE_API_TEMP_DIR" => Some(scratch.clone()),
        "PARAPHRASE_LOG_FILE" => Some(log_file.clone()),
        "AUDIO_CONVERTER_CMD" => Some(String::from("voice-notes-test-missing-converter")),
        _ => None,
    })
}

/// `Authorization` value for the test user
pub fn auth_header() -> (&'static str, String) {
    (
        "authorization",
        encode_basic_authorization(&Credentials::new(USERNAME, PASSWORD)),
    )
}

pub fn multipart_content_type() -> (&'static str, String) {
    (
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    )
}

/// One multipart part; `file_name` of `None` produces a plain form field
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Percent-encode the characters of an RFC 3339 timestamp that break a query string
pub fn query_timestamp(value: &str) -> String {
    value.replace('+', "%2B").replace(':', "%3A")
}
