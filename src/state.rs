// Shared application state
//
// Everything a handler or middleware needs is built once at startup and handed out
// through this context. There is no module-level mutable state.

use std::sync::Arc;

use crate::audio::AudioConverter;
use crate::config::{AppConfig, Credentials, HandlerConfig};
use crate::paraphrase_log::ParaphraseLog;
use crate::providers::{OpenAiProvider, ProviderError, SpeechToText, TextGenerator};
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppContext {
    pub handler_config: Arc<HandlerConfig>,
    pub credentials: Option<Arc<Credentials>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub transcriber: Arc<dyn SpeechToText>,
    pub paraphraser: Arc<dyn TextGenerator>,
    pub paraphrase_log: Arc<ParaphraseLog>,
    pub audio_converter: AudioConverter,
}

impl AppContext {
    /// Context backed by the OpenAI provider
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let provider = Arc::new(OpenAiProvider::new(config.provider.clone())?);
        Ok(Self::new(
            config,
            provider.clone(),
            provider,
            RateLimiter::from_config(&config.rate_limit),
        ))
    }

    /// Context with explicit providers and limiter
    pub fn new(
        config: &AppConfig,
        transcriber: Arc<dyn SpeechToText>,
        paraphraser: Arc<dyn TextGenerator>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            handler_config: Arc::new(config.handler.clone()),
            credentials: config.credentials.clone().map(Arc::new),
            rate_limiter: Arc::new(rate_limiter),
            transcriber,
            paraphraser,
            paraphrase_log: Arc::new(ParaphraseLog::new(
                config.handler.paraphrase_log_file.clone(),
            )),
            audio_converter: AudioConverter::new(config.handler.audio_converter.clone()),
        }
    }
}
