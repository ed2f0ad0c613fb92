// Voice Notes API configuration
//
// This module contains configuration structures and constants for the Voice Notes API.
// It centralizes all configuration parameters and resolves them from environment variables,
// falling back to the defaults below.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

/// Default values for configuration
pub mod defaults {
    // Bind address used in development mode
    pub const DEV_HOST: &str = "0.0.0.0";
    pub const DEV_PORT: u16 = 5000;

    // Bind address used in production mode (behind a reverse proxy)
    pub const PROD_HOST: &str = "127.0.0.1";
    pub const PROD_PORT: u16 = 8000;

    // Temporary directory for uploaded audio
    pub const TEMP_DIR: &str = "temp";

    // Append-only paraphrase log
    pub const PARAPHRASE_LOG_FILE: &str = "logs/paraphrase_logs.jsonl";

    // Whisper API rejects uploads above 25MB
    pub const MAX_FILE_SIZE: usize = 26_214_400;

    // Command used to convert unsupported audio formats to mp3
    pub const AUDIO_CONVERTER: &str = "ffmpeg";

    // OpenAI provider settings
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
    pub const PARAPHRASE_MODEL: &str = "gpt-4o-mini";
    pub const PARAPHRASE_TEMPERATURE: f32 = 0.2;
    pub const PROVIDER_TIMEOUT_SECONDS: u64 = 120;

    // Placeholder shipped in the sample env file
    pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key";

    // Request budgets
    pub const RATE_LIMIT_PER_DAY: u32 = 200;
    pub const RATE_LIMIT_PER_HOUR: u32 = 50;
    pub const TRANSCRIBE_PER_MINUTE: u32 = 10;
    pub const PARAPHRASE_PER_MINUTE: u32 = 30;
}

/// Runtime mode, selected with `APP_ENV`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse an `APP_ENV` value. Anything unrecognized is treated as production.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("development") | Some("dev") | Some("debug") => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Default `env_logger` filter for this mode
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }

    fn default_host(&self) -> &'static str {
        match self {
            Environment::Development => defaults::DEV_HOST,
            Environment::Production => defaults::PROD_HOST,
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Environment::Development => defaults::DEV_PORT,
            Environment::Production => defaults::PROD_PORT,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// A username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of actix-web worker threads
    pub workers: usize,
}

/// Configuration for the request handlers
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Directory holding per-request scratch directories
    pub temp_dir: String,
    /// Largest accepted upload in bytes
    pub max_file_size: usize,
    /// Line-delimited JSON log of paraphrase results
    pub paraphrase_log_file: PathBuf,
    /// Converter invoked for audio formats the provider does not accept
    pub audio_converter: String,
}

impl HandlerConfig {
    /// Ensures the temporary directory exists
    pub fn ensure_temp_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.temp_dir)
    }
}

/// Settings for the OpenAI-compatible provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub transcription_model: String,
    pub paraphrase_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// True when an API key is set and is not the sample placeholder
    pub fn is_configured(&self) -> bool {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) => !key.is_empty() && key != defaults::PLACEHOLDER_API_KEY,
            None => false,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .field("paraphrase_model", &self.paraphrase_model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Request budgets
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_day: u32,
    pub per_hour: u32,
    pub transcribe_per_minute: u32,
    pub paraphrase_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_day: defaults::RATE_LIMIT_PER_DAY,
            per_hour: defaults::RATE_LIMIT_PER_HOUR,
            transcribe_per_minute: defaults::TRANSCRIBE_PER_MINUTE,
            paraphrase_per_minute: defaults::PARAPHRASE_PER_MINUTE,
        }
    }
}

/// Complete application configuration, resolved once at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub handler: HandlerConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    /// Configured API credentials; `None` when either half is missing
    pub credentials: Option<Credentials>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

impl AppConfig {
    /// Resolve the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(lookup("APP_ENV").as_deref());

        let server = ServerConfig {
            host: lookup("VOICE_API_HOST").unwrap_or_else(|| environment.default_host().to_string()),
            port: parse_or(&lookup, "VOICE_API_PORT", environment.default_port()),
            workers: match parse_or(&lookup, "HTTP_WORKER_NUMBER", 0usize) {
                0 => num_cpus::get() * 2 + 1,
                n => n,
            },
        };

        let handler = HandlerConfig {
            temp_dir: lookup("VOICE_API_TEMP_DIR").unwrap_or_else(|| defaults::TEMP_DIR.to_string()),
            max_file_size: parse_or(&lookup, "MAX_FILE_SIZE", defaults::MAX_FILE_SIZE),
            paraphrase_log_file: lookup("PARAPHRASE_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::PARAPHRASE_LOG_FILE)),
            audio_converter: lookup("AUDIO_CONVERTER_CMD")
                .unwrap_or_else(|| defaults::AUDIO_CONVERTER.to_string()),
        };

        let provider = ProviderConfig {
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url: lookup("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| defaults::OPENAI_BASE_URL.to_string()),
            transcription_model: lookup("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| defaults::TRANSCRIPTION_MODEL.to_string()),
            paraphrase_model: lookup("PARAPHRASE_MODEL")
                .unwrap_or_else(|| defaults::PARAPHRASE_MODEL.to_string()),
            temperature: parse_or(&lookup, "PARAPHRASE_TEMPERATURE", defaults::PARAPHRASE_TEMPERATURE),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "OPENAI_TIMEOUT_SECONDS",
                defaults::PROVIDER_TIMEOUT_SECONDS,
            )),
        };

        let rate_limit = RateLimitConfig {
            enabled: parse_or(&lookup, "ENABLE_RATE_LIMITING", true),
            per_day: parse_or(&lookup, "RATE_LIMIT_PER_DAY", defaults::RATE_LIMIT_PER_DAY),
            per_hour: parse_or(&lookup, "RATE_LIMIT_PER_HOUR", defaults::RATE_LIMIT_PER_HOUR),
            transcribe_per_minute: parse_or(
                &lookup,
                "TRANSCRIBE_RATE_LIMIT_PER_MINUTE",
                defaults::TRANSCRIBE_PER_MINUTE,
            ),
            paraphrase_per_minute: parse_or(
                &lookup,
                "PARAPHRASE_RATE_LIMIT_PER_MINUTE",
                defaults::PARAPHRASE_PER_MINUTE,
            ),
        };

        let credentials = match (lookup("API_USERNAME"), lookup("API_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(Credentials { username, password })
            }
            _ => None,
        };

        Self {
            environment,
            server,
            handler,
            provider,
            rate_limit,
            credentials,
        }
    }
}

/// Parse a variable, warning and falling back to `default` when it is malformed
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value for {}: '{}'. Using default", key, raw);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn production_is_the_default_mode() {
        let config = config_from(&[]);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert!(config.server.workers >= 3);
        assert!(config.credentials.is_none());
        assert!(!config.provider.is_configured());
    }

    #[test]
    fn development_mode_binds_all_interfaces() {
        let config = config_from(&[("APP_ENV", "development")]);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.environment.default_log_filter(), "debug");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config_from(&[
            ("VOICE_API_PORT", "9090"),
            ("HTTP_WORKER_NUMBER", "4"),
            ("OPENAI_BASE_URL", "http://localhost:1234/v1/"),
            ("TRANSCRIBE_RATE_LIMIT_PER_MINUTE", "3"),
            ("ENABLE_RATE_LIMITING", "false"),
            ("API_USERNAME", "alice"),
            ("API_PASSWORD", "s3cret"),
        ]);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.provider.base_url, "http://localhost:1234/v1");
        assert_eq!(config.rate_limit.transcribe_per_minute, 3);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.credentials, Some(Credentials::new("alice", "s3cret")));
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let config = config_from(&[("VOICE_API_PORT", "eighty"), ("MAX_FILE_SIZE", "-1")]);
        assert_eq!(config.server.port, defaults::PROD_PORT);
        assert_eq!(config.handler.max_file_size, defaults::MAX_FILE_SIZE);
    }

    #[test]
    fn placeholder_api_key_is_not_configured() {
        let config = config_from(&[("OPENAI_API_KEY", "your_openai_api_key")]);
        assert!(!config.provider.is_configured());

        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]);
        assert!(config.provider.is_configured());
    }

    #[test]
    fn credentials_debug_output_hides_password() {
        let rendered = format!("{:?}", Credentials::new("alice", "s3cret"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }
}
