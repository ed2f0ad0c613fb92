use std::time::{Duration, Instant};

use actix_web::{middleware::Logger, App, HttpServer};
use env_logger::Env;
use log::{debug, error, info, warn};

use voice_notes_api::config::AppConfig;
use voice_notes_api::config_loader::load_config;
use voice_notes_api::handlers::{configure, RequestTrace};
use voice_notes_api::state::AppContext;

const CLIENT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(180);
const KEEP_ALIVE: Duration = Duration::from_secs(180);
const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // The configuration file only seeds variables, so it must be read before anything else
    let loaded_file = load_config();
    let config = AppConfig::default();

    env_logger::Builder::from_env(
        Env::default().default_filter_or(config.environment.default_log_filter()),
    )
    .init();

    if loaded_file {
        info!("Configuration file applied");
    }
    if config.credentials.is_none() {
        warn!("API_USERNAME/API_PASSWORD not set: every protected request will be rejected");
    }
    if !config.provider.is_configured() {
        warn!("OPENAI_API_KEY not set: transcription and paraphrasing will fail");
    }

    if let Err(e) = config.handler.ensure_temp_dir() {
        warn!(
            "Failed to create temp directory {}: {}",
            config.handler.temp_dir, e
        );
    }

    let ctx = AppContext::from_config(&config).map_err(|e| {
        error!("Failed to initialize the provider client: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Expired rate-limit counters are dropped periodically
    if ctx.rate_limiter.is_enabled() {
        let limiter = ctx.rate_limiter.clone();
        actix_web::rt::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                let purged = limiter.purge_expired(Instant::now());
                if purged > 0 {
                    debug!("Purged {} expired rate limit counters", purged);
                }
            }
        });
    }

    info!(
        "Starting Voice Notes API ({}) on http://{}:{}",
        config.environment, config.server.host, config.server.port
    );
    info!("Using temp directory: {}", config.handler.temp_dir);
    info!(
        "Paraphrase log: {}",
        config.handler.paraphrase_log_file.display()
    );
    info!(
        "Models: transcription={}, paraphrase={}",
        config.provider.transcription_model, config.provider.paraphrase_model
    );
    info!("HTTP workers: {}", config.server.workers);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTrace)
            .wrap(Logger::default())
            .configure(configure(ctx.clone()))
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .client_disconnect_timeout(CLIENT_DISCONNECT_TIMEOUT)
    .keep_alive(KEEP_ALIVE)
    .run()
    .await
}
