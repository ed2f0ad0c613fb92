// Voice Notes API HTTP handlers
//
// This module contains the HTTP handlers for the Voice Notes API and wires them into an
// actix-web application together with the authentication and rate limiting middleware.

pub mod authentication;
pub mod form;
pub mod rate_limiting;
pub mod request_trace;
pub mod routes;

#[cfg(test)]
mod tests;

use actix_web::{dev::HttpServiceFactory, error::JsonPayloadError, web, Route};

use crate::error::HandlerError;
use crate::state::AppContext;

// Re-export handlers for easier access
pub use self::routes::{
    index, method_not_allowed, not_found, paraphrase, paraphrase_logs, paraphrase_logs_summary,
    transcribe,
};
// Re-export middleware
pub use self::authentication::Authentication;
pub use self::rate_limiting::RateLimiting;
pub use self::request_trace::{RequestId, RequestTrace};

/// Register the API on an application
///
/// Every documented endpoint requires Basic credentials and is rate limited; authentication
/// wraps rate limiting so that accounting is keyed by username. Unmatched paths fall through
/// to a JSON 404 without either check.
pub fn configure(ctx: AppContext) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(json_config())
            .app_data(query_config())
            .service(protected("/", web::get().to(index), &ctx))
            .service(protected(
                "/api/v1/transcribe",
                web::post().to(transcribe),
                &ctx,
            ))
            .service(protected(
                "/api/v1/paraphrase",
                web::post().to(paraphrase),
                &ctx,
            ))
            .service(protected(
                "/api/v1/paraphrase_logs",
                web::get().to(paraphrase_logs),
                &ctx,
            ))
            .service(protected(
                "/api/v1/paraphrase_logs/summary",
                web::get().to(paraphrase_logs_summary),
                &ctx,
            ))
            .app_data(web::Data::new(ctx))
            .default_service(web::to(not_found));
    }
}

/// A single authenticated, rate-limited endpoint; other methods get a JSON 405
fn protected(path: &str, route: Route, ctx: &AppContext) -> impl HttpServiceFactory + 'static {
    web::resource(path)
        .route(route)
        .default_service(web::to(method_not_allowed))
        .wrap(RateLimiting::new(ctx.rate_limiter.clone()))
        .wrap(Authentication::new(ctx.credentials.clone()))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = match err {
            JsonPayloadError::ContentType => String::from("Request must be JSON"),
            other => format!("Invalid JSON body: {}", other),
        };
        HandlerError::validation(message).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        HandlerError::validation(format!("Invalid query parameters: {}", err)).into()
    })
}
