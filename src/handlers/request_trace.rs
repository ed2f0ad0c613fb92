// Request tracing middleware for Voice Notes API
//
// Gives every request an identifier, logs when it starts and how it ended, and echoes the
// identifier in the `X-Request-Id` response header. Inner middleware renders its own
// rejections, so errors reaching this layer are only logged and passed on.

use std::fmt;
use std::time::Instant;

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    http::StatusCode,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use chrono::Local;
use futures::future::{ok, LocalBoxFuture, Ready};
use log::{error, info, warn};
use uuid::Uuid;

/// The header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identifier of a single request, `YYYYMMDDHHMMSS-xxxxxxxx`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string();
        RequestId(format!(
            "{}-{}",
            Local::now().format("%Y%m%d%H%M%S"),
            &random[..8]
        ))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handlers receive the identifier assigned by [`RequestTrace`], or a fresh one when the
/// middleware is not installed.
impl FromRequest for RequestId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate))
    }
}

fn log_completion(
    request_id: &RequestId,
    method: &str,
    path: &str,
    started: Instant,
    status: StatusCode,
) {
    let duration = started.elapsed().as_secs_f64();
    if status.is_server_error() {
        error!(
            "[{}] Completed {} {}. Duration: {:.2}s, Status: {}",
            request_id, method, path, duration, status.as_u16()
        );
    } else if status.is_client_error() {
        warn!(
            "[{}] Completed {} {}. Duration: {:.2}s, Status: {}",
            request_id, method, path, duration, status.as_u16()
        );
    } else {
        info!(
            "[{}] Completed {} {}. Duration: {:.2}s, Status: {}",
            request_id, method, path, duration, status.as_u16()
        );
    }
}

/// Middleware factory for request tracing
#[derive(Debug, Clone, Default)]
pub struct RequestTrace;

impl<S, B> Transform<S, ServiceRequest> for RequestTrace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestTraceMiddleware { service })
    }
}

/// Request tracing middleware implementation
pub struct RequestTraceMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestTraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = RequestId::generate();
        req.extensions_mut().insert(request_id.clone());

        let method = req.method().to_string();
        let path = req.path().to_string();
        info!("[{}] Starting {} {}", request_id, method, path);

        let started = Instant::now();
        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(mut response) => {
                    log_completion(&request_id, &method, &path, started, response.status());
                    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
                        response
                            .headers_mut()
                            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                    }
                    Ok(response)
                }
                Err(err) => {
                    let status = err.as_response_error().status_code();
                    log_completion(&request_id, &method, &path, started, status);
                    Err(err)
                }
            }
        })
    }
}
