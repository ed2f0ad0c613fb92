// Rate limiting middleware for Voice Notes API
//
// Charges each request against the budgets of its identity: the authenticated username when
// the authentication middleware ran first, else the caller address.

use std::sync::Arc;
use std::time::Instant;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::warn;

use crate::error::HandlerError;
use crate::handlers::authentication::AuthenticatedUser;
use crate::rate_limit::RateLimiter;

/// Key used for rate-limit accounting
pub fn request_identity(req: &ServiceRequest) -> String {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user.0);
    }
    match req.peer_addr() {
        Some(addr) => format!("addr:{}", addr.ip()),
        None => String::from("addr:unknown"),
    }
}

/// Middleware factory for rate limiting
#[derive(Clone)]
pub struct RateLimiting {
    limiter: Arc<RateLimiter>,
}

impl RateLimiting {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiting
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitingMiddleware {
            service,
            limiter: self.limiter.clone(),
        })
    }
}

/// Rate limiting middleware implementation
pub struct RateLimitingMiddleware<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = request_identity(&req);
        match self
            .limiter
            .check_budget(&identity, req.path(), Instant::now())
        {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(exceeded) => {
                warn!(
                    "Rate limit exceeded for {} on {}: {}",
                    identity,
                    req.path(),
                    exceeded
                );
                let response = req
                    .error_response(HandlerError::from(exceeded))
                    .map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}
