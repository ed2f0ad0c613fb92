// Authentication middleware for Voice Notes API
//
// This module provides HTTP Basic authentication for the protected routes.
// The credential check itself is a plain function so it can be tested without HTTP.
// On success the username is stored in the request extensions for the rate limiter.

use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};

use crate::config::Credentials;
use crate::error::HandlerError;

/// Username of an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// True when `provided` matches the configured credentials
///
/// Always false when no credentials are configured.
pub fn check_credentials(configured: Option<&Credentials>, provided: &Credentials) -> bool {
    match configured {
        Some(expected) => {
            constant_time_eq(expected.username.as_bytes(), provided.username.as_bytes())
                & constant_time_eq(expected.password.as_bytes(), provided.password.as_bytes())
        }
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Decode a `Basic <base64(user:password)>` header value
pub fn parse_basic_authorization(value: &str) -> Option<Credentials> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials::new(username, password))
}

/// Encode credentials as an `Authorization` header value
pub fn encode_basic_authorization(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Middleware factory for authentication
#[derive(Clone)]
pub struct Authentication {
    credentials: Option<Arc<Credentials>>,
}

impl Authentication {
    pub fn new(credentials: Option<Arc<Credentials>>) -> Self {
        Self { credentials }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware {
            service,
            credentials: self.credentials.clone(),
        })
    }
}

/// Authentication middleware implementation
pub struct AuthenticationMiddleware<S> {
    service: S,
    credentials: Option<Arc<Credentials>>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
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
        match authenticate(&req, self.credentials.as_deref()) {
            Ok(username) => {
                debug!("Authenticated request from {}", username);
                req.extensions_mut().insert(AuthenticatedUser(username));
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(error) => {
                let response = req.error_response(error).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Authenticate a request by checking the Authorization header
fn authenticate(
    req: &ServiceRequest,
    configured: Option<&Credentials>,
) -> Result<String, HandlerError> {
    let Some(auth_header) = req.headers().get(header::AUTHORIZATION) else {
        warn!("Missing Authorization header on {}", req.path());
        return Err(HandlerError::Unauthorized);
    };

    let Some(provided) = auth_header.to_str().ok().and_then(parse_basic_authorization) else {
        warn!("Malformed Authorization header on {}", req.path());
        return Err(HandlerError::Unauthorized);
    };

    if check_credentials(configured, &provided) {
        Ok(provided.username)
    } else {
        warn!(
            "Rejected credentials for user '{}' on {}",
            provided.username,
            req.path()
        );
        Err(HandlerError::Unauthorized)
    }
}
