use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, ResponseError,
};
use futures::future::{ok, Ready};
use futures::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::ServiceError;

/// Paths reachable without a key.
const OPEN_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Rejects requests that do not carry the configured API key with 403.
///
/// The key is taken from the configured header, or from `Authorization`
/// holding the raw key.
#[derive(Clone)]
pub struct AuthMiddleware {
    config: Arc<ApiKeyGate>,
}

pub struct ApiKeyGate {
    api_key: String,
    header: String,
}

impl ApiKeyGate {
    fn accepts(&self, req: &ServiceRequest) -> bool {
        [self.header.as_str(), AUTHORIZATION.as_str()]
            .iter()
            .filter_map(|name| req.headers().get(*name))
            .filter_map(|value| value.to_str().ok())
            .any(|candidate| constant_time_eq(candidate.trim().as_bytes(), self.api_key.as_bytes()))
    }
}

impl AuthMiddleware {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: Arc::new(ApiKeyGate {
                api_key: config.api_key.clone(),
                header: config.header.to_ascii_lowercase(),
            }),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareMiddleware {
            service: Rc::new(service),
            gate: self.config.clone(),
        })
    }
}

pub struct AuthMiddlewareMiddleware<S> {
    service: Rc<S>,
    gate: Arc<ApiKeyGate>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            // CORS preflight, probes and valid keys pass through
            if req.method() == actix_web::http::Method::OPTIONS
                || OPEN_PATHS.contains(&req.path())
                || gate.accepts(&req)
            {
                return srv.call(req).await.map(ServiceResponse::map_into_left_body);
            }

            warn!(path = %req.path(), "Rejected request with missing or invalid API key");
            let response = ServiceError::Authentication.error_response();
            Ok(req.into_response(response).map_into_right_body())
        })
    }
}
