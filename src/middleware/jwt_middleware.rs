/// JWT Authentication Middleware
///
/// Verifies the bearer access token and injects its `Claims` into request
/// extensions for use by route handlers. Refresh tokens are rejected here.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::TokenCodec;
use crate::error::AuthError;

pub struct JwtMiddleware {
    codec: TokenCodec,
}

impl JwtMiddleware {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    codec: TokenCodec,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                return Box::pin(async { Err(AuthError::InvalidToken.into()) });
            }
        };

        match self.codec.verify_access(&token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.user_id, "Access token validated");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Access token rejected");
                Box::pin(async { Err(AuthError::InvalidToken.into()) })
            }
        }
    }
}
