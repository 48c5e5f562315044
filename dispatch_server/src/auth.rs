//! Identity for incoming requests.
//!
//! The auth collaborator issues HS256 tokens carrying `userId`, `role` and `exp`. The server only verifies them, with
//! the shared secret from [`AuthConfig`]. Tokens are read from the `Authorization: Bearer` header, or failing that,
//! from the `token` cookie.
use std::{
    future::{ready, Ready},
    pin::Pin,
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error,
    FromRequest,
    HttpMessage,
    HttpRequest,
};
use chrono::{DateTime, Utc};
use dispatch_engine::db_types::{Role, UserId};
use futures::Future;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    pub user_id: UserId,
    pub role: Role,
    /// Expiry, in seconds since the Unix epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(user_id: UserId, role: Role, expires_at: DateTime<Utc>) -> Self {
        Self { user_id, role, exp: expires_at.timestamp() }
    }
}

/// Verifies access tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.key, &self.validation).map(|data| data.claims).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }
}

/// Signs tokens with the shared secret. The server never issues tokens itself; this exists for tooling and tests.
pub fn issue_token(config: &AuthConfig, claims: &JwtClaims) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Pulls the raw token out of the request, preferring the `Authorization` header over the cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    from_header.or_else(|| req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()).filter(|t| !t.is_empty()))
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or(ServerError::AuthenticationError(AuthError::MissingToken));
        ready(claims)
    }
}

//-------------------------------------------  JwtMiddleware  ----------------------------------------------------------
/// Authenticates every request in the scope it wraps. Valid claims are stored in the request extensions, where the
/// ACL middleware and the [`JwtClaims`] extractor pick them up. Anything else is answered with a 401.
pub struct JwtMiddlewareFactory {
    verifier: Rc<TokenVerifier>,
}

impl JwtMiddlewareFactory {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier: Rc::new(verifier) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { verifier: Rc::clone(&self.verifier), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    verifier: Rc<TokenVerifier>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verifier = Rc::clone(&self.verifier);
        Box::pin(async move {
            let token = extract_token(req.request()).ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
            let claims = verifier.verify(&token).map_err(|e| {
                debug!("💻️ Rejecting request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("💻️ Authenticated {} #{}", claims.role, claims.user_id);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
