//! Bearer token access gate
//!
//! Tokens are HMAC-signed JWTs verified against a shared secret. The gate is
//! applied as a route layer, so every route behind it is checked the same way.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
///
/// Only `exp` has meaning to the gate; everything else is passed through to
/// handlers via request extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Access gate failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable `Authorization` header
    #[error("no token provided")]
    MissingToken,
    /// Token present but rejected
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Token could not be signed
    #[error("token generation failed: {0}")]
    TokenGeneration(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "Access Denied: No token provided.")
            }
            AuthError::InvalidToken(reason) => {
                tracing::debug!("Rejected token: {}", reason);
                (StatusCode::FORBIDDEN, "Access Denied: Invalid or expired token.")
            }
            AuthError::TokenGeneration(reason) => {
                tracing::error!("Token generation failed: {}", reason);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        };
        (status, message).into_response()
    }
}

/// Verifies bearer tokens signed with a shared secret
#[derive(Clone)]
pub struct AccessGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AccessGate {
    /// Create a gate for tokens signed with `secret`
    ///
    /// HS256, HS384 and HS512 are accepted. `exp` is enforced when present
    /// but not required.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a raw token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify the value of an `Authorization` header
    pub fn verify_header(&self, value: Option<&str>) -> Result<Claims, AuthError> {
        let value = value.ok_or(AuthError::MissingToken)?;
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or(AuthError::MissingToken)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if !scheme.eq_ignore_ascii_case("Bearer") {
            return Err(AuthError::InvalidToken(format!("unsupported scheme {}", scheme)));
        }
        self.verify(token)
    }

    /// Sign a token for `subject` valid for `ttl`
    ///
    /// The server never hands tokens out itself; this is for operators and
    /// tests that need a token the gate accepts.
    pub fn issue_token(&self, subject: &str, ttl: chrono::Duration) -> Result<String, AuthError> {
        let now = chrono::Utc::now();
        let exp = (now + ttl).timestamp();
        let claims = Claims {
            sub: Some(subject.to_string()),
            exp: Some(u64::try_from(exp).map_err(|e| AuthError::TokenGeneration(e.to_string()))?),
            iat: Some(now.timestamp().max(0) as u64),
            extra: serde_json::Map::new(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }
}

/// Route layer rejecting requests without a valid bearer token
///
/// Verified claims are inserted into the request extensions.
pub async fn require_bearer(
    State(gate): State<Arc<AccessGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let claims = gate.verify_header(header)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
