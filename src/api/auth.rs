//! Signed bearer tokens.
//!
//! A token is `base64url(claims).hex(hmac_sha256(secret, base64url(claims)))`
//! where the claims are `{"sub": <user uuid>, "iat": <secs>, "exp": <secs>}`.
//! Tokens are stateless: nothing is stored server side.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use chrono::Duration;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::AppState;
use crate::clock::Clock;
use crate::error::ServerError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header is missing")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token secret must not be empty")]
    InvalidKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenSigner {
    mac: HmacSha256,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidKey);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidKey)?;
        Ok(Self { mac, ttl, clock })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn issue(&self, user_id: Uuid) -> String {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            // Saturates instead of overflowing past the calendar's end
            exp: now
                .checked_add_signed(self.ttl)
                .map_or(i64::MAX, |exp| exp.timestamp()),
        };
        // Serializing a struct of plain fields cannot fail
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = BASE64.encode(json);
        let signature = self.sign(&payload);
        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let json = BASE64.decode(payload).map_err(|_| AuthError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Verify an `Authorization` header value
    pub fn verify_bearer(&self, header: &str) -> Result<Claims, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::Malformed)?;
        self.verify(token.trim())
    }
}

/// The authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or(AuthError::Missing)?
            .to_str()
            .map_err(|_| AuthError::Malformed)?;

        let claims = state.tokens.verify_bearer(header)?;
        Ok(AuthUser(claims.sub))
    }
}
