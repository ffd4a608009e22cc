//! Access and refresh tokens (HS256 JWT).

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<TokenType>,
    pub exp: u64,
    pub iat: u64,
    pub nbf: u64,
}

impl Claims {
    pub fn issue(sub: &Uuid, sid: &Uuid, typ: TokenType, ttl: Duration) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Claims { sub: sub.to_string(), sid: sid.to_string(), typ: Some(typ), exp: now + ttl.as_secs(), iat: now, nbf: now }
    }
}

pub struct TokenMaker {
    key: EncodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenMaker {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { key: EncodingKey::from_secret(secret.as_bytes()), access_ttl, refresh_ttl }
    }

    pub fn with_defaults(secret: &str) -> Self { Self::new(secret, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL) }

    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| {
                tracing::error!(target: "authz", error = %e, "token signing failed");
                AppError::internal("token_error", "could not issue token")
            })
    }

    pub fn create_access_token(&self, user_id: &Uuid, session_id: &Uuid) -> AppResult<String> {
        self.sign(&Claims::issue(user_id, session_id, TokenType::Access, self.access_ttl))
    }

    pub fn create_refresh_token(&self, user_id: &Uuid, session_id: &Uuid) -> AppResult<String> {
        self.sign(&Claims::issue(user_id, session_id, TokenType::Refresh, self.refresh_ttl))
    }
}

pub(crate) fn decoding_key(secret: &str) -> DecodingKey { DecodingKey::from_secret(secret.as_bytes()) }

pub(crate) fn validation(leeway_secs: u64) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.leeway = leeway_secs;
    v.validate_exp = true;
    v.validate_nbf = true;
    // `sub` is checked by the verifier so a missing subject maps to its own error.
    v.set_required_spec_claims(&["exp"]);
    v
}
