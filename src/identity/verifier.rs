use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{DecodingKey, Validation};

use super::subject::Subject;
use super::token::{decoding_key, validation, Claims, TokenType};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthnError {
    #[error("missing bearer credential")]
    Missing,
    #[error("malformed credential: {0}")]
    Malformed(String),
    #[error("credential expired")]
    Expired,
    #[error("refresh token cannot be used as an access credential")]
    WrongType,
    #[error("credential carries no subject")]
    NoSubject,
}

/// Only a fixed reason crosses the boundary; the `Malformed` detail stays in logs.
impl From<AuthnError> for AppError {
    fn from(e: AuthnError) -> Self {
        let (code, message) = match e {
            AuthnError::Missing => ("missing_token", "missing bearer credential"),
            AuthnError::Malformed(_) => ("invalid_token", "invalid token"),
            AuthnError::Expired => ("token_expired", "token expired"),
            AuthnError::WrongType => ("wrong_token_type", "refresh token cannot be used as an access credential"),
            AuthnError::NoSubject => ("no_subject", "token has no subject"),
        };
        AppError::unauthorized(code, message)
    }
}

/// Extracts and validates a caller's identity assertion.
///
/// `assertion` is the raw credential as carried by the transport (for HTTP, the
/// `Authorization` header value). Implementations are expected to be local and CPU bound.
pub trait AuthenticationVerifier: Send + Sync {
    fn verify(&self, assertion: Option<&str>) -> Result<Subject, AuthnError>;
}

/// Strip the `Bearer` scheme (case-insensitive) from a header value.
pub fn bearer_token(assertion: Option<&str>) -> Result<&str, AuthnError> {
    let raw = assertion.map(str::trim).filter(|s| !s.is_empty()).ok_or(AuthnError::Missing)?;
    let (scheme, token) = raw.split_once(' ').ok_or_else(|| AuthnError::Malformed("expected 'Bearer <token>'".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthnError::Malformed(format!("unsupported scheme '{}'", scheme)));
    }
    let token = token.trim();
    if token.is_empty() { return Err(AuthnError::Missing); }
    Ok(token)
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self { Self::with_leeway(secret, 5) }

    pub fn with_leeway(secret: &str, leeway_secs: u64) -> Self {
        Self { key: decoding_key(secret), validation: validation(leeway_secs) }
    }
}

impl AuthenticationVerifier for JwtVerifier {
    fn verify(&self, assertion: Option<&str>) -> Result<Subject, AuthnError> {
        let token = bearer_token(assertion)?;
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => AuthnError::Expired,
            _ => AuthnError::Malformed(e.to_string()),
        })?;
        if data.claims.typ == Some(TokenType::Refresh) {
            return Err(AuthnError::WrongType);
        }
        let sub = data.claims.sub.trim();
        if sub.is_empty() { return Err(AuthnError::NoSubject); }
        Ok(Subject::new(sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::token::TokenMaker;
    use uuid::Uuid;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(None), Err(AuthnError::Missing));
        assert_eq!(bearer_token(Some("   ")), Err(AuthnError::Missing));
        assert_eq!(bearer_token(Some("bearer abc")), Ok("abc"));
        assert!(matches!(bearer_token(Some("Basic abc")), Err(AuthnError::Malformed(_))));
        assert!(matches!(bearer_token(Some("abc")), Err(AuthnError::Malformed(_))));
    }

    #[test]
    fn access_token_yields_subject() {
        let maker = TokenMaker::with_defaults(SECRET);
        let uid = Uuid::new_v4();
        let tok = maker.create_access_token(&uid, &Uuid::new_v4()).unwrap();
        let sub = JwtVerifier::new(SECRET).verify(Some(&format!("Bearer {}", tok))).unwrap();
        assert_eq!(sub.as_str(), uid.to_string());
    }

    #[test]
    fn refresh_token_and_foreign_signature_rejected() {
        let maker = TokenMaker::with_defaults(SECRET);
        let tok = maker.create_refresh_token(&Uuid::new_v4(), &Uuid::new_v4()).unwrap();
        let v = JwtVerifier::new(SECRET);
        assert_eq!(v.verify(Some(&format!("Bearer {}", tok))), Err(AuthnError::WrongType));
        let other = TokenMaker::with_defaults("another-secret").create_access_token(&Uuid::new_v4(), &Uuid::new_v4()).unwrap();
        assert!(matches!(v.verify(Some(&format!("Bearer {}", other))), Err(AuthnError::Malformed(_))));
        assert!(matches!(v.verify(Some("Bearer not.a.jwt")), Err(AuthnError::Malformed(_))));
    }

    #[test]
    fn expired_and_subjectless_tokens_rejected() {
        let maker = TokenMaker::with_defaults(SECRET);
        let now = chrono::Utc::now().timestamp() as u64;
        let expired = Claims { sub: "alice".into(), sid: String::new(), typ: Some(TokenType::Access), exp: now - 3600, iat: now - 7200, nbf: now - 7200 };
        let v = JwtVerifier::new(SECRET);
        let tok = maker.sign(&expired).unwrap();
        assert_eq!(v.verify(Some(&format!("Bearer {}", tok))), Err(AuthnError::Expired));

        let anonymous = Claims { sub: String::new(), sid: String::new(), typ: Some(TokenType::Access), exp: now + 600, iat: now, nbf: now };
        let tok = maker.sign(&anonymous).unwrap();
        assert_eq!(v.verify(Some(&format!("Bearer {}", tok))), Err(AuthnError::NoSubject));
    }

    #[test]
    fn authn_errors_map_to_unauthorized() {
        for e in [AuthnError::Missing, AuthnError::Expired, AuthnError::NoSubject, AuthnError::WrongType] {
            assert_eq!(AppError::from(e).http_status(), 401);
        }
    }

    #[test]
    fn malformed_token_reason_is_fixed() {
        let err = JwtVerifier::new(SECRET).verify(Some("Bearer not.a.jwt")).unwrap_err();
        assert!(matches!(err, AuthnError::Malformed(_)));
        let rendered = serde_json::to_value(AppError::from(err)).unwrap();
        assert_eq!(rendered, serde_json::json!({"type": "unauthorized", "code": "invalid_token", "message": "invalid token"}));
    }
}
