//! Caller identity: credential verification, token issuance and password hashing.
//! Keep the public surface thin and split implementation across sub-modules.

mod subject;
mod token;
mod verifier;
mod password;

pub use subject::Subject;
pub use token::{Claims, TokenMaker, TokenType, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
pub use verifier::{bearer_token, AuthenticationVerifier, AuthnError, JwtVerifier};
pub use password::{hash_password, verify_password};
