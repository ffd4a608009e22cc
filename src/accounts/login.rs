use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::users::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::identity::{verify_password, TokenMaker};
use crate::tprintln;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginReply {
    pub id: String,
    pub email: String,
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Password login issuing an access/refresh token pair bound to a fresh session id.
pub struct AuthService {
    users: Arc<UserDirectory>,
    tokens: Arc<TokenMaker>,
}

impl AuthService {
    pub fn new(users: Arc<UserDirectory>, tokens: Arc<TokenMaker>) -> Self { Self { users, tokens } }

    pub fn login(&self, req: &LoginRequest) -> AppResult<LoginReply> {
        // Same error for unknown email and wrong password.
        let invalid = || AppError::unauthorized("invalid_credentials", "invalid email or password");
        let user = self.users.find_by_email(&req.email).ok_or_else(invalid)?;
        if !verify_password(&user.password_hash, &req.password) {
            return Err(invalid());
        }
        let session_id = Uuid::new_v4();
        let access_token = self.tokens.create_access_token(&user.id, &session_id)?;
        let refresh_token = self.tokens.create_refresh_token(&user.id, &session_id)?;
        tprintln!("auth.login user={} sid={}", user.id, session_id);
        Ok(LoginReply { id: user.id.to_string(), email: user.email, name: user.name, access_token, refresh_token })
    }
}
