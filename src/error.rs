//! Unified application error model and mapping helpers.
//! This module provides the kind-tagged rejection returned across the service boundary
//! (HTTP today, RPC-style dispatchers in general), along with helper mappers to status codes.
//! Underlying library errors never cross the boundary: only the kind, a short code and a
//! human-readable message do.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    Internal { code: String, message: String },
    Canceled { code: String, message: String },
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
}

/// Coarse classification of an [`AppError`], used by callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    Internal,
    Canceled,
    UserInput,
    NotFound,
    Conflict,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized { .. } => ErrorKind::Unauthorized,
            AppError::Forbidden { .. } => ErrorKind::Forbidden,
            AppError::Internal { .. } => ErrorKind::Internal,
            AppError::Canceled { .. } => ErrorKind::Canceled,
            AppError::UserInput { .. } => ErrorKind::UserInput,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub fn code_str(&self) -> &str {
        match self {
            AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Internal { code, .. }
            | AppError::Canceled { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Internal { message, .. }
            | AppError::Canceled { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. } => message.as_str(),
        }
    }

    pub fn unauthorized<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn forbidden<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }
    pub fn canceled<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Canceled { code: code.into(), message: msg.into() } }
    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code. Canceled uses the de-facto 499 "client closed request".
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthorized { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Internal { .. } => 500,
            AppError::Canceled { .. } => 499,
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
        }
    }

    /// RPC mapping: gRPC status code number for RPC-style transports.
    pub fn rpc_code(&self) -> u32 {
        match self {
            AppError::Unauthorized { .. } => 16, // unauthenticated
            AppError::Forbidden { .. } => 7,     // permission_denied
            AppError::Internal { .. } => 13,     // internal
            AppError::Canceled { .. } => 1,      // cancelled
            AppError::UserInput { .. } => 3,     // invalid_argument
            AppError::NotFound { .. } => 5,      // not_found
            AppError::Conflict { .. } => 6,      // already_exists
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless a typed error was mapped earlier.
        // The chain is logged, never returned.
        tracing::error!(error = %format!("{:#}", err), "internal error");
        AppError::Internal { code: "internal_error".into(), message: "internal error".into() }
    }
}
