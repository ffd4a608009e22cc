//! Service configuration: optional JSON file, then environment overrides, then validation.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};

pub const DEFAULT_CONFIG_PATH: &str = "./configs/config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: String,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { http_addr: "0.0.0.0:8000".into(), request_timeout_ms: 5_000 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self { secret: String::new(), access_ttl_secs: ACCESS_TOKEN_TTL.as_secs(), refresh_ttl_secs: REFRESH_TOKEN_TTL.as_secs() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Push registry-declared role grants into the policy store at boot.
    pub auto_sync: bool,
    /// JSON policy store; volatile in-memory engine when unset.
    pub policy_path: Option<String>,
    /// JSON operation manifest; the built-in service catalog when unset.
    pub manifest_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub authz: AuthzConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `--conf <path>` or `--conf=<path>` from a binary's argument list.
pub fn conf_path_from_args(args: &[String]) -> Option<PathBuf> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--conf" && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        if let Some(v) = args[i].strip_prefix("--conf=") {
            return Some(PathBuf::from(v));
        }
        i += 1;
    }
    None
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Load `path` (or the default path when it exists) and apply env overrides, without validation.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// [`Config::resolve`] followed by the full server validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = Self::resolve(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_nonempty("WARDEN_HTTP_ADDR") { self.server.http_addr = v; }
        if let Some(v) = env_nonempty("WARDEN_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) { self.server.request_timeout_ms = v; }
        if let Some(v) = env_nonempty("WARDEN_JWT_SECRET") { self.auth.jwt.secret = v; }
        if let Some(v) = env_nonempty("WARDEN_AUTHZ_AUTO_SYNC").and_then(|v| parse_bool(&v)) { self.authz.auto_sync = v; }
        if let Some(v) = env_nonempty("WARDEN_POLICY_PATH") { self.authz.policy_path = Some(v); }
        if let Some(v) = env_nonempty("WARDEN_MANIFEST_PATH") { self.authz.manifest_path = Some(v); }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt.secret must be set".into()));
        }
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!("server.http_addr '{}' is not a socket address", self.server.http_addr)));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("server.request_timeout_ms must be positive".into()));
        }
        if self.auth.jwt.access_ttl_secs == 0 || self.auth.jwt.refresh_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token TTLs must be positive".into()));
        }
        Ok(())
    }

    /// Checks for the sync command, which needs a policy store but never signs or serves.
    pub fn validate_sync(&self) -> Result<(), ConfigError> {
        match self.authz.policy_path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Ok(()),
            _ => Err(ConfigError::Invalid("authz.policy_path (or WARDEN_POLICY_PATH) must point at the policy store to sync into".into())),
        }
    }

    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.server.request_timeout_ms) }
    pub fn access_ttl(&self) -> Duration { Duration::from_secs(self.auth.jwt.access_ttl_secs) }
    pub fn refresh_ttl(&self) -> Duration { Duration::from_secs(self.auth.jwt.refresh_ttl_secs) }
}
