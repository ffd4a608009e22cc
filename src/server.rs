//!
//! warden HTTP server
//! -------------------
//! This module defines the Axum-based HTTP surface for the bundled services. Every route path
//! is the RPC operation identifier (`/<package.Service>/<Method>`) so the same identifiers key
//! the permission registry and the router.
//!
//! Responsibilities:
//! - Startup: build and publish the permission registry, open the policy store, bootstrap an
//!   admin account, optionally run registry sync.
//! - Authorization layer in front of every operation route (lookup, authenticate, enforce).
//! - JSON handlers for the auth, user and authz services.
//! - Rendering `AppError` as a kind-tagged JSON rejection.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::{AuthService, LoginReply, LoginRequest, NewUser, User, UserDirectory, UserUpdate};
use crate::authz::{
    self, sync_from_registry, AuthorizationMiddleware, CallContext, Decision, ManifestFile, MemoryPolicyEngine,
    MetadataSource, PermissionManager, PermissionRegistry, PolicyEngine,
};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{JwtVerifier, Subject, TokenMaker};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserDirectory>,
    pub auth: Arc<AuthService>,
    pub permissions: PermissionManager,
    pub authz: Arc<AuthorizationMiddleware>,
    /// Upper bound on how long a call may wait for an authorization decision.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(cfg: &Config, registry: Arc<PermissionRegistry>, engine: Arc<dyn PolicyEngine>) -> Self {
        let secret = cfg.auth.jwt.secret.as_str();
        let tokens = Arc::new(TokenMaker::new(secret, cfg.access_ttl(), cfg.refresh_ttl()));
        let users = Arc::new(UserDirectory::new());
        let authz = Arc::new(AuthorizationMiddleware::new(registry, Arc::new(JwtVerifier::new(secret)), engine.clone()));
        Self {
            auth: Arc::new(AuthService::new(users.clone(), tokens)),
            users,
            permissions: PermissionManager::new(engine),
            authz,
            request_timeout: cfg.request_timeout(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the `AppError` shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct AppJson<T>(T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "rejected request body");
        match rejection {
            JsonRejection::JsonDataError(_) => AppError::user("bad_request_body", "request body does not match the expected shape"),
            JsonRejection::JsonSyntaxError(_) => AppError::user("bad_request_body", "request body is not valid JSON"),
            JsonRejection::MissingJsonContentType(_) => AppError::user("bad_request_body", "expected an application/json body"),
            _ => AppError::user("bad_request_body", "request body could not be read"),
        }
    }
}

/// The verified caller, absent when the operation is public.
struct Caller(Option<Subject>);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<Subject>().cloned()))
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(s) => write!(f, "{}", s),
            None => f.write_str("anonymous"),
        }
    }
}

/// Metadata source selected by config: a manifest file, or the compiled-in service catalog.
pub fn metadata_source(cfg: &Config) -> Box<dyn MetadataSource> {
    match &cfg.authz.manifest_path {
        Some(p) => Box::new(ManifestFile::new(p)),
        None => Box::new(authz::service_catalog()),
    }
}

/// Policy engine selected by config: file-backed when `authz.policy_path` is set.
pub fn open_engine(cfg: &Config) -> anyhow::Result<Arc<MemoryPolicyEngine>> {
    match &cfg.authz.policy_path {
        Some(p) => {
            let engine = MemoryPolicyEngine::open(Path::new(p)).with_context(|| format!("While opening policy store: {}", p))?;
            Ok(Arc::new(engine))
        }
        None => {
            warn!(target: "startup", "authz.policy_path not set; policies are kept in memory only");
            Ok(Arc::new(MemoryPolicyEngine::new()))
        }
    }
}

/// Create the configured admin account (if missing) and assign it role `admin`.
pub async fn bootstrap_admin(cfg: &Config, state: &AppState) -> AppResult<()> {
    let Some(admin) = &cfg.bootstrap_admin else { return Ok(()); };
    let user = match state.users.find_by_email(&admin.email) {
        Some(u) => u,
        None => state.users.create(NewUser { name: admin.name.clone(), email: admin.email.clone(), password: admin.password.clone() })?,
    };
    state.permissions.grant_role(&user.id.to_string(), "admin").await?;
    info!(target: "startup", user = %user.id, email = %user.email, "bootstrap admin ready");
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth.v1.AuthService/Login", post(login))
        .route("/user.v1.UserService/CreateUser", post(create_user))
        .route("/user.v1.UserService/UpdateUser", post(update_user))
        .route("/user.v1.UserService/DeleteUser", post(delete_user))
        .route("/user.v1.UserService/GetUser", post(get_user))
        .route("/user.v1.UserService/ListUser", post(list_user))
        .route("/authz.v1.AuthzService/GrantRole", post(grant_role))
        .route("/authz.v1.AuthzService/RevokeRole", post(revoke_role))
        .route("/authz.v1.AuthzService/GrantPermission", post(grant_permission))
        .route("/authz.v1.AuthzService/RevokePermission", post(revoke_permission))
        .route_layer(middleware::from_fn_with_state(state.clone(), authorize))
        .route("/healthz", get(|| async { "warden ok" }))
        .with_state(state)
}

/// Start the HTTP server with the given configuration and block until shutdown.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let registry = authz::global();
    let source = metadata_source(&cfg);
    registry.reload(source.as_ref()).context("While building the permission registry")?;

    let engine = open_engine(&cfg)?;
    let state = AppState::new(&cfg, registry.clone(), engine.clone());
    bootstrap_admin(&cfg, &state).await.context("While bootstrapping admin account")?;

    if cfg.authz.auto_sync {
        let report = sync_from_registry(&registry.snapshot(), engine.as_ref())
            .await
            .context("While syncing registry grants into the policy store")?;
        info!(target: "startup", submitted = report.submitted, inserted = report.inserted, "registry sync finished");
    }

    let addr: SocketAddr = cfg.server.http_addr.parse()?;
    info!(target: "startup", protected = registry.snapshot().len(), "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Authorization layer: the request path is the operation identifier.
async fn authorize(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let mut ctx = CallContext::new(req.uri().path()).with_deadline(Instant::now() + state.request_timeout);
    if let Some(v) = req.headers().get(header::AUTHORIZATION) {
        ctx = ctx.with_assertion(String::from_utf8_lossy(v.as_bytes()));
    }
    match state.authz.decide(&ctx).await {
        Decision::Allow { subject } => {
            if let Some(s) = subject { req.extensions_mut().insert(s); }
            next.run(req).await
        }
        Decision::Deny(e) => e.into_response(),
    }
}

fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| AppError::user("bad_input", format!("'{}' is not a valid id", id)))
}

#[derive(Debug, Serialize)]
struct UserReply { data: User }

#[derive(Debug, Serialize)]
struct ListUserReply { data: Vec<User> }

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Deserialize)]
struct IdRequest { id: String }

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct RoleRequest { id: String, role: String }

#[derive(Debug, Deserialize)]
struct PermissionRequest { subject: String, object: String, action: String }

async fn login(State(state): State<AppState>, AppJson(req): AppJson<LoginRequest>) -> AppResult<Json<LoginReply>> {
    state.auth.login(&req).map(Json)
}

async fn create_user(State(state): State<AppState>, caller: Caller, AppJson(req): AppJson<NewUser>) -> AppResult<Json<UserReply>> {
    let user = state.users.create(req)?;
    info!(caller = %caller, user = %user.id, "user created");
    Ok(Json(UserReply { data: user }))
}

async fn update_user(State(state): State<AppState>, AppJson(req): AppJson<UpdateUserRequest>) -> AppResult<Json<UserReply>> {
    let id = parse_id(&req.id)?;
    let user = state.users.update(UserUpdate { id, name: req.name, email: req.email })?;
    Ok(Json(UserReply { data: user }))
}

async fn delete_user(State(state): State<AppState>, caller: Caller, AppJson(req): AppJson<IdRequest>) -> AppResult<Json<Empty>> {
    let id = parse_id(&req.id)?;
    state.users.delete(&id)?;
    info!(caller = %caller, user = %id, "user deleted");
    Ok(Json(Empty {}))
}

async fn get_user(State(state): State<AppState>, AppJson(req): AppJson<IdRequest>) -> AppResult<Json<UserReply>> {
    let id = parse_id(&req.id)?;
    Ok(Json(UserReply { data: state.users.get(&id)? }))
}

async fn list_user(State(state): State<AppState>) -> AppResult<Json<ListUserReply>> {
    Ok(Json(ListUserReply { data: state.users.list() }))
}

async fn grant_role(State(state): State<AppState>, AppJson(req): AppJson<RoleRequest>) -> AppResult<Json<Empty>> {
    state.permissions.grant_role(&req.id, &req.role).await?;
    Ok(Json(Empty {}))
}

async fn revoke_role(State(state): State<AppState>, AppJson(req): AppJson<RoleRequest>) -> AppResult<Json<Empty>> {
    state.permissions.revoke_role(&req.id, &req.role).await?;
    Ok(Json(Empty {}))
}

async fn grant_permission(State(state): State<AppState>, AppJson(req): AppJson<PermissionRequest>) -> AppResult<Json<Empty>> {
    state.permissions.grant_permission(&req.subject, &req.object, &req.action).await?;
    Ok(Json(Empty {}))
}

async fn revoke_permission(State(state): State<AppState>, AppJson(req): AppJson<PermissionRequest>) -> AppResult<Json<Empty>> {
    state.permissions.revoke_permission(&req.subject, &req.object, &req.action).await?;
    Ok(Json(Empty {}))
}
