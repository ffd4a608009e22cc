//! Per-request authorization pipeline.
//!
//! Each call moves LOOKUP -> AUTHENTICATE -> ENFORCE and ends in exactly one of ALLOW (the
//! wrapped handler runs once) or DENY (the handler never runs). Stages hand a [`Decision`]
//! forward instead of nesting callbacks. Nothing is cached between calls and no mutable
//! state is shared between invocations; the registry snapshot is the only shared input.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::context::CallContext;
use super::descriptor::PermissionDescriptor;
use super::engine::PolicyEngine;
use super::registry::PermissionRegistry;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthenticationVerifier, Subject};

/// Outcome of the pipeline for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `subject` is `None` when the operation is public.
    Allow { subject: Option<Subject> },
    Deny(AppError),
}

impl Decision {
    pub fn is_allow(&self) -> bool { matches!(self, Decision::Allow { .. }) }
}

fn canceled(reason: &str) -> AppError { AppError::canceled("canceled", reason) }

pub struct AuthorizationMiddleware {
    registry: Arc<PermissionRegistry>,
    verifier: Arc<dyn AuthenticationVerifier>,
    engine: Arc<dyn PolicyEngine>,
}

impl AuthorizationMiddleware {
    pub fn new(registry: Arc<PermissionRegistry>, verifier: Arc<dyn AuthenticationVerifier>, engine: Arc<dyn PolicyEngine>) -> Self {
        Self { registry, verifier, engine }
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> { &self.registry }

    /// Run the decision pipeline for one call.
    pub async fn decide(&self, ctx: &CallContext) -> Decision {
        if ctx.is_cancelled() {
            return Decision::Deny(canceled("request canceled before authorization"));
        }

        // LOOKUP
        let Some(perm) = self.registry.lookup(ctx.operation()) else {
            debug!(target: "authz", operation = ctx.operation(), "public operation");
            return Decision::Allow { subject: None };
        };

        // AUTHENTICATE
        let subject = match self.verifier.verify(ctx.assertion()) {
            Ok(s) => s,
            Err(e) => {
                debug!(target: "authz", operation = ctx.operation(), reason = %e, "unauthenticated");
                return Decision::Deny(e.into());
            }
        };

        // ENFORCE
        match self.enforce(ctx, &subject, &perm).await {
            Ok(true) => {
                debug!(target: "authz", operation = ctx.operation(), subject = %subject, "allow");
                Decision::Allow { subject: Some(subject) }
            }
            Ok(false) => {
                debug!(target: "authz", operation = ctx.operation(), subject = %subject, object = perm.object(), action = perm.action(), "forbidden");
                Decision::Deny(AppError::forbidden("access_denied", "permission denied"))
            }
            Err(e) => Decision::Deny(e),
        }
    }

    /// Ask the engine, abandoning the call as soon as the context is canceled or its deadline passes.
    async fn enforce(&self, ctx: &CallContext, subject: &Subject, perm: &PermissionDescriptor) -> AppResult<bool> {
        let call = async {
            self.engine.enforce(subject.as_str(), perm.object(), perm.action()).await.map_err(|e| {
                error!(target: "authz", operation = ctx.operation(), error = %e, "policy engine failure");
                AppError::from(e)
            })
        };
        let bounded = async {
            match ctx.deadline() {
                Some(d) => tokio::time::timeout_at(d, call).await.unwrap_or_else(|_| Err(canceled("deadline exceeded during authorization"))),
                None => call.await,
            }
        };
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(canceled("request canceled during authorization")),
            r = bounded => r,
        }
    }

    /// Decorate `inner` so it only runs after a clean ALLOW.
    pub fn wrap<H>(self: &Arc<Self>, inner: H) -> Authorized<H> {
        Authorized { middleware: Arc::clone(self), inner }
    }
}

/// A request-pipeline stage usable by any dispatcher.
#[async_trait]
pub trait Handler<Req: Send + 'static>: Send + Sync {
    type Response: Send;
    async fn call(&self, ctx: CallContext, req: Req) -> AppResult<Self::Response>;
}

pub struct HandlerFn<F>(F);

/// Adapt an async closure `(CallContext, Req) -> AppResult<Resp>` into a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> { HandlerFn(f) }

#[async_trait]
impl<F, Fut, Req, Resp> Handler<Req> for HandlerFn<F>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Resp>> + Send,
    Req: Send + 'static,
    Resp: Send,
{
    type Response = Resp;
    async fn call(&self, ctx: CallContext, req: Req) -> AppResult<Resp> { (self.0)(ctx, req).await }
}

/// Handler produced by [`AuthorizationMiddleware::wrap`].
pub struct Authorized<H> {
    middleware: Arc<AuthorizationMiddleware>,
    inner: H,
}

#[async_trait]
impl<Req, H> Handler<Req> for Authorized<H>
where
    H: Handler<Req>,
    Req: Send + 'static,
{
    type Response = H::Response;

    async fn call(&self, ctx: CallContext, req: Req) -> AppResult<H::Response> {
        match self.middleware.decide(&ctx).await {
            Decision::Allow { subject } => self.inner.call(ctx.with_subject(subject), req).await,
            Decision::Deny(e) => Err(e),
        }
    }
}
