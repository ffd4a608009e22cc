use std::sync::Arc;

use tracing::{error, info};

use super::engine::{EngineError, PolicyEngine};
use crate::error::{AppError, AppResult};

/// Log the engine's detail and hand the caller a fixed reason.
fn engine_failure(op: &'static str) -> impl FnOnce(EngineError) -> AppError {
    move |e| {
        error!(target: "authz", error = %e, "{} failed", op);
        AppError::internal("policy_error", format!("{} failed", op))
    }
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::user("bad_input", format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Operator surface over the policy engine: role assignment and direct grants.
/// Grants made here are never touched by registry sync.
#[derive(Clone)]
pub struct PermissionManager {
    engine: Arc<dyn PolicyEngine>,
}

impl PermissionManager {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self { Self { engine } }

    pub async fn can(&self, subject: &str, object: &str, action: &str) -> AppResult<bool> {
        self.engine
            .enforce(subject, object, action)
            .await
            .map_err(engine_failure("check permission"))
    }

    pub async fn grant_role(&self, user_id: &str, role: &str) -> AppResult<()> {
        require("id", user_id)?;
        require("role", role)?;
        self.engine
            .add_grouping_policy(user_id, role)
            .await
            .map_err(engine_failure("grant role"))?;
        info!(target: "authz", user = user_id, role, "role granted");
        Ok(())
    }

    pub async fn revoke_role(&self, user_id: &str, role: &str) -> AppResult<()> {
        require("id", user_id)?;
        require("role", role)?;
        self.engine
            .remove_grouping_policy(user_id, role)
            .await
            .map_err(engine_failure("revoke role"))?;
        info!(target: "authz", user = user_id, role, "role revoked");
        Ok(())
    }

    pub async fn grant_permission(&self, subject: &str, object: &str, action: &str) -> AppResult<()> {
        require("subject", subject)?;
        require("object", object)?;
        require("action", action)?;
        self.engine
            .add_policy(subject, object, action)
            .await
            .map_err(engine_failure("grant permission"))?;
        info!(target: "authz", subject, object, action, "permission granted");
        Ok(())
    }

    pub async fn revoke_permission(&self, subject: &str, object: &str, action: &str) -> AppResult<()> {
        require("subject", subject)?;
        require("object", object)?;
        require("action", action)?;
        self.engine
            .remove_policy(subject, object, action)
            .await
            .map_err(engine_failure("revoke permission"))?;
        info!(target: "authz", subject, object, action, "permission revoked");
        Ok(())
    }
}
