//! One-shot reconciliation of declared role grants into the policy engine.
//!
//! Sync is additive: it pushes the minimum baseline derivable from the registry and never
//! removes or rewrites tuples an operator added directly. It is meant to run at boot or from
//! an operator command, never concurrently with another sync.

use std::collections::HashSet;

use tracing::info;

use super::descriptor::PolicyTuple;
use super::engine::{EngineError, PolicyEngine};
use super::registry::RegistrySnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Distinct tuples submitted in the bulk request.
    pub submitted: usize,
    /// Tuples the engine did not already hold.
    pub inserted: usize,
}

/// Deduplicated (role, object, action) tuples declared by `snapshot`, sorted for stable output.
pub fn declared_tuples(snapshot: &RegistrySnapshot) -> Vec<PolicyTuple> {
    let mut seen: HashSet<PolicyTuple> = HashSet::with_capacity(snapshot.len() * 2);
    let mut out: Vec<PolicyTuple> = Vec::with_capacity(snapshot.len() * 2);
    for (_, perm) in snapshot.iter() {
        for t in perm.policy_tuples() {
            if seen.insert(t.clone()) { out.push(t); }
        }
    }
    out.sort();
    out
}

/// Submit every declared grant as a single bulk add. Engine failures abort and surface verbatim;
/// partial application is left as the engine reports it.
pub async fn sync_from_registry(snapshot: &RegistrySnapshot, engine: &dyn PolicyEngine) -> Result<SyncReport, EngineError> {
    let tuples = declared_tuples(snapshot);
    if tuples.is_empty() {
        info!(target: "authz", version = snapshot.version(), "registry sync: nothing declared");
        return Ok(SyncReport::default());
    }
    let submitted = tuples.len();
    let inserted = engine.add_policies(tuples).await?;
    info!(target: "authz", version = snapshot.version(), submitted, inserted, "registry sync complete");
    Ok(SyncReport { submitted, inserted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::descriptor::PermissionDescriptor;
    use crate::authz::engine::MemoryPolicyEngine;
    use crate::authz::metadata::OperationMeta;
    use crate::authz::registry::build;

    #[test]
    fn shared_object_action_is_pushed_once() {
        let snap = build(&vec![
            OperationMeta::protected("/user.v1.UserService/GetUser", PermissionDescriptor::new("user", "read", ["admin", "user"])),
            OperationMeta::protected("/user.v2.UserService/GetUser", PermissionDescriptor::new("user", "read", ["admin"])),
            OperationMeta::public("/auth.v1.AuthService/Login"),
        ])
        .unwrap();
        assert_eq!(
            declared_tuples(&snap),
            vec![PolicyTuple::new("admin", "user", "read"), PolicyTuple::new("user", "user", "read")]
        );
    }

    #[tokio::test]
    async fn empty_registry_is_a_no_op() {
        let engine = MemoryPolicyEngine::new();
        let report = sync_from_registry(&RegistrySnapshot::empty(), &engine).await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert!(engine.policies().await.unwrap().is_empty());
    }
}
