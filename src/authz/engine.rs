//! Policy engine capability and the bundled RBAC implementation.
//!
//! The authorization core only talks to [`PolicyEngine`]. [`MemoryPolicyEngine`] implements
//! the classic RBAC model `g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act`, with
//! transitive role inheritance, guarded internally so it is safe for concurrent reads and
//! writes. When opened with a path it autosaves every mutation to a JSON document; a mutation
//! becomes visible to `enforce` only after it has been written.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::descriptor::{GroupingRule, PolicyTuple};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("policy storage unavailable: {0}")]
    Storage(String),
    #[error("policy store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("policy store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<EngineError> for crate::error::AppError {
    fn from(_: EngineError) -> Self { crate::error::AppError::internal("policy_error", "policy engine unavailable") }
}

#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Decide whether `subject` may perform `action` on `object`.
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError>;

    /// Bulk insert. Tuples already present are skipped, not reported as failures.
    /// Returns how many tuples were newly inserted.
    async fn add_policies(&self, tuples: Vec<PolicyTuple>) -> Result<usize, EngineError>;

    async fn add_grouping_policy(&self, user: &str, role: &str) -> Result<bool, EngineError>;
    async fn remove_grouping_policy(&self, user: &str, role: &str) -> Result<bool, EngineError>;
    async fn add_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError>;
    async fn remove_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError>;

    /// Every policy tuple currently held, in sorted order.
    async fn policies(&self) -> Result<Vec<PolicyTuple>, EngineError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    policies: BTreeSet<PolicyTuple>,
    #[serde(default)]
    groupings: BTreeSet<GroupingRule>,
}

#[derive(Debug, Default, Clone)]
struct PolicyState {
    policies: HashSet<PolicyTuple>,
    // user (or role) -> roles it directly belongs to
    groupings: HashMap<String, HashSet<String>>,
}

impl PolicyState {
    fn from_document(doc: PolicyDocument) -> Self {
        let mut st = PolicyState { policies: doc.policies.into_iter().collect(), ..Default::default() };
        for g in doc.groupings {
            st.groupings.entry(g.user).or_default().insert(g.role);
        }
        st
    }

    fn to_document(&self) -> PolicyDocument {
        let groupings = self
            .groupings
            .iter()
            .flat_map(|(u, roles)| roles.iter().map(move |r| GroupingRule { user: u.clone(), role: r.clone() }))
            .collect();
        PolicyDocument { policies: self.policies.iter().cloned().collect(), groupings }
    }

    /// The subject itself plus every role reachable through grouping rules.
    fn effective_subjects<'a>(&'a self, subject: &'a str) -> HashSet<&'a str> {
        let mut out: HashSet<&str> = HashSet::new();
        let mut stack = vec![subject];
        while let Some(s) = stack.pop() {
            if !out.insert(s) { continue; }
            if let Some(roles) = self.groupings.get(s) {
                stack.extend(roles.iter().map(|r| r.as_str()));
            }
        }
        out
    }

    fn allows(&self, subject: &str, object: &str, action: &str) -> bool {
        self.effective_subjects(subject).into_iter().any(|s| {
            self.policies.contains(&PolicyTuple::new(s, object, action))
        })
    }
}

pub struct MemoryPolicyEngine {
    state: RwLock<PolicyState>,
    // Serializes mutations; readers only ever take `state`.
    writer: Mutex<()>,
    autosave: Option<PathBuf>,
}

impl Default for MemoryPolicyEngine {
    fn default() -> Self { Self::new() }
}

impl MemoryPolicyEngine {
    /// Volatile engine; state is lost on drop.
    pub fn new() -> Self { Self { state: RwLock::new(PolicyState::default()), writer: Mutex::new(()), autosave: None } }

    /// Engine backed by a JSON file. A missing file starts empty and is created on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() { PolicyState::default() } else { PolicyState::from_document(serde_json::from_str(&text)?) }
        } else {
            PolicyState::default()
        };
        debug!(target: "authz", path = %path.display(), policies = state.policies.len(), "policy store opened");
        Ok(Self { state: RwLock::new(state), writer: Mutex::new(()), autosave: Some(path) })
    }

    /// Apply `f` to a copy of the state, persist the copy, then publish it.
    /// On any failure the visible state is left untouched.
    async fn mutate<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut PolicyState) -> (T, bool),
    {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().clone();
        let (out, changed) = f(&mut next);
        if !changed { return Ok(out); }
        if let Some(path) = &self.autosave {
            let text = serde_json::to_string_pretty(&next.to_document())?;
            let path = path.clone();
            tokio::task::spawn_blocking(move || write_store(&path, &text))
                .await
                .map_err(|e| EngineError::Storage(format!("persist task failed: {}", e)))??;
        }
        *self.state.write() = next;
        Ok(out)
    }
}

/// Write-then-rename.
fn write_store(path: &Path, text: &str) -> Result<(), EngineError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir)?; }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl PolicyEngine for MemoryPolicyEngine {
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError> {
        Ok(self.state.read().allows(subject, object, action))
    }

    async fn add_policies(&self, tuples: Vec<PolicyTuple>) -> Result<usize, EngineError> {
        self.mutate(|st| {
            let added = tuples.into_iter().filter(|t| st.policies.insert(t.clone())).count();
            (added, added > 0)
        }).await
    }

    async fn add_grouping_policy(&self, user: &str, role: &str) -> Result<bool, EngineError> {
        self.mutate(|st| {
            let added = st.groupings.entry(user.to_string()).or_default().insert(role.to_string());
            (added, added)
        }).await
    }

    async fn remove_grouping_policy(&self, user: &str, role: &str) -> Result<bool, EngineError> {
        self.mutate(|st| {
            let removed = match st.groupings.get_mut(user) {
                Some(roles) => {
                    let r = roles.remove(role);
                    if roles.is_empty() { st.groupings.remove(user); }
                    r
                }
                None => false,
            };
            (removed, removed)
        }).await
    }

    async fn add_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError> {
        self.mutate(|st| {
            let added = st.policies.insert(PolicyTuple::new(subject, object, action));
            (added, added)
        }).await
    }

    async fn remove_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, EngineError> {
        self.mutate(|st| {
            let removed = st.policies.remove(&PolicyTuple::new(subject, object, action));
            (removed, removed)
        }).await
    }

    async fn policies(&self) -> Result<Vec<PolicyTuple>, EngineError> {
        let mut out: Vec<PolicyTuple> = self.state.read().policies.iter().cloned().collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn role_grant_allows_and_revoke_denies() {
        let e = MemoryPolicyEngine::new();
        e.add_policy("admin", "user", "delete").await.unwrap();
        assert!(!e.enforce("alice", "user", "delete").await.unwrap());
        e.add_grouping_policy("alice", "admin").await.unwrap();
        assert!(e.enforce("alice", "user", "delete").await.unwrap());
        assert!(!e.enforce("alice", "user", "create").await.unwrap());
        e.remove_grouping_policy("alice", "admin").await.unwrap();
        assert!(!e.enforce("alice", "user", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn direct_subject_policy_and_role_chain() {
        let e = MemoryPolicyEngine::new();
        e.add_policy("bob", "doc", "read").await.unwrap();
        assert!(e.enforce("bob", "doc", "read").await.unwrap());
        e.add_policy("root", "doc", "write").await.unwrap();
        e.add_grouping_policy("ops", "root").await.unwrap();
        e.add_grouping_policy("carol", "ops").await.unwrap();
        assert!(e.enforce("carol", "doc", "write").await.unwrap());
        // cycles terminate
        e.add_grouping_policy("root", "carol").await.unwrap();
        assert!(!e.enforce("carol", "doc", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn add_policies_tolerates_existing_tuples() {
        let e = MemoryPolicyEngine::new();
        e.add_policy("admin", "user", "read").await.unwrap();
        let n = e
            .add_policies(vec![PolicyTuple::new("admin", "user", "read"), PolicyTuple::new("admin", "user", "list")])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(e.policies().await.unwrap().len(), 2);
        assert!(!e.remove_policy("nobody", "user", "read").await.unwrap());
    }

    #[tokio::test]
    async fn autosave_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy").join("store.json");
        {
            let e = MemoryPolicyEngine::open(&path).unwrap();
            e.add_policy("admin", "user", "delete").await.unwrap();
            e.add_grouping_policy("alice", "admin").await.unwrap();
        }
        let e = MemoryPolicyEngine::open(&path).unwrap();
        assert!(e.enforce("alice", "user", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the store's directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let e = MemoryPolicyEngine::open(blocker.join("store.json")).unwrap();

        assert!(e.add_policy("admin", "user", "delete").await.is_err());
        assert!(e.add_grouping_policy("mallory", "admin").await.is_err());
        assert!(e.add_policies(vec![PolicyTuple::new("mallory", "user", "delete")]).await.is_err());
        assert!(!e.enforce("mallory", "user", "delete").await.unwrap());
        assert!(e.policies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_persist_keeps_revoked_grant() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let path = store.join("policy.json");
        let e = MemoryPolicyEngine::open(&path).unwrap();
        e.add_policy("admin", "user", "delete").await.unwrap();
        e.add_grouping_policy("alice", "admin").await.unwrap();

        // Swap the store directory for a regular file so the next write fails.
        std::fs::remove_dir_all(&store).unwrap();
        std::fs::write(&store, "").unwrap();
        assert!(e.remove_grouping_policy("alice", "admin").await.is_err());
        assert!(e.enforce("alice", "user", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn engine_error_hides_io_detail() {
        let err = crate::error::AppError::from(EngineError::Io(std::io::Error::other("File exists (os error 17)")));
        assert_eq!(err.code_str(), "policy_error");
        assert_eq!(err.message(), "policy engine unavailable");
    }

    #[test]
    fn corrupt_store_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(MemoryPolicyEngine::open(&path), Err(EngineError::Corrupt(_))));
    }
}
