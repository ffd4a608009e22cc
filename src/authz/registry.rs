//! Process-wide permission registry.
//!
//! A published [`RegistrySnapshot`] is immutable. Rebuilding scans a [`MetadataSource`] into a
//! brand new snapshot and publishes it with a single atomic pointer swap, so readers on the
//! request path never take a lock and never observe a partially populated map. Readers that
//! loaded the previous snapshot keep it alive until they drop their reference.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::descriptor::PermissionDescriptor;
use super::metadata::MetadataSource;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("metadata source failed: {0}")]
    Source(String),
    #[error("malformed metadata for '{operation}': {reason}")]
    Malformed { operation: String, reason: String },
    #[error("duplicate operation identifier '{0}'")]
    Duplicate(String),
}

impl From<RegistryError> for crate::error::AppError {
    fn from(_: RegistryError) -> Self { crate::error::AppError::internal("registry_error", "permission registry unavailable") }
}

static OPERATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*/[A-Za-z_][A-Za-z0-9_]*$").expect("operation regex")
});

static BUILD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Immutable point-in-time mapping operation identifier -> descriptor.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    version: u64,
    entries: HashMap<String, Arc<PermissionDescriptor>>,
}

impl RegistrySnapshot {
    /// Version 0 is reserved for the empty snapshot a registry starts with.
    pub fn empty() -> Self { Self::default() }

    pub fn version(&self) -> u64 { self.version }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, operation: &str) -> Option<&Arc<PermissionDescriptor>> { self.entries.get(operation) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PermissionDescriptor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

fn is_token(s: &str) -> bool { !s.is_empty() && !s.chars().any(char::is_whitespace) }

fn validate(operation: &str, d: &PermissionDescriptor) -> Result<(), RegistryError> {
    let malformed = |reason: &str| RegistryError::Malformed { operation: operation.to_string(), reason: reason.to_string() };
    if !is_token(d.object()) { return Err(malformed("object must be a non-empty token")); }
    if !is_token(d.action()) { return Err(malformed("action must be a non-empty token")); }
    if d.roles().iter().any(|r| !is_token(r)) { return Err(malformed("roles must be non-empty tokens")); }
    Ok(())
}

/// Scan a metadata source into a complete snapshot. Any malformed entry aborts the build.
pub fn build(source: &dyn MetadataSource) -> Result<RegistrySnapshot, RegistryError> {
    let ops = source.operations()?;
    let mut entries: HashMap<String, Arc<PermissionDescriptor>> = HashMap::with_capacity(ops.len());
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::with_capacity(ops.len());
    for op in ops {
        if !OPERATION_RE.is_match(&op.operation) {
            return Err(RegistryError::Malformed {
                operation: op.operation,
                reason: "expected /<package.Service>/<Method>".into(),
            });
        }
        // Public operations count towards uniqueness too.
        if !seen.insert(op.operation.clone()) {
            return Err(RegistryError::Duplicate(op.operation));
        }
        if let Some(d) = op.permission {
            validate(&op.operation, &d)?;
            entries.insert(op.operation, Arc::new(d));
        }
    }
    let version = BUILD_SEQ.fetch_add(1, Ordering::Relaxed);
    Ok(RegistrySnapshot { version, entries })
}

pub struct PermissionRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl Default for PermissionRegistry {
    fn default() -> Self { Self::new() }
}

impl PermissionRegistry {
    /// A registry holding the empty snapshot: every operation is public until a build is published.
    pub fn new() -> Self { Self { current: ArcSwap::from_pointee(RegistrySnapshot::empty()) } }

    pub fn from_source(source: &dyn MetadataSource) -> Result<Self, RegistryError> {
        let reg = Self::new();
        reg.publish(build(source)?);
        Ok(reg)
    }

    /// Atomically replace the visible snapshot; returns the one it replaced.
    pub fn publish(&self, snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let (version, count) = (snapshot.version, snapshot.len());
        let prev = self.current.swap(Arc::new(snapshot));
        info!(target: "authz", version, protected = count, previous = prev.version, "permission registry published");
        prev
    }

    /// Build from `source` and publish. On error the current snapshot stays in place.
    pub fn reload(&self, source: &dyn MetadataSource) -> Result<u64, RegistryError> {
        let snap = build(source)?;
        let version = snap.version;
        self.publish(snap);
        Ok(version)
    }

    pub fn lookup(&self, operation: &str) -> Option<Arc<PermissionDescriptor>> {
        self.current.load().get(operation).cloned()
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> { self.current.load_full() }
}

static GLOBAL: Lazy<Arc<PermissionRegistry>> = Lazy::new(|| Arc::new(PermissionRegistry::new()));

/// The process-wide registry used by the server binary.
pub fn global() -> Arc<PermissionRegistry> { Arc::clone(&GLOBAL) }
