//! Operation metadata sources.
//!
//! The registry is built from an explicit table of (operation, optional descriptor) pairs
//! instead of runtime introspection. Three sources exist: the built-in [`service_catalog`]
//! for the bundled services, a JSON [`ManifestFile`] for deployments that declare their
//! surface externally, and plain `Vec<OperationMeta>` for tests and embedding.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::descriptor::PermissionDescriptor;
use super::registry::RegistryError;

/// One discoverable operation. `permission == None` means the operation is public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMeta {
    pub operation: String,
    pub permission: Option<PermissionDescriptor>,
}

impl OperationMeta {
    pub fn public<S: Into<String>>(operation: S) -> Self {
        Self { operation: operation.into(), permission: None }
    }

    pub fn protected<S: Into<String>>(operation: S, permission: PermissionDescriptor) -> Self {
        Self { operation: operation.into(), permission: Some(permission) }
    }
}

/// Enumerable set of operations available at process start.
pub trait MetadataSource: Send + Sync {
    fn operations(&self) -> Result<Vec<OperationMeta>, RegistryError>;
}

impl MetadataSource for Vec<OperationMeta> {
    fn operations(&self) -> Result<Vec<OperationMeta>, RegistryError> { Ok(self.clone()) }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    pub object: &'static str,
    pub action: &'static str,
    pub roles: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub operation: &'static str,
    pub permission: Option<StaticPermission>,
}

impl CatalogEntry {
    pub const fn public(operation: &'static str) -> Self {
        Self { operation, permission: None }
    }

    pub const fn protected(operation: &'static str, object: &'static str, action: &'static str, roles: &'static [&'static str]) -> Self {
        Self { operation, permission: Some(StaticPermission { object, action, roles }) }
    }
}

/// Declarative, compiled-in operation table.
#[derive(Debug, Clone, Copy)]
pub struct StaticCatalog {
    entries: &'static [CatalogEntry],
}

impl StaticCatalog {
    pub const fn new(entries: &'static [CatalogEntry]) -> Self { Self { entries } }
    pub fn entries(&self) -> &'static [CatalogEntry] { self.entries }
}

impl MetadataSource for StaticCatalog {
    fn operations(&self) -> Result<Vec<OperationMeta>, RegistryError> {
        Ok(self
            .entries
            .iter()
            .map(|e| OperationMeta {
                operation: e.operation.to_string(),
                permission: e.permission.map(|p| PermissionDescriptor::new(p.object, p.action, p.roles.iter().copied())),
            })
            .collect())
    }
}

const SERVICE_ENTRIES: &[CatalogEntry] = &[
    CatalogEntry::public("/auth.v1.AuthService/Login"),
    CatalogEntry::protected("/user.v1.UserService/CreateUser", "user", "create", &["admin"]),
    CatalogEntry::protected("/user.v1.UserService/UpdateUser", "user", "update", &["admin"]),
    CatalogEntry::protected("/user.v1.UserService/DeleteUser", "user", "delete", &["admin"]),
    CatalogEntry::protected("/user.v1.UserService/GetUser", "user", "read", &["admin", "user"]),
    CatalogEntry::protected("/user.v1.UserService/ListUser", "user", "list", &["admin"]),
    CatalogEntry::protected("/authz.v1.AuthzService/GrantRole", "authz", "grant_role", &["admin"]),
    CatalogEntry::protected("/authz.v1.AuthzService/RevokeRole", "authz", "revoke_role", &["admin"]),
    CatalogEntry::protected("/authz.v1.AuthzService/GrantPermission", "authz", "grant_permission", &["admin"]),
    CatalogEntry::protected("/authz.v1.AuthzService/RevokePermission", "authz", "revoke_permission", &["admin"]),
];

/// The operation table of the bundled user, auth and authz services.
pub fn service_catalog() -> StaticCatalog { StaticCatalog::new(SERVICE_ENTRIES) }

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    operation: String,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

/// JSON manifest on disk: `[{"operation": "...", "object": "...", "action": "...", "roles": [...]}]`.
/// Entries without object and action are public.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { Self { path: path.as_ref().to_path_buf() } }
    pub fn path(&self) -> &Path { &self.path }
}

impl MetadataSource for ManifestFile {
    fn operations(&self) -> Result<Vec<OperationMeta>, RegistryError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| RegistryError::Source(format!("read {}: {}", self.path.display(), e)))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&text)
            .map_err(|e| RegistryError::Source(format!("parse {}: {}", self.path.display(), e)))?;
        let mut out = Vec::with_capacity(entries.len());
        for e in entries {
            let permission = match (e.object, e.action) {
                (None, None) if e.roles.is_empty() => None,
                (Some(object), Some(action)) => Some(PermissionDescriptor::new(object, action, e.roles)),
                _ => {
                    return Err(RegistryError::Malformed {
                        operation: e.operation,
                        reason: "object and action must be declared together".into(),
                    })
                }
            };
            out.push(OperationMeta { operation: e.operation, permission });
        }
        Ok(out)
    }
}
