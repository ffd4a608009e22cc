use serde::{Deserialize, Serialize};

/// Declares which roles, object and action an operation requires.
///
/// Descriptors are value objects: they are built once while the registry is scanned and
/// never mutated afterwards. `roles` keeps declaration order with duplicates removed; it is
/// only consumed by registry sync, per-request enforcement goes through the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDescriptor {
    object: String,
    action: String,
    #[serde(default)]
    roles: Vec<String>,
}

impl PermissionDescriptor {
    pub fn new<O, A, I, R>(object: O, action: A, roles: I) -> Self
    where
        O: Into<String>,
        A: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for r in roles {
            let r = r.into();
            if !ordered.contains(&r) { ordered.push(r); }
        }
        Self { object: object.into(), action: action.into(), roles: ordered }
    }

    pub fn object(&self) -> &str { &self.object }
    pub fn action(&self) -> &str { &self.action }
    pub fn roles(&self) -> &[String] { &self.roles }

    /// Expand into the (role, object, action) tuples this descriptor pre-authorizes.
    pub fn policy_tuples(&self) -> impl Iterator<Item = PolicyTuple> + '_ {
        self.roles.iter().map(move |role| PolicyTuple::new(role.as_str(), self.object.as_str(), self.action.as_str()))
    }
}

/// A (subject-or-role, object, action) triple held by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyTuple {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyTuple {
    pub fn new<S: Into<String>, O: Into<String>, A: Into<String>>(subject: S, object: O, action: A) -> Self {
        Self { subject: subject.into(), object: object.into(), action: action.into() }
    }
}

/// A user -> role assignment held by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingRule {
    pub user: String,
    pub role: String,
}
