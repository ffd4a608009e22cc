use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::hash_password;
use crate::tprintln;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default)]
struct Directory {
    by_id: HashMap<Uuid, User>,
    // lowercased email -> id
    by_email: HashMap<String, Uuid>,
}

/// In-memory user directory. Emails are unique case-insensitively.
#[derive(Debug, Default)]
pub struct UserDirectory {
    inner: RwLock<Directory>,
}

fn email_key(email: &str) -> String { email.trim().to_lowercase() }

impl UserDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn create(&self, req: NewUser) -> AppResult<User> {
        if req.email.trim().is_empty() || !req.email.contains('@') {
            return Err(AppError::user("bad_input", "a valid email is required"));
        }
        if req.password.is_empty() {
            return Err(AppError::user("bad_input", "password must not be empty"));
        }
        let key = email_key(&req.email);
        if self.inner.read().by_email.contains_key(&key) {
            return Err(AppError::conflict("email_taken", format!("email '{}' already registered", req.email.trim())));
        }
        // Hash outside the lock.
        let password_hash = hash_password(&req.password).map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            AppError::internal("hash_error", "could not store password")
        })?;
        let now = Utc::now();
        let user = User { id: Uuid::new_v4(), name: req.name, email: req.email.trim().to_string(), password_hash, created_at: now, updated_at: now };
        let mut dir = self.inner.write();
        // Re-check under the write lock.
        if dir.by_email.contains_key(&key) {
            return Err(AppError::conflict("email_taken", format!("email '{}' already registered", user.email)));
        }
        dir.by_email.insert(key, user.id);
        dir.by_id.insert(user.id, user.clone());
        tprintln!("users.create id={} email={}", user.id, user.email);
        Ok(user)
    }

    /// Non-empty fields of `upd` replace the stored ones.
    pub fn update(&self, upd: UserUpdate) -> AppResult<User> {
        let mut dir = self.inner.write();
        let Some(current) = dir.by_id.get(&upd.id).cloned() else {
            return Err(AppError::not_found("user_not_found", "user not found"));
        };
        let mut next = current.clone();
        if !upd.name.is_empty() { next.name = upd.name; }
        if !upd.email.is_empty() && email_key(&upd.email) != email_key(&current.email) {
            let key = email_key(&upd.email);
            if dir.by_email.contains_key(&key) {
                return Err(AppError::conflict("email_taken", format!("email '{}' already registered", upd.email.trim())));
            }
            dir.by_email.remove(&email_key(&current.email));
            dir.by_email.insert(key, upd.id);
            next.email = upd.email.trim().to_string();
        }
        next.updated_at = Utc::now();
        dir.by_id.insert(next.id, next.clone());
        Ok(next)
    }

    pub fn get(&self, id: &Uuid) -> AppResult<User> {
        self.inner.read().by_id.get(id).cloned().ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let dir = self.inner.read();
        dir.by_email.get(&email_key(email)).and_then(|id| dir.by_id.get(id)).cloned()
    }

    /// All users, oldest first.
    pub fn list(&self) -> Vec<User> {
        let mut out: Vec<User> = self.inner.read().by_id.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        out
    }

    pub fn delete(&self, id: &Uuid) -> AppResult<()> {
        let mut dir = self.inner.write();
        let Some(user) = dir.by_id.remove(id) else {
            return Err(AppError::not_found("user_not_found", "user not found"));
        };
        dir.by_email.remove(&email_key(&user.email));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_user(email: &str) -> NewUser {
        NewUser { name: "Test".into(), email: email.into(), password: "pw".into() }
    }

    #[test]
    fn create_rejects_duplicate_email_case_insensitively() {
        let d = UserDirectory::new();
        d.create(new_user("a@example.com")).unwrap();
        let err = d.create(new_user("A@Example.com")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn update_only_touches_non_empty_fields() {
        let d = UserDirectory::new();
        let u = d.create(new_user("a@example.com")).unwrap();
        let up = d.update(UserUpdate { id: u.id, name: "Renamed".into(), email: String::new() }).unwrap();
        assert_eq!(up.name, "Renamed");
        assert_eq!(up.email, "a@example.com");
        let up = d.update(UserUpdate { id: u.id, name: String::new(), email: "b@example.com".into() }).unwrap();
        assert_eq!(up.email, "b@example.com");
        assert!(d.find_by_email("a@example.com").is_none());
        assert_eq!(d.find_by_email("B@example.com").unwrap().id, u.id);
    }

    #[test]
    fn delete_missing_user_is_not_found() {
        let d = UserDirectory::new();
        assert_eq!(d.delete(&Uuid::new_v4()).unwrap_err().kind(), ErrorKind::NotFound);
        let u = d.create(new_user("a@example.com")).unwrap();
        d.delete(&u.id).unwrap();
        assert!(d.list().is_empty());
        assert_eq!(d.get(&u.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let d = UserDirectory::new();
        let u = d.create(new_user("a@example.com")).unwrap();
        let v = serde_json::to_value(&u).unwrap();
        assert!(v.get("password_hash").is_none());
    }
}
