//! Common types used across Gluten

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A user known to the directory.
///
/// `password_hash` is opaque to the token engine; it is folded into every
/// token digest, so changing it invalidates outstanding tokens.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Build an active user with a fresh id, mostly useful for seeding and tests
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Public view of a user, safe to return from API handlers
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
    /// Whole seconds, RFC 3339
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_active: user.is_active,
            created_at: user
                .created_at
                .replace_nanosecond(0)
                .unwrap_or(user.created_at),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_active() {
        let user = User::new("alice", "h1");
        assert!(user.is_active);
        assert_eq!(user.username, "alice");
        assert_eq!(user.password_hash, "h1");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("alice", "secret-hash");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alice"));
    }

    #[test]
    fn test_profile_from_user() {
        let user = User::new("bob", "h2").deactivated();
        let profile = UserProfile::from(&user);
        assert_eq!(profile.id, user.id);
        assert!(!profile.is_active);
        assert_eq!(profile.created_at.nanosecond(), 0);

        let json = serde_json::to_value(&profile).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(!created.contains('.'));
    }
}
