//! User directory
//!
//! Looks users up by username for the token authentication backend.
//! Postgres is the production backend; the in-memory directory is for
//! development without a database and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::DirectoryError;
use crate::types::User;

/// Lookup of users by their unique username
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by username. Unknown usernames yield `Ok(None)`.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;
}

/// Postgres-backed directory reading the `users` table
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, is_active, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// In-memory directory (for development without Postgres)
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory pre-populated with `users`
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Build a directory from `username:password_hash` lines.
    ///
    /// Blank lines and lines starting with `#` are skipped. Usernames must be
    /// unique within the file.
    pub fn from_seed(contents: &str) -> Result<Self, DirectoryError> {
        let mut users = HashMap::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let invalid = |reason| DirectoryError::InvalidSeed {
                line: index + 1,
                reason,
            };
            let (username, password_hash) = line
                .split_once(':')
                .ok_or_else(|| invalid("expected username:password_hash"))?;
            let (username, password_hash) = (username.trim(), password_hash.trim());
            if username.is_empty() || password_hash.is_empty() {
                return Err(invalid("username and password hash must not be empty"));
            }
            if users.contains_key(username) {
                return Err(invalid("duplicate username"));
            }

            users.insert(username.to_string(), User::new(username, password_hash));
        }

        Ok(Self {
            users: RwLock::new(users),
        })
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Insert a user, replacing any previous user with the same username
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.username.clone(), user);
    }

    pub async fn remove(&self, username: &str) -> Option<User> {
        self.users.write().await.remove(username)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(username).cloned())
    }
}
