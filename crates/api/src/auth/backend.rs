//! Username + token authentication backend
//!
//! The single integration point for the HTTP layer: resolve the user, gate on
//! `is_active`, then defer to the token engine.

use std::sync::Arc;

use gluten_shared::{User, UserDirectory};

use super::token::TokenEngine;

#[derive(Clone)]
pub struct TokenBackend {
    directory: Arc<dyn UserDirectory>,
    engine: TokenEngine,
}

impl TokenBackend {
    pub fn new(directory: Arc<dyn UserDirectory>, engine: TokenEngine) -> Self {
        Self { directory, engine }
    }

    pub fn engine(&self) -> &TokenEngine {
        &self.engine
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Resolve `(username, token)` to an active user.
    ///
    /// Unknown users, inactive users, directory faults and bad tokens all
    /// produce `None`.
    pub async fn authenticate(&self, username: &str, token: &str) -> Option<User> {
        let user = match self.directory.find_by_username(username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(username = %username, "Token auth for unknown user");
                return None;
            }
            Err(e) => {
                tracing::error!(username = %username, error = %e, "User directory lookup failed");
                return None;
            }
        };

        if !user.is_active {
            tracing::debug!(username = %username, "Token auth for inactive user");
            return None;
        }

        if self.engine.check_token(&user, token).await {
            Some(user)
        } else {
            None
        }
    }
}
