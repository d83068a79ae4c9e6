//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gluten_shared::{
    create_pool, run_migrations, InMemoryUserDirectory, PgUserDirectory, UserDirectory,
};

use crate::auth::{InMemoryNonceStore, NonceStore, RedisNonceStore, TokenBackend, TokenEngine};
use crate::config::Config;

const NONCE_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: TokenBackend,
    pub nonce_store: Arc<dyn NonceStore>,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: Config,
        directory: Arc<dyn UserDirectory>,
        nonce_store: Arc<dyn NonceStore>,
    ) -> Self {
        let engine = TokenEngine::new(
            &config.secret_key,
            config.token_timeout_days,
            nonce_store.clone(),
        );
        Self::with_engine(config, directory, nonce_store, engine)
    }

    /// Assemble state around a preconfigured engine (e.g. with a pinned clock)
    pub fn with_engine(
        config: Config,
        directory: Arc<dyn UserDirectory>,
        nonce_store: Arc<dyn NonceStore>,
        engine: TokenEngine,
    ) -> Self {
        Self {
            config: Arc::new(config),
            backend: TokenBackend::new(directory, engine),
            nonce_store,
        }
    }

    /// Connect the backends named in `config`, falling back to in-memory
    /// ones when a URL is not configured
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let directory = user_directory(&config).await?;

        let nonce_store: Arc<dyn NonceStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisNonceStore::connect(url).await?;
                tracing::info!("Using Redis nonce store");
                Arc::new(store)
            }
            None => {
                tracing::warn!("REDIS_URL not set, token nonces are kept in process memory");
                let store = Arc::new(InMemoryNonceStore::new());
                spawn_nonce_cleanup(store.clone());
                store
            }
        };

        Ok(Self::new(config, directory, nonce_store))
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory directory
/// seeded from `USERS_FILE`
async fn user_directory(config: &Config) -> anyhow::Result<Arc<dyn UserDirectory>> {
    if let Some(url) = &config.database_url {
        if config.users_file.is_some() {
            tracing::warn!("DATABASE_URL is set, ignoring USERS_FILE");
        }
        let pool = create_pool(url, config.database_max_connections).await?;
        run_migrations(&pool).await?;
        tracing::info!("Using Postgres user directory");
        return Ok(Arc::new(PgUserDirectory::new(pool)));
    }

    let Some(path) = &config.users_file else {
        tracing::warn!(
            "Neither DATABASE_URL nor USERS_FILE is set, using empty in-memory user directory"
        );
        return Ok(Arc::new(InMemoryUserDirectory::new()));
    };

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read USERS_FILE {path}"))?;
    let directory = InMemoryUserDirectory::from_seed(&contents)?;
    let count = directory.len().await;
    tracing::info!(path = %path, count, "Using in-memory user directory");

    Ok(Arc::new(directory))
}

/// Redis expires keys itself; the in-memory store needs sweeping
fn spawn_nonce_cleanup(store: Arc<InMemoryNonceStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(NONCE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = store.cleanup().await;
            if removed > 0 {
                tracing::debug!(count = removed, "Removed expired token nonces");
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(users_file: Option<String>) -> Config {
        Config {
            bind_address: "127.0.0.1:0".to_string(),
            database_url: None,
            database_max_connections: 1,
            users_file,
            redis_url: None,
            secret_key: "state-test-secret-key-at-least-32-chars".to_string(),
            token_timeout_days: 7,
            token_cookie_secure: false,
            log_json: false,
        }
    }

    fn write_users_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("gluten-{}-{}", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_users_file_seeds_directory() {
        let path = write_users_file("users-ok", "alice:h1\nbob:h2\n");

        let state = AppState::from_config(config(Some(path.clone()))).await.unwrap();
        let alice = state
            .backend
            .directory()
            .find_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.password_hash, "h1");

        let token = state.backend.engine().make_token(&alice).await.unwrap();
        assert!(state.backend.authenticate("alice", &token).await.is_some());

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_bad_users_file_fails_startup() {
        let missing = config(Some("/nonexistent/gluten-users".to_string()));
        assert!(AppState::from_config(missing).await.is_err());

        let path = write_users_file("users-bad", "alice\n");
        assert!(AppState::from_config(config(Some(path.clone()))).await.is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_no_directory_configured() {
        let state = AppState::from_config(config(None)).await.unwrap();
        let found = state.backend.directory().find_by_username("alice").await;
        assert!(found.unwrap().is_none());
    }
}
