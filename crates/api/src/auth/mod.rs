//! Token authentication for Gluten

pub mod backend;
pub mod clock;
pub mod middleware;
pub mod nonce_store;
pub mod password;
pub mod token;

pub use backend::TokenBackend;
pub use clock::{Clock, FixedClock, SystemClock, TOKEN_EPOCH};
pub use middleware::{optional_token_auth, require_token_auth, AuthUser, Credentials, TOKEN_COOKIE};
pub use nonce_store::{InMemoryNonceStore, NonceKey, NonceStore, RedisNonceStore, StoreError};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{TokenEngine, TokenError, DEFAULT_TOKEN_TIMEOUT_DAYS};
