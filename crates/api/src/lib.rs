//! Gluten API Library
//!
//! Username + token authentication for REST APIs built on axum: the token
//! engine, its nonce stores, the authentication middleware and the routes
//! that issue and revoke tokens.

pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod security;
pub mod state;

pub use auth::{TokenBackend, TokenEngine};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
