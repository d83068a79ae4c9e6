//! Gluten Shared Types and Utilities
//!
//! Types, errors and the user directory shared by the Gluten crates.

pub mod db;
pub mod directory;
pub mod error;
pub mod types;

pub use db::*;
pub use directory::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};
pub use error::*;
pub use types::*;
