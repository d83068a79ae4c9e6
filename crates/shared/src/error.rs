//! Error types for Gluten

use thiserror::Error;

/// Failures of the user directory backend.
///
/// "User not found" is not an error; lookups return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid users file, line {line}: {reason}")]
    InvalidSeed { line: usize, reason: &'static str },
}
