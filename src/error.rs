// Error handling module
// Defines the error taxonomy for session and handshake operations

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during session management
#[derive(Error, Debug)]
pub enum AuthError {
    /// Network or protocol failure, passed through untouched
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Session torn down, re-authentication required
    #[error("Session expired, redirecting to {redirect_to}")]
    SessionExpired { redirect_to: &'static str },

    /// Non-auth error response from the server
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Primary credentials or second-factor code rejected
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Second-factor handshake state missing or malformed
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// Session store failure, fatal to the triggering operation
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, AuthError>;
