//! Error types for the wellbands client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, storage and input validation errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for wellbands operations.
///
/// This error type covers all possible failure modes in the library,
/// with explicit variants to allow callers to handle specific cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (invalid credentials, expired session).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (non-success HTTP responses, unexpected bodies).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Storage backend errors (I/O, corrupt files, unavailable backend).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (invalid URL, email, header value).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true when the backend rejected the request as unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Protocol(p) if p.status == 401)
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No refresh token is stored (the session was not remembered).
    #[error("no refresh token stored")]
    RefreshTokenMissing,

    /// Refresh token is invalid or expired.
    #[error("refresh token invalid")]
    RefreshTokenInvalid,

    /// Credentials were cleared; the user has to log in again.
    #[error("login required")]
    LoginRequired,
}

/// Protocol-level errors from API responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error code from the response body (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Whether the backend rejected the credential presented (401 or 403).
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// The message to show next to a form, falling back to the error code.
    pub fn user_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("request failed with status {}", self.status))
    }
}

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// A storage file could not be decoded.
    #[error("corrupt storage file {path}: {message}")]
    Corrupt { path: String, message: String },

    /// The backend failed its availability check.
    #[error("{backend} storage unavailable")]
    Unavailable { backend: String },

    /// A lock guarding in-process state was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid email address.
    #[error("invalid email '{value}': {reason}")]
    Email { value: String, reason: String },

    /// A token contained characters that cannot go in a header.
    #[error("invalid header value: {reason}")]
    Header { reason: String },
}
