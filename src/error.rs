//! Error types for the keycloak-facade library.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level facade error type.
///
/// Every operation on [`crate::KeycloakAuth`] that can fail returns this type.
/// Failures coming from the underlying session handle are surfaced unchanged
/// through the [`AuthError::Session`] variant.
#[derive(Error, Debug)]
pub enum AuthError {
    /// An operation requiring a live session was called before `init` completed.
    #[error("Keycloak facade is not initialized. Call init() first.")]
    NotInitialized,

    /// A profile operation was attempted while no user session exists.
    #[error("The user profile was not loaded as the user is not logged in.")]
    NotAuthenticated,

    /// `get_username` was called before any profile was loaded.
    #[error("User not logged in or user profile was not loaded.")]
    ProfileNotLoaded,

    /// Silent-refresh mode detected an expired token.
    #[error("Failed to refresh the token, or the session is expired.")]
    RefreshFailed,

    /// The configured authorization header name or the token value cannot be
    /// represented as an HTTP header.
    #[error("Invalid authorization header: {0}")]
    InvalidHeader(String),

    /// Invalid configuration (bad excluded-URL pattern, missing realm, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure surfaced unchanged from the underlying session handle.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors raised by a [`crate::session::Session`] implementation.
///
/// The facade never inspects these beyond re-wrapping; retry and backoff, if
/// any, are the session implementation's responsibility.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Failed to load the user profile: {0}")]
    ProfileLoadFailed(String),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Returns a user-friendly message for display in the embedding application.
    pub fn user_message(&self) -> &str {
        match self {
            Self::NotInitialized => "Authentication is not set up yet. Please try again.",
            Self::NotAuthenticated | Self::ProfileNotLoaded => "Please sign in first.",
            Self::RefreshFailed => "Session expired. Please sign in again.",
            Self::Session(SessionError::Network(_)) => "Network error. Check your connection.",
            Self::Session(SessionError::Rejected(_)) => "Sign-in failed. Please try again.",
            Self::Session(SessionError::RefreshFailed(_)) => {
                "Session expired. Please sign in again."
            }
            _ => "An error occurred. Please try again.",
        }
    }

    /// Returns true if this error should trigger a sign-out.
    pub fn requires_sign_out(&self) -> bool {
        matches!(
            self,
            Self::RefreshFailed | Self::Session(SessionError::RefreshFailed(_))
        )
    }
}
