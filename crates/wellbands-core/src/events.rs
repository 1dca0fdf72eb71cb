//! Session lifecycle notifications.

use std::fmt;

/// Why the stored credential was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user logged out.
    Logout,
    /// The access token expired and no refresh token was stored.
    SessionExpired,
    /// The refresh endpoint rejected the refresh token or was unreachable.
    RefreshFailed,
    /// An API call was rejected and no fresh token could be obtained.
    LoginRequired,
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SignOutReason::Logout => "logged out",
            SignOutReason::SessionExpired => "session expired",
            SignOutReason::RefreshFailed => "token refresh failed",
            SignOutReason::LoginRequired => "login required",
        };
        f.write_str(text)
    }
}

/// Published by [`TokenManager`](crate::TokenManager) whenever the stored
/// credential changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { remembered: bool },
    Refreshed,
    SignedOut { reason: SignOutReason },
}

impl SessionEvent {
    /// Whether a consumer should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionEvent::SignedOut { reason } if *reason != SignOutReason::Logout
        )
    }
}
