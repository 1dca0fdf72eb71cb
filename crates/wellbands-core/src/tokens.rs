//! Token types for Wellbands authentication.

use std::fmt;

macro_rules! opaque_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// The value is opaque and never shown by `Debug`.
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            /// The raw value, for request headers and bodies and for storage.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"[REDACTED]").finish()
            }
        }
    };
}

opaque_token! {
    /// Short-lived bearer credential sent as `Authorization: Bearer`.
    AccessToken
}

opaque_token! {
    /// Long-lived credential exchanged for a new [`AccessToken`]. Persisted
    /// only for sessions the user asked to remember.
    RefreshToken
}

/// A token set issued by the backend on login, registration or refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The new access token.
    pub access_token: AccessToken,
    /// The rotated refresh token, if the backend issued one.
    pub refresh_token: Option<RefreshToken>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_hides_value_in_debug() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("eyJ"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn refresh_token_hides_value_in_debug() {
        let token = RefreshToken::new("refresh_token_value_here");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("refresh_token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn grant_debug_redacts_both_tokens() {
        let grant = TokenGrant {
            access_token: AccessToken::new("T1"),
            refresh_token: Some(RefreshToken::new("R1")),
            expires_in: 3600,
        };
        let debug = format!("{:?}", grant);
        assert!(!debug.contains("T1"));
        assert!(!debug.contains("R1"));
        assert!(debug.contains("3600"));
    }
}
