//! Login and registration credentials.

use std::fmt;

use crate::Result;
use crate::error::InvalidInputError;

/// Login credentials for the Wellbands backend.
///
/// # Security
///
/// The password is never exposed in Debug output to prevent accidental logging.
///
/// # Example
///
/// ```
/// use wellbands_core::Credentials;
///
/// let creds = Credentials::new("a@b.com", "x").unwrap().remember_me(true);
/// assert_eq!(creds.email(), "a@b.com");
/// assert!(creds.is_remembered());
/// ```
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
    remember_me: bool,
}

impl Credentials {
    /// Create new credentials with "remember me" off.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is not plausibly an address.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let email = email.into();
        validate_email(&email)?;
        Ok(Self {
            email,
            password: password.into(),
            remember_me: false,
        })
    }

    /// Set the "remember me" flag.
    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    /// Returns the email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the password.
    ///
    /// # Security
    ///
    /// Use this only when constructing authentication requests.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether the session should survive process exit.
    pub fn is_remembered(&self) -> bool {
        self.remember_me
    }
}

// Intentionally hide password in Debug output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Account registration details, submitted after a completed checkout.
#[derive(Clone)]
pub struct Registration {
    email: String,
    password: String,
    session_id: String,
}

impl Registration {
    /// Create a registration for the given checkout session.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self> {
        let email = email.into();
        validate_email(&email)?;
        Ok(Self {
            email,
            password: password.into(),
            session_id: session_id.into(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// The checkout session id issued by the payment provider.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("session_id", &self.session_id)
            .finish()
    }
}

fn validate_email(email: &str) -> Result<()> {
    let reason = match email.split_once('@') {
        None => Some("missing '@'"),
        Some(("", _)) => Some("empty local part"),
        Some((_, domain)) if domain.is_empty() => Some("empty domain"),
        Some((_, domain)) if domain.contains('@') => Some("more than one '@'"),
        _ if email.chars().any(char::is_whitespace) => Some("contains whitespace"),
        _ => None,
    };

    match reason {
        Some(reason) => Err(InvalidInputError::Email {
            value: email.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
