//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use wellbands_core::{Error, StoredCredential};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error and its causes to stderr.
///
/// A backend rejection is shown as the server's own message, so the
/// protocol wrapper text never reaches the user.
pub fn report(err: &anyhow::Error) {
    for (depth, cause) in err.chain().enumerate() {
        let (line, last) = match cause.downcast_ref::<Error>() {
            Some(Error::Protocol(p)) => (p.user_message(), true),
            _ => (cause.to_string(), false),
        };

        if depth == 0 {
            eprintln!("{} {}", "✗".red(), line);
        } else {
            eprintln!("  {}", line);
        }

        if last {
            break;
        }
    }
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a labeled field to stderr, leaving stdout for data.
pub fn info_field(label: &str, value: &str) {
    eprintln!("{}: {}", label.dimmed(), value);
}

/// Print expiry and remember-me state, never the tokens themselves.
pub fn session_summary(stored: &StoredCredential) {
    match stored.expires_at() {
        Some(expires_at) => field("Expires", &expires_at.to_rfc3339()),
        None => field("Expires", "unknown"),
    }
    field("Remembered", &stored.remember_me.to_string());
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
