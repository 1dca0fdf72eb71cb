//! Refresh token command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use wellbands_core::error::AuthError;

use crate::output;
use crate::session::CliSession;

pub async fn run(session: &CliSession) -> Result<()> {
    let manager = session.manager();
    let refresh_token = manager
        .load()
        .refresh_token
        .ok_or(AuthError::RefreshTokenMissing)
        .context("Only remembered sessions can be refreshed. Log in with --remember-me.")?;

    eprintln!("{}", "Refreshing session...".dimmed());

    manager
        .refresh_token(&refresh_token)
        .await
        .context("Token refresh failed; the session was cleared. Run 'wellbands login' again.")?;

    output::success("Session refreshed");
    println!();
    output::session_summary(&manager.load());

    Ok(())
}
