//! Password reset command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct PasswordResetArgs {
    /// Account email
    #[arg(long)]
    pub email: String,
}

pub async fn run(args: PasswordResetArgs, session: &CliSession) -> Result<()> {
    session
        .auth
        .request_password_reset(&args.email)
        .await
        .context("Failed to request password reset")?;

    output::success(&format!("Password reset email sent to {}", args.email));
    Ok(())
}
