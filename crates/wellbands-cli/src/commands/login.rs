//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use wellbands_core::Credentials;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "WELLBANDS_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Keep the session across restarts
    #[arg(long)]
    pub remember_me: bool,
}

pub async fn run(args: LoginArgs, session: &CliSession) -> Result<()> {
    let credentials = Credentials::new(&args.email, &args.password)
        .context("Invalid email")?
        .remember_me(args.remember_me);

    eprintln!("{}", "Logging in...".dimmed());

    session
        .context
        .login(&session.auth, &credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::session_summary(&session.manager().load());

    Ok(())
}
