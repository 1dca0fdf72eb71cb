//! Register command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use wellbands_core::Registration;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "WELLBANDS_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Checkout session the account is created for
    #[arg(long)]
    pub session_id: String,
}

pub async fn run(args: RegisterArgs, session: &CliSession) -> Result<()> {
    let registration = Registration::new(&args.email, &args.password, &args.session_id)
        .context("Invalid email")?;

    eprintln!("{}", "Creating account...".dimmed());

    session
        .context
        .register(&session.auth, &registration)
        .await
        .context("Failed to register")?;

    output::success("Account created");
    println!();
    output::session_summary(&session.manager().load());

    Ok(())
}
