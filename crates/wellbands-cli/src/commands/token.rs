//! Token command implementation.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Also print expiry and remember-me state
    #[arg(long)]
    pub verbose_info: bool,
}

pub async fn run(args: TokenArgs, session: &CliSession) -> Result<()> {
    let token = session.require_login().await?;

    // Bare token on stdout so it can be piped.
    println!("{}", token.as_str());

    if args.verbose_info {
        let stored = session.manager().load();
        if let Some(expires_at) = stored.expires_at() {
            output::info_field("Expires", &expires_at.to_rfc3339());
        }
        output::info_field("Remembered", &stored.remember_me.to_string());
    }

    Ok(())
}
