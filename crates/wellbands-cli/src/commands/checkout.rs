//! Checkout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Plan to purchase
    #[arg(long)]
    pub plan: String,
}

/// Signed-in users check out with their token; everyone else anonymously.
pub async fn run(args: CheckoutArgs, session: &CliSession) -> Result<()> {
    let redirect = if session.context.restore().await.is_some() {
        session
            .api_client()
            .await?
            .create_checkout_session(&args.plan)
            .await
    } else {
        session.auth.create_checkout_session(&args.plan).await
    }
    .context("Failed to create checkout session")?;

    println!("{}", redirect.url);
    Ok(())
}
