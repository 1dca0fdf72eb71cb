//! Commands that call the bearer-authenticated account endpoints.

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Print the response as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn whoami(args: JsonArgs, session: &CliSession) -> Result<()> {
    let client = session.api_client().await?;
    let account = client.validate().await.context("Failed to validate session")?;

    if args.json {
        return output::json_pretty(&account);
    }

    output::field("Valid", &account.valid.to_string());
    output::field("Plan", account.plan.as_deref().unwrap_or("none"));
    for (key, value) in &account.extra {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        output::field(key, &value);
    }
    output::session_summary(&session.manager().load());

    Ok(())
}

pub async fn subscription(args: JsonArgs, session: &CliSession) -> Result<()> {
    let client = session.api_client().await?;
    let status = client
        .subscription_status()
        .await
        .context("Failed to fetch subscription status")?;

    if args.json {
        return output::json_pretty(&status);
    }

    output::field("Status", &status.subscription_status);
    output::field("Basic purchased", &status.has_purchased_basic.to_string());
    if let Some(trial_end) = &status.trial_end_date {
        output::field("Trial ends", trial_end);
    }

    Ok(())
}

pub async fn portal(session: &CliSession) -> Result<()> {
    let client = session.api_client().await?;
    let redirect = client
        .create_portal_session()
        .await
        .context("Failed to open billing portal")?;

    println!("{}", redirect.url);
    Ok(())
}

pub async fn reset_portal(args: JsonArgs, session: &CliSession) -> Result<()> {
    let client = session.api_client().await?;
    let portal = client
        .reset_portal()
        .await
        .context("Failed to load reset portal")?;

    if args.json {
        return output::json_pretty(&portal);
    }

    output::field("Email", &portal.email);
    Ok(())
}
