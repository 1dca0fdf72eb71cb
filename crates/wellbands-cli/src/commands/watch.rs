//! Watch command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures_util::StreamExt;
use serde::Serialize;

use wellbands_core::AuthState;
use wellbands_file::StorageWatcher;

use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Output state changes as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StateLine {
    authenticated: bool,
    remembered: bool,
    timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn run(args: WatchArgs, session: &CliSession) -> Result<()> {
    let context = &session.context;
    let mut changes = StorageWatcher::watch(session.config().layout.shared_files())
        .context("Failed to watch storage")?;
    let listener = context.spawn_event_listener();

    eprintln!("{}", "Watching for session changes...".dimmed());
    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());
    eprintln!();

    context.sync_from_storage();
    let mut last = context.state();
    print_state(&last, args.json);

    loop {
        tokio::select! {
            change = changes.next() => {
                let Some(change) = change else { break };
                tracing::debug!(path = %change.path.display(), "Storage changed");
                context.sync_from_storage();
                let state = context.state();
                if state != last {
                    print_state(&state, args.json);
                    last = state;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    listener.abort();
    Ok(())
}

fn print_state(state: &AuthState, json: bool) {
    if json {
        let line = StateLine {
            authenticated: state.is_authenticated(),
            remembered: state.remembered,
            timestamp: chrono::Utc::now(),
        };
        if let Ok(json) = serde_json::to_string(&line) {
            println!("{}", json);
        }
    } else if state.is_authenticated() {
        let mode = if state.remembered { "remembered" } else { "session only" };
        println!("{} {}", "SIGNED IN".green(), mode.dimmed());
    } else {
        println!("{}", "SIGNED OUT".red());
    }
}
