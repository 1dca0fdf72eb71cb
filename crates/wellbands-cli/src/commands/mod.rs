//! Subcommand implementations.

pub mod account;
pub mod checkout;
pub mod login;
pub mod logout;
pub mod password_reset;
pub mod refresh_token;
pub mod register;
pub mod token;
pub mod watch;

use anyhow::Result;

use crate::cli::Commands;
use crate::config::Config;
use crate::session::CliSession;

pub async fn handle(cmd: Commands, config: &Config) -> Result<()> {
    let session = CliSession::open(config)?;

    match cmd {
        Commands::Login(args) => login::run(args, &session).await,
        Commands::Register(args) => register::run(args, &session).await,
        Commands::Logout => logout::run(&session),
        Commands::Token(args) => token::run(args, &session).await,
        Commands::RefreshToken => refresh_token::run(&session).await,
        Commands::Whoami(args) => account::whoami(args, &session).await,
        Commands::Subscription(args) => account::subscription(args, &session).await,
        Commands::Checkout(args) => checkout::run(args, &session).await,
        Commands::Portal => account::portal(&session).await,
        Commands::ResetPortal(args) => account::reset_portal(args, &session).await,
        Commands::PasswordReset(args) => password_reset::run(args, &session).await,
        Commands::Watch(args) => watch::run(args, &session).await,
    }
}
