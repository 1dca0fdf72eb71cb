//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{
    account, checkout, login, logout, password_reset, refresh_token, register, token, watch,
};
use crate::config::ConfigArgs;

/// Command-line client for the Wellbands API.
#[derive(Parser, Debug)]
#[command(name = "wellbands")]
#[command(author, version = env!("WELLBANDS_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with email and password
    Login(login::LoginArgs),

    /// Create an account for a completed checkout session
    Register(register::RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Print a valid access token, renewing it if needed
    Token(token::TokenArgs),

    /// Exchange the stored refresh token for new tokens
    RefreshToken,

    /// Validate the session and show the account
    Whoami(account::JsonArgs),

    /// Show the subscription status
    Subscription(account::JsonArgs),

    /// Start a checkout for a plan
    Checkout(checkout::CheckoutArgs),

    /// Open a billing portal session
    Portal,

    /// Show the reset portal details
    ResetPortal(account::JsonArgs),

    /// Send a password reset email
    PasswordReset(password_reset::PasswordResetArgs),

    /// Follow session changes made by other processes
    Watch(watch::WatchArgs),
}
