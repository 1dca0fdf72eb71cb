//! Logout command implementation.

use anyhow::Result;

use crate::output;
use crate::session::CliSession;

pub fn run(session: &CliSession) -> Result<()> {
    session.context.logout();
    output::success("Logged out");
    Ok(())
}
