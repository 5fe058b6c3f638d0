//! buildref CLI entry point
//!
//! Parses the command line, runs the command and prints failures with their
//! suggestions before exiting with status 1.

use anyhow::Result;
use buildref::cli;
use buildref::core::error::user_friendly_error;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
