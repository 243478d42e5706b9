//! Slackbot - chat bot with slash commands over a synced message feed.

use clap::Parser;
use std::process::ExitCode;

use slackbot::cli::Commands;
use slackbot::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = match logging::init() {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
