//! orchd - local orchestration daemon.

use clap::Parser;
use std::process::ExitCode;

use orchd::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // The guard flushes the file log on drop.
    let _guard = match logging::init() {
        Ok((guard, _dir)) => guard,
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
