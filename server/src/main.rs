// server/src/main.rs

// Entry point for the medbook server binary. Parses command-line
// arguments and dispatches to the CLI logic.

use anyhow::Result;
use medbook_server::cli::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    start_cli().await
}
