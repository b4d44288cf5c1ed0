//! Surge - stress-testing harness for EVM JSON-RPC nodes.

mod cli;

use clap::Parser;
use cli::Args;
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignores errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    cli::init_tracing(args.verbose);

    surge_runner::run(args.into_config()).await
}
