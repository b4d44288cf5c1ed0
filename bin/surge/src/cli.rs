//! CLI argument parsing and configuration.

use std::path::PathBuf;

use clap::Parser;
use surge_runner::{Mode, RunConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Stress-testing harness for EVM JSON-RPC nodes.
#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(about = "Stress-testing harness for EVM JSON-RPC nodes")]
pub(crate) struct Args {
    /// HTTP(S) JSON-RPC endpoint of the node under test.
    #[arg(long = "json-rpc")]
    pub json_rpc: String,

    /// BIP-39 mnemonic funding the run (index 0 is the root).
    #[arg(long, env = "SURGE_MNEMONIC", hide_env_values = true)]
    pub mnemonic: String,

    /// Number of sub-accounts carrying the workload.
    #[arg(long, default_value_t = 10)]
    pub sub_accounts: usize,

    /// Number of transactions to send.
    #[arg(long, default_value_t = 2000)]
    pub transactions: u64,

    /// Workload mode.
    #[arg(long, value_enum, ignore_case = true, default_value = "eoa")]
    pub mode: ModeArg,

    /// Write the result JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Transactions per JSON-RPC batch.
    #[arg(long, default_value_t = 20)]
    pub batch: usize,

    /// Verbose output (can be repeated for more verbosity).
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Workload selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ModeArg {
    /// Native transfers between sub-accounts.
    Eoa,
    /// ERC-20 transfers against a freshly deployed token.
    Erc20,
    /// ERC-721 mints against a freshly deployed collection.
    Erc721,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Eoa => Self::Eoa,
            ModeArg::Erc20 => Self::Erc20,
            ModeArg::Erc721 => Self::Erc721,
        }
    }
}

impl Args {
    /// Assembles the pipeline configuration.
    pub(crate) fn into_config(self) -> RunConfig {
        RunConfig {
            endpoint: self.json_rpc,
            mnemonic: self.mnemonic,
            sub_accounts: self.sub_accounts,
            transactions: self.transactions,
            batch_size: self.batch,
            mode: self.mode.into(),
            output: self.output,
        }
    }
}

/// Initialize tracing with the specified verbosity level.
pub(crate) fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "surge=info,surge_runner=info,surge_rpc=info,surge_wallet=info",
        1 => "surge=debug,surge_runner=debug,surge_rpc=debug,surge_wallet=debug",
        _ => "surge=trace,surge_runner=trace,surge_rpc=trace,surge_wallet=trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let args = Args::parse_from([
            "surge",
            "--json-rpc",
            "http://127.0.0.1:8545",
            "--mnemonic",
            "test test test test test test test test test test test junk",
        ]);

        assert_eq!(args.sub_accounts, 10);
        assert_eq!(args.transactions, 2000);
        assert_eq!(args.batch, 20);
        assert_eq!(args.mode, ModeArg::Eoa);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        let args = Args::parse_from([
            "surge",
            "--json-rpc",
            "http://127.0.0.1:8545",
            "--mnemonic",
            "m",
            "--mode",
            "ERC20",
        ]);
        assert_eq!(args.mode, ModeArg::Erc20);
    }

    #[test]
    fn test_missing_endpoint_is_rejected() {
        let parsed = Args::try_parse_from(["surge", "--mnemonic", "m"]);
        assert!(parsed.is_err());
    }
}
