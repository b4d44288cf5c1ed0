//! Error types for the stress pipeline.

use alloy_primitives::B256;
use thiserror::Error;

/// Errors that can abort a stress run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The root cannot fund a single sub-account (native or token).
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A contract-backed accessor was used before `init` deployed it.
    #[error("workload not initialized: {0}")]
    NotInitialized(&'static str),

    /// A mined transaction reverted (`status == 0x0`).
    #[error("transaction execution failed: {0}")]
    ExecutionFailed(B256),

    /// Account derivation or signing failure.
    #[error(transparent)]
    Wallet(#[from] surge_wallet::WalletError),

    /// RPC failure on a call the pipeline cannot continue without.
    #[error(transparent)]
    Rpc(#[from] surge_rpc::RpcError),

    /// A contract call returned data the ABI bindings cannot decode.
    #[error("malformed contract response: {0}")]
    AbiDecode(#[from] alloy_sol_types::Error),
}
