//! Mode-specific transaction construction.
//!
//! A workload owns the gas parameters observed from the node and turns the
//! ready account set into N populated legacy transactions. Nonces advance
//! synchronously through the account handles during construction, so after
//! [`Workload::construct`] returns every account's counter reflects its
//! expected post-submission chain state.

pub(crate) mod eoa;
pub(crate) mod erc20;
pub(crate) mod erc721;

use alloy_consensus::TxLegacy;
use alloy_primitives::U256;
use surge_rpc::NodeClient;
use surge_wallet::{Account, AccountSet};

use crate::error::RunnerError;
use crate::progress::ProgressObserver;

pub use eoa::EoaWorkload;
pub use erc20::Erc20Workload;
pub use erc721::Erc721Workload;

/// A constructed transaction waiting for its sender's signature.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    /// Index of the sending account in the sub-account slice.
    pub sender: usize,
    /// The populated legacy transaction.
    pub tx: TxLegacy,
}

/// One workload mode of the stress pipeline.
#[allow(async_fn_in_trait)]
pub trait Workload {
    /// Performs one-time setup (contract deployment for token modes).
    async fn init(
        &mut self,
        client: &NodeClient,
        accounts: &mut AccountSet,
        chain_id: u64,
    ) -> Result<(), RunnerError>;

    /// Observes the node's gas price and fixes P for the whole run.
    async fn fetch_gas_price(&mut self, client: &NodeClient) -> Result<(), RunnerError>;

    /// Estimates the base transaction and fixes the gas limit G.
    async fn estimate_base_gas(
        &mut self,
        client: &NodeClient,
        accounts: &AccountSet,
    ) -> Result<(), RunnerError>;

    /// Per-transaction intrinsic value V.
    fn value(&self) -> U256;

    /// Gas limit applied to every constructed transaction.
    fn gas_limit(&self) -> Result<u64, RunnerError>;

    /// Gas price applied to every constructed transaction.
    fn gas_price(&self) -> Result<u128, RunnerError>;

    /// Native balance a sub-account needs to carry the full workload:
    /// `transactions × (P × G + V)`.
    fn required_balance(&self, transactions: u64) -> Result<U256, RunnerError> {
        let per_tx = U256::from(self.gas_price()?)
            .saturating_mul(U256::from(self.gas_limit()?))
            .saturating_add(self.value());
        Ok(U256::from(transactions).saturating_mul(per_tx))
    }

    /// Distributes workload-specific assets to the ready accounts.
    ///
    /// The default keeps the ready set untouched; ERC-20 replaces it with
    /// the subset that received tokens.
    async fn distribute_assets(
        &self,
        _client: &NodeClient,
        _accounts: &mut AccountSet,
        ready: &[usize],
        _transactions: u64,
        _chain_id: u64,
        _progress: &dyn ProgressObserver,
    ) -> Result<Vec<usize>, RunnerError> {
        Ok(ready.to_vec())
    }

    /// Produces `transactions` populated requests round-robining over the
    /// ready accounts, consuming one nonce per transaction.
    fn construct(
        &self,
        subs: &mut [Account],
        ready: &[usize],
        transactions: u64,
        chain_id: u64,
    ) -> Result<Vec<UnsignedTx>, RunnerError>;

    /// One-line banner describing the run.
    fn start_message(&self) -> String;
}

/// Gas parameters observed from the node before construction starts.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TxCost {
    gas_limit: Option<u64>,
    gas_price: Option<u128>,
}

impl TxCost {
    pub(crate) fn set_gas_limit(&mut self, gas_limit: u64) {
        self.gas_limit = Some(gas_limit);
    }

    pub(crate) fn set_gas_price(&mut self, gas_price: u128) {
        self.gas_price = Some(gas_price);
    }

    pub(crate) fn gas_limit(&self) -> Result<u64, RunnerError> {
        self.gas_limit.ok_or(RunnerError::NotInitialized("base gas not estimated"))
    }

    pub(crate) fn gas_price(&self) -> Result<u128, RunnerError> {
        self.gas_price.ok_or(RunnerError::NotInitialized("gas price not fetched"))
    }
}
