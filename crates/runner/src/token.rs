//! ERC-20 balance distribution from the root supply.
//!
//! Runs after native distribution in token mode. The target per ready
//! account is `⌈N / |ready|⌉` tokens; the root's token balance is the
//! budget, served smallest-shortfall-first like the native path.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use surge_rpc::NodeClient;
use surge_wallet::AccountSet;
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::fund::{Shortfall, plan_greedy};
use crate::progress::ProgressObserver;
use crate::workload::erc20::encode_transfer;

/// How long one token transfer may take to mine.
const TOKEN_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Tokens each ready account must hold to carry its share of `n` transfers.
pub(crate) fn tokens_per_account(n: u64, ready: usize) -> U256 {
    if ready == 0 {
        return U256::ZERO;
    }
    U256::from(n.div_ceil(ready as u64))
}

/// Tops up ERC-20 balances of the `ready` accounts and returns the sorted
/// subset that actually holds enough tokens afterwards.
#[allow(clippy::too_many_arguments)]
pub async fn distribute_tokens(
    client: &NodeClient,
    accounts: &mut AccountSet,
    ready: &[usize],
    contract: Address,
    n: u64,
    gas_limit: u64,
    gas_price: u128,
    chain_id: u64,
    progress: &dyn ProgressObserver,
) -> Result<Vec<usize>, RunnerError> {
    if ready.is_empty() {
        return Ok(Vec::new());
    }

    let required = tokens_per_account(n, ready.len());
    let mut funded = Vec::new();
    let mut heap = BinaryHeap::new();
    for &index in ready {
        let balance =
            token_balance(client, contract, accounts.subs[index].address()).await?;
        if balance >= required {
            funded.push(index);
        } else {
            heap.push(Reverse(Shortfall { amount: required - balance, index }));
        }
    }

    if heap.is_empty() {
        info!(accounts = funded.len(), "All sub-accounts hold enough tokens");
        return Ok(funded);
    }

    let shortfall_count = heap.len();
    let supply = token_balance(client, contract, accounts.root.address()).await?;
    let fundable = plan_greedy(&mut heap, supply, U256::ZERO);

    if fundable.is_empty() {
        return Err(RunnerError::InsufficientFunds(format!(
            "root token balance {supply} cannot cover any of {shortfall_count} shortfalls"
        )));
    }
    if fundable.len() < shortfall_count {
        warn!(
            funded = fundable.len(),
            skipped = shortfall_count - fundable.len(),
            "Token supply does not cover every sub-account, continuing with a subset"
        );
    }

    info!(accounts = fundable.len(), %required, "Distributing tokens");

    let total = fundable.len();
    for (item, entry) in fundable.into_iter().enumerate() {
        progress.on_item_started("token", item, total);
        let to = accounts.subs[entry.index].address();
        let calldata = encode_transfer(to, entry.amount);
        transfer_one(client, accounts, contract, calldata, gas_limit, gas_price, chain_id).await?;
        progress.on_item_completed("token", item, total);
        funded.push(entry.index);
    }

    funded.sort_unstable();
    Ok(funded)
}

/// Sends one token transfer from the root and waits for it to mine.
async fn transfer_one(
    client: &NodeClient,
    accounts: &mut AccountSet,
    contract: Address,
    calldata: Bytes,
    gas_limit: u64,
    gas_price: u128,
    chain_id: u64,
) -> Result<(), RunnerError> {
    let tx = accounts.root.call_tx(contract, calldata, gas_limit, gas_price, chain_id);
    let signed = accounts.root.sign(tx)?;
    let hash = client.send_raw(&signed.raw).await?;
    debug!(%hash, "Token transfer sent");

    let receipt = client.wait_for_receipt(hash, TOKEN_RECEIPT_TIMEOUT).await?;
    if !receipt.is_success() {
        return Err(RunnerError::ExecutionFailed(hash));
    }
    Ok(())
}

/// Reads `balanceOf(owner)` via `eth_call`.
pub(crate) async fn token_balance(
    client: &NodeClient,
    contract: Address,
    owner: Address,
) -> Result<U256, RunnerError> {
    let output = client.call(crate::workload::erc20::balance_of_request(contract, owner)).await?;
    crate::workload::erc20::decode_balance(&output)
}
