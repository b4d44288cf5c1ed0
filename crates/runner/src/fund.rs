//! Native balance distribution from the root account.
//!
//! Every sub-account is funded up to the full-workload requirement
//! `R = N × (P × G + V)` rather than an N/K share, so the workload can
//! reassign transactions between accounts without starving any of them.
//! When the root cannot cover everyone, shortfalls are served smallest
//! first to maximize the number of participating accounts.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, U256};
use alloy_rpc_types_eth::TransactionRequest;
use surge_rpc::NodeClient;
use surge_wallet::{Account, AccountSet};
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::progress::ProgressObserver;

/// How long one funding transfer may take to mine.
const FUNDING_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// A sub-account that needs topping up, ordered by amount ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Shortfall {
    /// Missing amount (wei or token units).
    pub(crate) amount: U256,
    /// Position in the sub-account slice.
    pub(crate) index: usize,
}

/// Pops shortfalls smallest-first while `budget` covers the next entry plus
/// `fee_per_transfer`, returning the affordable entries in funding order.
pub(crate) fn plan_greedy(
    heap: &mut BinaryHeap<Reverse<Shortfall>>,
    mut budget: U256,
    fee_per_transfer: U256,
) -> Vec<Shortfall> {
    let mut fundable = Vec::new();
    while let Some(Reverse(entry)) = heap.peek().copied() {
        let cost = entry.amount.saturating_add(fee_per_transfer);
        if budget < cost {
            break;
        }
        heap.pop();
        budget -= cost;
        fundable.push(entry);
    }
    fundable
}

/// Tops up sub-account native balances and returns the sorted indices of
/// every account holding at least `required` wei afterwards.
///
/// Fails with [`RunnerError::InsufficientFunds`] only when shortfalls exist
/// and the root cannot afford a single transfer; a partial top-up logs a
/// warning and proceeds with the funded subset.
pub async fn distribute_native(
    client: &NodeClient,
    accounts: &mut AccountSet,
    required: U256,
    gas_price: u128,
    chain_id: u64,
    progress: &dyn ProgressObserver,
) -> Result<Vec<usize>, RunnerError> {
    if accounts.subs.is_empty() {
        return Ok(Vec::new());
    }

    // Fee of one funding transfer, estimated at the full value R so large
    // top-ups cannot be under-estimated.
    let transfer_gas = estimate_transfer_gas(
        client,
        accounts.root.address(),
        accounts.subs[0].address(),
        required,
    )
    .await?;
    let fee = U256::from(transfer_gas).saturating_mul(U256::from(gas_price));

    let mut ready = Vec::new();
    let mut heap = BinaryHeap::new();
    for (index, sub) in accounts.subs.iter().enumerate() {
        let balance = client.balance(sub.address()).await?;
        if balance >= required {
            ready.push(index);
        } else {
            heap.push(Reverse(Shortfall { amount: required - balance, index }));
        }
    }

    if heap.is_empty() {
        info!(accounts = ready.len(), "All sub-accounts fully funded, nothing to distribute");
        return Ok(ready);
    }

    let shortfall_count = heap.len();
    let root_balance = client.balance(accounts.root.address()).await?;
    let fundable = plan_greedy(&mut heap, root_balance, fee);

    if fundable.is_empty() {
        return Err(RunnerError::InsufficientFunds(format!(
            "root balance {root_balance} cannot cover any of {shortfall_count} shortfalls \
             (smallest transfer needs fee {fee})"
        )));
    }
    if fundable.len() < shortfall_count {
        warn!(
            funded = fundable.len(),
            skipped = shortfall_count - fundable.len(),
            "Root cannot fund every sub-account, continuing with a subset"
        );
    }

    info!(accounts = fundable.len(), %required, "Distributing native funds");

    let total = fundable.len();
    for (item, entry) in fundable.into_iter().enumerate() {
        progress.on_item_started("fund", item, total);
        let to = accounts.subs[entry.index].address();
        fund_one(client, &mut accounts.root, to, entry.amount, transfer_gas, gas_price, chain_id)
            .await?;
        progress.on_item_completed("fund", item, total);
        ready.push(entry.index);
    }

    ready.sort_unstable();
    Ok(ready)
}

/// Sends one funding transfer and waits for it to mine.
async fn fund_one(
    client: &NodeClient,
    root: &mut Account,
    to: Address,
    amount: U256,
    gas_limit: u64,
    gas_price: u128,
    chain_id: u64,
) -> Result<(), RunnerError> {
    let tx = root.transfer_tx(to, amount, gas_limit, gas_price, chain_id);
    let signed = root.sign(tx)?;
    let hash = client.send_raw(&signed.raw).await?;
    debug!(%hash, %to, %amount, "Funding transfer sent");

    let receipt = client.wait_for_receipt(hash, FUNDING_RECEIPT_TIMEOUT).await?;
    if !receipt.is_success() {
        return Err(RunnerError::ExecutionFailed(hash));
    }
    Ok(())
}

async fn estimate_transfer_gas(
    client: &NodeClient,
    from: Address,
    to: Address,
    value: U256,
) -> Result<u64, RunnerError> {
    let request =
        TransactionRequest::default().with_from(from).with_to(to).with_value(value);
    match client.estimate_gas(request).await {
        Ok(gas) => Ok(gas),
        // Nodes reject value-carrying estimates from an under-funded sender;
        // fall back to a zero-value estimate and let the budget math decide.
        Err(err) => {
            debug!(error = %err, "Estimate at full value failed, retrying with zero value");
            let request = TransactionRequest::default()
                .with_from(from)
                .with_to(to)
                .with_value(U256::ZERO);
            Ok(client.estimate_gas(request).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_of(amounts: &[u64]) -> BinaryHeap<Reverse<Shortfall>> {
        amounts
            .iter()
            .enumerate()
            .map(|(index, amount)| Reverse(Shortfall { amount: U256::from(*amount), index }))
            .collect()
    }

    #[test]
    fn test_greedy_pops_smallest_shortfall_first() {
        let mut heap = heap_of(&[50, 10, 30]);
        let plan = plan_greedy(&mut heap, U256::from(1_000), U256::ZERO);

        let amounts: Vec<u64> = plan.iter().map(|s| s.amount.to::<u64>()).collect();
        assert_eq!(amounts, vec![10, 30, 50]);
    }

    #[test]
    fn test_greedy_stops_when_budget_runs_out() {
        let mut heap = heap_of(&[50, 10, 30]);
        // 10 + 30 fit; 50 does not.
        let plan = plan_greedy(&mut heap, U256::from(45), U256::ZERO);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].amount, U256::from(10));
        assert_eq!(plan[1].amount, U256::from(30));
    }

    #[test]
    fn test_greedy_accounts_for_transfer_fee() {
        let mut heap = heap_of(&[10, 10]);
        // Each transfer costs 10 + 5 fee; budget covers exactly one.
        let plan = plan_greedy(&mut heap, U256::from(16), U256::from(5));

        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_greedy_empty_budget_funds_nobody() {
        let mut heap = heap_of(&[1]);
        let plan = plan_greedy(&mut heap, U256::ZERO, U256::ZERO);
        assert!(plan.is_empty());
    }
}
