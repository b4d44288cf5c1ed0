//! Nonce bootstrap, construction, and signing.

use futures::future::try_join_all;
use surge_rpc::NodeClient;
use surge_wallet::{AccountSet, SignedTx};
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::progress::ProgressObserver;
use crate::workload::Workload;

/// Fetches starting nonces, constructs the workload, and signs it.
///
/// Nonce fetches run in parallel, one request per ready account. Signing is
/// CPU-bound and runs in construction order, which keeps every sender's
/// nonces strictly increasing in the output. A transaction whose signature
/// fails is logged and dropped; the run continues with the rest.
pub async fn prepare_transactions<W: Workload>(
    client: &NodeClient,
    workload: &W,
    accounts: &mut AccountSet,
    ready: &[usize],
    transactions: u64,
    chain_id: u64,
    progress: &dyn ProgressObserver,
) -> Result<Vec<SignedTx>, RunnerError> {
    let nonces = try_join_all(
        ready.iter().map(|&index| client.transaction_count(accounts.subs[index].address())),
    )
    .await?;
    for (&index, nonce) in ready.iter().zip(nonces) {
        accounts.subs[index].set_nonce(nonce);
        debug!(account = accounts.subs[index].index(), nonce, "Starting nonce");
    }

    let unsigned = workload.construct(&mut accounts.subs, ready, transactions, chain_id)?;
    info!(transactions = unsigned.len(), "Constructed transactions, signing");

    let total = unsigned.len();
    let mut signed = Vec::with_capacity(total);
    for (i, item) in unsigned.into_iter().enumerate() {
        progress.on_item_started("sign", i, total);
        match accounts.subs[item.sender].sign(item.tx) {
            Ok(tx) => signed.push(tx),
            Err(err) => warn!(index = i, error = %err, "Signing failed, skipping transaction"),
        }
        progress.on_item_completed("sign", i, total);
    }

    if signed.len() < total {
        warn!(signed = signed.len(), total, "Some transactions were dropped during signing");
    }
    Ok(signed)
}
