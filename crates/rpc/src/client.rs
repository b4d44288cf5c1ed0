//! HTTP client for querying and loading a single node endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, ReceiptResponse};
use alloy_primitives::{Address, B256, Bytes, U64, U256, hex};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::{NoParams, RpcClient};
use alloy_rpc_types_eth::{Block, TransactionRequest};
use futures::future::join_all;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use url::Url;

use crate::batch::{BatchRequest, BatchResponse, ReceiptSummary, Submission, order_responses};
use crate::error::RpcError;
use crate::txpool::TxpoolStatus;

/// Client for one JSON-RPC endpoint.
///
/// Single-shot calls go through the alloy provider; batched submission and
/// receipt sweeps go through raw JSON array POSTs on a shared `reqwest`
/// connection pool. Batch ids come from one counter that only moves forward
/// for the lifetime of the client.
#[derive(Debug)]
pub struct NodeClient {
    provider: RootProvider<Ethereum>,
    http: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl NodeClient {
    /// Connects to the given HTTP(S) endpoint.
    pub fn connect(url: &str) -> Result<Self, RpcError> {
        let endpoint: Url = url.parse()?;
        let client = RpcClient::builder().http(endpoint.clone());
        let provider = RootProvider::<Ethereum>::new(client);

        Ok(Self { provider, http: reqwest::Client::new(), endpoint, next_id: AtomicU64::new(0) })
    }

    /// Returns the endpoint this client talks to.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches the chain id.
    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.provider.get_chain_id().await?)
    }

    /// Fetches the current gas price in wei.
    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        Ok(self.provider.get_gas_price().await?)
    }

    /// Estimates gas for the given call.
    pub async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RpcError> {
        Ok(self.provider.estimate_gas(request).await?)
    }

    /// Fetches the transaction count (next nonce) at the latest block.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .block_id(BlockNumberOrTag::Latest.into())
            .await?)
    }

    /// Fetches the native balance of an address.
    pub async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        Ok(self.provider.get_balance(address).await?)
    }

    /// Fetches the latest block number.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.provider.get_block_number().await?)
    }

    /// Fetches a block by number (transaction hashes only).
    pub async fn block_by_number(&self, number: u64) -> Result<Option<Block>, RpcError> {
        Ok(self.provider.get_block_by_number(BlockNumberOrTag::Number(number)).await?)
    }

    /// Executes a read-only `eth_call`.
    pub async fn call(&self, request: TransactionRequest) -> Result<Bytes, RpcError> {
        Ok(self.provider.call(request).await?)
    }

    /// Submits one raw transaction and returns its hash.
    pub async fn send_raw(&self, raw: &Bytes) -> Result<B256, RpcError> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    /// Polls for a receipt once per second until `deadline` elapses.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        deadline: Duration,
    ) -> Result<ReceiptSummary, RpcError> {
        timeout(deadline, async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                    return Ok(ReceiptSummary {
                        transaction_hash: receipt.transaction_hash(),
                        block_number: receipt.block_number().map(U64::from),
                        status: Some(U64::from(receipt.status() as u64)),
                    });
                }
                sleep(Duration::from_secs(1)).await;
            }
        })
        .await
        .map_err(|_| RpcError::ReceiptTimeout(hash))?
    }

    /// Queries the non-standard `txpool_status` method.
    pub async fn txpool_status(&self) -> Result<TxpoolStatus, RpcError> {
        Ok(self.provider.raw_request("txpool_status".into(), NoParams::default()).await?)
    }

    /// Posts one JSON array of requests and returns the responses in
    /// request order.
    async fn post_batch(&self, batch: &[BatchRequest]) -> Result<Vec<BatchResponse>, RpcError> {
        let base = batch.first().map(BatchRequest::id).unwrap_or_default();
        let response = self.http.post(self.endpoint.clone()).json(batch).send().await?;
        let responses: Vec<BatchResponse> = response.json().await?;
        order_responses(base, batch.len(), responses)
    }

    /// Submits raw transactions as concurrent `eth_sendRawTransaction`
    /// batches of `batch_size` (the last batch may be short).
    ///
    /// Per-transaction rejections and whole-batch transport failures are
    /// recorded in the returned [`Submission`]; neither aborts the run and
    /// nothing is retried.
    pub async fn submit_transactions(&self, raw_txs: &[Bytes], batch_size: usize) -> Submission {
        let batch_size = batch_size.max(1);
        let batches: Vec<Vec<BatchRequest>> = raw_txs
            .chunks(batch_size)
            .map(|chunk| {
                let base = self.next_id.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                chunk
                    .iter()
                    .enumerate()
                    .map(|(offset, raw)| {
                        BatchRequest::new(
                            "eth_sendRawTransaction",
                            json!([hex::encode_prefixed(raw)]),
                            base + offset as u64,
                        )
                    })
                    .collect()
            })
            .collect();

        debug!(transactions = raw_txs.len(), batches = batches.len(), "Submitting transactions");

        let results = join_all(batches.iter().map(|batch| self.post_batch(batch))).await;

        let mut submission = Submission::default();
        for (batch, result) in batches.iter().zip(results) {
            match result {
                Ok(responses) => {
                    for response in responses {
                        match (response.result, response.error) {
                            (_, Some(err)) => submission
                                .errors
                                .push(format!("tx rejected (code {}): {}", err.code, err.message)),
                            (Some(Value::String(hash)), None) => match hash.parse() {
                                Ok(hash) => submission.hashes.push(hash),
                                Err(_) => submission
                                    .errors
                                    .push(format!("unparseable tx hash in response: {hash}")),
                            },
                            (result, None) => submission
                                .errors
                                .push(format!("malformed submission response: {result:?}")),
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, transactions = batch.len(), "Batch submission failed");
                    for request in batch {
                        submission.errors.push(format!("batch failed (id {}): {err}", request.id()));
                    }
                }
            }
        }

        submission
    }

    /// Runs one batched `eth_getTransactionReceipt` sweep over `hashes`.
    ///
    /// Hashes whose response carries no receipt yet come back as `None` and
    /// remain outstanding; a failed batch leaves its whole chunk outstanding.
    pub async fn fetch_receipts(
        &self,
        hashes: &[B256],
        batch_size: usize,
    ) -> Vec<(B256, Option<ReceiptSummary>)> {
        let batch_size = batch_size.max(1);
        let batches: Vec<(Vec<B256>, Vec<BatchRequest>)> = hashes
            .chunks(batch_size)
            .map(|chunk| {
                let base = self.next_id.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                let requests = chunk
                    .iter()
                    .enumerate()
                    .map(|(offset, hash)| {
                        BatchRequest::new(
                            "eth_getTransactionReceipt",
                            json!([hash]),
                            base + offset as u64,
                        )
                    })
                    .collect();
                (chunk.to_vec(), requests)
            })
            .collect();

        let results = join_all(batches.iter().map(|(_, batch)| self.post_batch(batch))).await;

        let mut receipts = Vec::with_capacity(hashes.len());
        for ((chunk, _), result) in batches.iter().zip(results) {
            match result {
                Ok(responses) => {
                    for (hash, response) in chunk.iter().zip(responses) {
                        let summary = match response.result {
                            Some(Value::Null) | None => None,
                            Some(value) => match serde_json::from_value(value) {
                                Ok(summary) => Some(summary),
                                Err(err) => {
                                    warn!(%hash, error = %err, "Malformed receipt, keeping outstanding");
                                    None
                                }
                            },
                        };
                        receipts.push((*hash, summary));
                    }
                }
                Err(err) => {
                    warn!(error = %err, transactions = chunk.len(), "Receipt batch failed");
                    receipts.extend(chunk.iter().map(|hash| (*hash, None)));
                }
            }
        }

        receipts
    }
}
