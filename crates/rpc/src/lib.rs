//! JSON-RPC plumbing for the surge stress harness.
//!
//! [`NodeClient`] wraps a single HTTP endpoint with two access paths:
//! single-shot calls through an alloy provider, and hand-built JSON array
//! POSTs for the batched `eth_sendRawTransaction` / `eth_getTransactionReceipt`
//! pipeline. Both share one keep-alive connection pool; there is no rate
//! limiter, so throughput is bounded only by the node.

mod batch;
mod client;
mod error;
mod txpool;

pub use batch::{BatchRequest, BatchResponse, ReceiptSummary, RpcErrorObject, Submission};
pub use client::NodeClient;
pub use error::RpcError;
pub use txpool::TxpoolStatus;
