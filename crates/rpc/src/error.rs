//! Error types for RPC interactions.

use alloy_primitives::B256;
use thiserror::Error;

/// Errors that can occur when talking to the node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The endpoint URL could not be parsed.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP-level failure on a batched request.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider-level failure on a single-shot call.
    #[error("transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),

    /// The node returned a batch that does not match the request set.
    #[error("invalid batch response: {0}")]
    InvalidResponse(String),

    /// A receipt did not appear before the deadline.
    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(B256),
}
