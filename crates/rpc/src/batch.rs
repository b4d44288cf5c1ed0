//! Request and response framing for JSON-RPC batch POSTs.
//!
//! A batch is one HTTP POST carrying a JSON array of requests; the node
//! answers with an array of responses keyed by `id`, in arbitrary order.
//! Ids are drawn from one monotonically increasing counter for the whole
//! run, so every request/response pair is globally unique.

use alloy_primitives::{B256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// A single request inside a batch POST.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Value,
    id: u64,
}

impl BatchRequest {
    /// Creates a request for `method` with positional `params`.
    pub fn new(method: &'static str, params: Value, id: u64) -> Self {
        Self { jsonrpc: "2.0", method, params, id }
    }

    /// Returns the request id.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// A single response element of a batch POST.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    /// Id echoing the originating request.
    pub id: u64,
    /// Successful payload, absent on error.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload, absent on success.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object embedded in a response element.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Outcome of submitting a full run of raw transactions.
#[derive(Debug, Default)]
pub struct Submission {
    /// Transaction hashes acknowledged by the node, in submission order.
    pub hashes: Vec<B256>,
    /// Per-transaction and per-batch error messages.
    pub errors: Vec<String>,
}

impl Submission {
    /// Returns the number of acknowledged transactions.
    pub fn accepted(&self) -> usize {
        self.hashes.len()
    }
}

/// The subset of a transaction receipt the collector needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    /// Hash of the receipted transaction.
    pub transaction_hash: B256,
    /// Including block, absent while the transaction is pending.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Post-Byzantium execution status (`0x1` success, `0x0` revert).
    #[serde(default)]
    pub status: Option<U64>,
}

impl ReceiptSummary {
    /// Returns the including block number, 0 while unincluded.
    pub fn block_number(&self) -> u64 {
        self.block_number.map(|n| n.to::<u64>()).unwrap_or(0)
    }

    /// Returns false only for an explicit `status == 0x0` revert.
    pub fn is_success(&self) -> bool {
        self.status.map(|s| s != U64::ZERO).unwrap_or(true)
    }
}

/// Re-orders `responses` to match the request id sequence `base..base + len`.
///
/// Every batch call must come back with exactly one response per request;
/// anything else (missing ids, duplicates, strays) is a protocol violation
/// surfaced as [`RpcError::InvalidResponse`].
pub(crate) fn order_responses(
    base: u64,
    len: usize,
    mut responses: Vec<BatchResponse>,
) -> Result<Vec<BatchResponse>, RpcError> {
    if responses.len() != len {
        return Err(RpcError::InvalidResponse(format!(
            "expected {len} responses, got {}",
            responses.len()
        )));
    }
    responses.sort_unstable_by_key(|r| r.id);
    for (offset, response) in responses.iter().enumerate() {
        let expected = base + offset as u64;
        if response.id != expected {
            return Err(RpcError::InvalidResponse(format!(
                "expected id {expected}, got {}",
                response.id
            )));
        }
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(id: u64, result: Option<&str>) -> BatchResponse {
        BatchResponse {
            id,
            result: result.map(|r| Value::String(r.to_string())),
            error: None,
        }
    }

    #[test]
    fn test_request_serializes_as_jsonrpc_2() {
        let request = BatchRequest::new("eth_sendRawTransaction", serde_json::json!(["0xabcd"]), 7);
        let encoded = serde_json::to_value(&request).unwrap();

        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["method"], "eth_sendRawTransaction");
        assert_eq!(encoded["params"][0], "0xabcd");
        assert_eq!(encoded["id"], 7);
    }

    #[test]
    fn test_order_responses_restores_request_order() {
        let shuffled = vec![response(12, Some("c")), response(10, Some("a")), response(11, None)];
        let ordered = order_responses(10, 3, shuffled).unwrap();

        assert_eq!(ordered[0].id, 10);
        assert_eq!(ordered[1].id, 11);
        assert_eq!(ordered[2].id, 12);
    }

    #[test]
    fn test_order_responses_rejects_short_batch() {
        let err = order_responses(0, 2, vec![response(0, None)]).unwrap_err();
        assert!(matches!(err, RpcError::InvalidResponse(_)));
    }

    #[test]
    fn test_order_responses_rejects_stray_ids() {
        let err =
            order_responses(0, 2, vec![response(0, None), response(5, None)]).unwrap_err();
        assert!(matches!(err, RpcError::InvalidResponse(_)));
    }

    #[test]
    fn test_receipt_summary_decodes_camel_case() {
        let raw = r#"{
            "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "blockNumber": "0x10",
            "status": "0x1"
        }"#;
        let receipt: ReceiptSummary = serde_json::from_str(raw).unwrap();

        assert_eq!(receipt.block_number(), 16);
        assert!(receipt.is_success());
    }

    #[test]
    fn test_receipt_summary_pending_block_is_zero() {
        let raw = r#"{
            "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222"
        }"#;
        let receipt: ReceiptSummary = serde_json::from_str(raw).unwrap();

        assert_eq!(receipt.block_number(), 0);
        assert!(receipt.is_success());
    }

    #[test]
    fn test_receipt_summary_revert_status() {
        let raw = r#"{
            "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "blockNumber": "0x10",
            "status": "0x0"
        }"#;
        let receipt: ReceiptSummary = serde_json::from_str(raw).unwrap();
        assert!(!receipt.is_success());
    }
}
