//! Mempool counters from the non-standard `txpool_status` method.

use serde::{Deserialize, Deserializer, de};

/// Pending and queued transaction counts reported by the node.
///
/// Geth reports the counters as hex quantity strings (`"0x0"`), which is the
/// canonical form here; plain JSON numbers are accepted for nodes that emit
/// them instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TxpoolStatus {
    /// Transactions executable with the current state.
    #[serde(deserialize_with = "lenient_quantity")]
    pub pending: u64,
    /// Transactions parked behind a nonce gap.
    #[serde(deserialize_with = "lenient_quantity")]
    pub queued: u64,
}

impl TxpoolStatus {
    /// Returns true once the pool holds no transactions at all.
    pub const fn is_drained(&self) -> bool {
        self.pending == 0 && self.queued == 0
    }
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(u64),
        Text(String),
    }

    match Quantity::deserialize(deserializer)? {
        Quantity::Number(n) => Ok(n),
        Quantity::Text(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed.map_err(|_| de::Error::custom(format!("invalid quantity: {s}")))
        }
    }
}
