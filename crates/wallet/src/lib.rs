//! Mnemonic-derived accounts for the surge stress harness.
//!
//! Accounts are derived from a single BIP-39 phrase along the standard
//! Ethereum path `m/44'/60'/0'/0/{index}`. Index 0 is the root funder;
//! indices 1.. are the sub-accounts that carry the workload. Each account
//! owns its signer, its cached address, and the local nonce counter that is
//! the sole source of the `nonce` field for every transaction it signs.

mod account;
mod error;

pub use account::{Account, AccountSet, SignedTx, derive_signer};
pub use error::WalletError;
