//! Error types for account derivation and signing.

use thiserror::Error;

/// Errors that can occur while deriving or using wallet accounts.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The mnemonic phrase or derivation path was rejected.
    #[error("account derivation failed for index {index}: {source}")]
    Derivation {
        /// Derivation index that failed.
        index: u32,
        /// Underlying mnemonic error.
        #[source]
        source: alloy_signer_local::LocalSignerError,
    },

    /// Building the signer from derived key material failed.
    #[error("signer construction failed for index {index}: {source}")]
    Build {
        /// Derivation index that failed.
        index: u32,
        /// Underlying signer error.
        #[source]
        source: alloy_signer_local::LocalSignerError,
    },

    /// Signing a prepared transaction failed.
    #[error("signing failed for account {index}: {source}")]
    Signing {
        /// Mnemonic index of the signing account.
        index: u32,
        /// Underlying signer error.
        #[source]
        source: alloy_signer::Error,
    },
}
