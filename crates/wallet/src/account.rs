//! Account derivation and EIP-155 legacy signing.

use alloy_consensus::{SignableTransaction, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};

use crate::error::WalletError;

/// Derives the signer for `m/44'/60'/0'/0/{index}` from a BIP-39 phrase.
pub fn derive_signer(phrase: &str, index: u32) -> Result<PrivateKeySigner, WalletError> {
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(index)
        .map_err(|source| WalletError::Derivation { index, source })?
        .build()
        .map_err(|source| WalletError::Build { index, source })
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTx {
    /// Transaction hash of the signed envelope.
    pub hash: B256,
    /// EIP-2718 encoding (plain RLP for legacy transactions).
    pub raw: Bytes,
}

/// A mnemonic-derived account with local nonce bookkeeping.
///
/// The nonce starts unset and is seeded from the chain once at engine
/// startup; afterwards every constructed transaction consumes exactly one
/// value through [`Account::take_nonce`].
#[derive(Debug, Clone)]
pub struct Account {
    index: u32,
    signer: PrivateKeySigner,
    address: Address,
    nonce: u64,
}

impl Account {
    /// Derives the account at the given mnemonic index.
    pub fn derive(phrase: &str, index: u32) -> Result<Self, WalletError> {
        let signer = derive_signer(phrase, index)?;
        let address = signer.address();
        Ok(Self { index, signer, address, nonce: 0 })
    }

    /// Returns the derivation index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the cached EVM address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the next nonce without consuming it.
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Seeds the local counter from the on-chain transaction count.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    /// Returns the current nonce and advances the counter by one.
    pub fn take_nonce(&mut self) -> u64 {
        let nonce = self.nonce;
        self.nonce += 1;
        nonce
    }

    /// Builds a native value transfer, consuming one nonce.
    pub fn transfer_tx(
        &mut self,
        to: Address,
        value: U256,
        gas_limit: u64,
        gas_price: u128,
        chain_id: u64,
    ) -> TxLegacy {
        TxLegacy {
            chain_id: Some(chain_id),
            nonce: self.take_nonce(),
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input: Bytes::new(),
        }
    }

    /// Builds a contract call carrying `input` calldata, consuming one nonce.
    pub fn call_tx(
        &mut self,
        to: Address,
        input: Bytes,
        gas_limit: u64,
        gas_price: u128,
        chain_id: u64,
    ) -> TxLegacy {
        TxLegacy {
            chain_id: Some(chain_id),
            nonce: self.take_nonce(),
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value: U256::ZERO,
            input,
        }
    }

    /// Builds a CREATE transaction deploying `bytecode`, consuming one nonce.
    pub fn deploy_tx(
        &mut self,
        bytecode: Bytes,
        gas_limit: u64,
        gas_price: u128,
        chain_id: u64,
    ) -> TxLegacy {
        TxLegacy {
            chain_id: Some(chain_id),
            nonce: self.take_nonce(),
            gas_price,
            gas_limit,
            to: TxKind::Create,
            value: U256::ZERO,
            input: bytecode,
        }
    }

    /// Signs a prepared legacy transaction and returns the raw bytes and hash.
    pub fn sign(&self, tx: TxLegacy) -> Result<SignedTx, WalletError> {
        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|source| WalletError::Signing { index: self.index, source })?;
        let signed = tx.into_signed(signature);
        Ok(SignedTx { hash: *signed.hash(), raw: signed.encoded_2718().into() })
    }
}

/// The root funder plus the sub-accounts carrying the workload.
#[derive(Debug)]
pub struct AccountSet {
    /// Index 0, the funding account.
    pub root: Account,
    /// Indices 1.., the workload senders.
    pub subs: Vec<Account>,
}

impl AccountSet {
    /// Derives the root and `min(sub_accounts, transactions)` sub-accounts.
    ///
    /// When more sub-accounts are requested than there are transactions to
    /// send, the surplus indices are never materialized.
    pub fn derive(
        phrase: &str,
        sub_accounts: usize,
        transactions: usize,
    ) -> Result<Self, WalletError> {
        let root = Account::derive(phrase, 0)?;
        let count = sub_accounts.min(transactions);
        let subs = (1..=count as u32)
            .map(|index| Account::derive(phrase, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { root, subs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's well-known development mnemonic.
    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_nonce_handle_is_consecutive() {
        let mut account = Account::derive(TEST_MNEMONIC, 1).unwrap();
        account.set_nonce(7);

        assert_eq!(account.take_nonce(), 7);
        assert_eq!(account.take_nonce(), 8);
        assert_eq!(account.take_nonce(), 9);
        assert_eq!(account.nonce(), 10);
    }

    #[test]
    fn test_transfer_tx_consumes_one_nonce() {
        let mut account = Account::derive(TEST_MNEMONIC, 1).unwrap();
        account.set_nonce(3);

        let to = Address::repeat_byte(0x11);
        let tx = account.transfer_tx(to, U256::from(1), 21_000, 1_000_000_000, 1);

        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.chain_id, Some(1));
        assert_eq!(account.nonce(), 4);
    }

    #[test]
    fn test_sign_produces_raw_bytes_and_hash() {
        let mut account = Account::derive(TEST_MNEMONIC, 1).unwrap();
        let tx = account.transfer_tx(Address::repeat_byte(0x22), U256::from(100), 21_000, 200, 1);

        let signed = account.sign(tx).unwrap();
        assert!(signed.raw.len() > 100);
        assert_ne!(signed.hash, B256::ZERO);
    }

    #[test]
    fn test_account_set_truncates_to_transaction_count() {
        let set = AccountSet::derive(TEST_MNEMONIC, 10, 3).unwrap();
        assert_eq!(set.subs.len(), 3);
        assert_eq!(set.root.index(), 0);
        assert_eq!(set.subs[0].index(), 1);
        assert_eq!(set.subs[2].index(), 3);
    }

    #[test]
    fn test_account_set_zero_transactions() {
        let set = AccountSet::derive(TEST_MNEMONIC, 10, 0).unwrap();
        assert!(set.subs.is_empty());
    }
}
