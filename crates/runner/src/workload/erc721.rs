//! ERC-721 minting workload against a freshly deployed collection.

use std::time::Duration;

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, U256, hex};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::SolCall;
use surge_rpc::NodeClient;
use surge_wallet::{Account, AccountSet};
use tracing::{debug, info};

use crate::error::RunnerError;
use crate::workload::{TxCost, UnsignedTx, Workload};

alloy_sol_macro::sol! {
    interface ICollection {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function createNFT(string tokenURI) external returns (uint256);
    }
}

/// Compiled collection artifact, consumed as an opaque deployment blob.
const NFT_BYTECODE_HEX: &str = include_str!("../../contracts/nft_bytecode.hex");

/// Gas limit for the deployment transaction.
const DEPLOY_GAS_LIMIT: u64 = 5_000_000;

/// How long the deployment may take to mine.
const DEPLOY_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Metadata URI minted into every token.
const TOKEN_URI: &str = "https://surge.invalid/nft/metadata.json";

/// Round-robin `createNFT(tokenURI)` mints: every transaction is a mint by
/// the next ready account; no receiver participates.
#[derive(Debug, Default)]
pub struct Erc721Workload {
    cost: TxCost,
    contract: Option<Address>,
    name: String,
    symbol: String,
}

impl Erc721Workload {
    /// Creates the workload; `init` deploys the collection.
    pub fn new() -> Self {
        Self::default()
    }

    fn contract(&self) -> Result<Address, RunnerError> {
        self.contract.ok_or(RunnerError::NotInitialized("collection contract not deployed"))
    }

    fn deploy_bytecode() -> Bytes {
        let bytecode = hex::decode(NFT_BYTECODE_HEX.trim().trim_start_matches("0x"))
            .expect("invalid collection bytecode hex");
        Bytes::from(bytecode)
    }

    fn encode_mint() -> Bytes {
        ICollection::createNFTCall { tokenURI: TOKEN_URI.to_string() }.abi_encode().into()
    }
}

impl Workload for Erc721Workload {
    async fn init(
        &mut self,
        client: &NodeClient,
        accounts: &mut AccountSet,
        chain_id: u64,
    ) -> Result<(), RunnerError> {
        let gas_price = self.cost.gas_price()?;
        let deploy_nonce = accounts.root.nonce();
        let tx = accounts.root.deploy_tx(
            Self::deploy_bytecode(),
            DEPLOY_GAS_LIMIT,
            gas_price,
            chain_id,
        );
        let signed = accounts.root.sign(tx)?;
        let hash = client.send_raw(&signed.raw).await?;
        debug!(%hash, "Deploying collection contract");

        let receipt = client.wait_for_receipt(hash, DEPLOY_RECEIPT_TIMEOUT).await?;
        if !receipt.is_success() {
            return Err(RunnerError::ExecutionFailed(hash));
        }
        let contract = accounts.root.address().create(deploy_nonce);
        self.contract = Some(contract);

        let name_out = client
            .call(
                TransactionRequest::default()
                    .with_to(contract)
                    .with_input(Bytes::from(ICollection::nameCall {}.abi_encode())),
            )
            .await?;
        self.name = ICollection::nameCall::abi_decode_returns(&name_out)?;

        let symbol_out = client
            .call(
                TransactionRequest::default()
                    .with_to(contract)
                    .with_input(Bytes::from(ICollection::symbolCall {}.abi_encode())),
            )
            .await?;
        self.symbol = ICollection::symbolCall::abi_decode_returns(&symbol_out)?;

        info!(%contract, name = %self.name, symbol = %self.symbol, "Collection deployed");
        Ok(())
    }

    async fn fetch_gas_price(&mut self, client: &NodeClient) -> Result<(), RunnerError> {
        self.cost.set_gas_price(client.gas_price().await?);
        Ok(())
    }

    async fn estimate_base_gas(
        &mut self,
        client: &NodeClient,
        accounts: &AccountSet,
    ) -> Result<(), RunnerError> {
        let request = TransactionRequest::default()
            .with_from(accounts.root.address())
            .with_to(self.contract()?)
            .with_input(Self::encode_mint());
        self.cost.set_gas_limit(client.estimate_gas(request).await?);
        Ok(())
    }

    fn value(&self) -> U256 {
        U256::ZERO
    }

    fn gas_limit(&self) -> Result<u64, RunnerError> {
        self.cost.gas_limit()
    }

    fn gas_price(&self) -> Result<u128, RunnerError> {
        self.cost.gas_price()
    }

    fn construct(
        &self,
        subs: &mut [Account],
        ready: &[usize],
        transactions: u64,
        chain_id: u64,
    ) -> Result<Vec<UnsignedTx>, RunnerError> {
        let contract = self.contract()?;
        let gas_limit = self.gas_limit()?;
        let gas_price = self.gas_price()?;
        let k = ready.len();

        let mut txs = Vec::with_capacity(transactions as usize);
        for i in 0..transactions as usize {
            let sender = ready[i % k];
            let tx =
                subs[sender].call_tx(contract, Self::encode_mint(), gas_limit, gas_price, chain_id);
            txs.push(UnsignedTx { sender, tx });
        }
        Ok(txs)
    }

    fn start_message(&self) -> String {
        format!("Starting ERC-721 workload: minting {} ({})", self.name, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_mint_calldata_round_trips_token_uri() {
        let calldata = Erc721Workload::encode_mint();
        let decoded = ICollection::createNFTCall::abi_decode(&calldata).unwrap();
        assert_eq!(decoded.tokenURI, TOKEN_URI);
    }

    #[test]
    fn test_construct_mints_from_each_ready_account() {
        let mut workload = Erc721Workload::new();
        workload.cost.set_gas_limit(150_000);
        workload.cost.set_gas_price(2_000);
        let contract = Address::repeat_byte(0xaa);
        workload.contract = Some(contract);

        let mut subs: Vec<Account> =
            (1..=3).map(|i| Account::derive(TEST_MNEMONIC, i).unwrap()).collect();
        let txs = workload.construct(&mut subs, &[0, 1, 2], 5, 1).unwrap();

        assert_eq!(txs.len(), 5);
        let senders: Vec<usize> = txs.iter().map(|t| t.sender).collect();
        assert_eq!(senders, vec![0, 1, 2, 0, 1]);
        for unsigned in &txs {
            assert_eq!(unsigned.tx.to, alloy_primitives::TxKind::Call(contract));
            assert_eq!(unsigned.tx.value, U256::ZERO);
        }
    }

    #[test]
    fn test_construct_before_init_fails() {
        let mut workload = Erc721Workload::new();
        workload.cost.set_gas_limit(150_000);
        workload.cost.set_gas_price(2_000);

        let mut subs = vec![Account::derive(TEST_MNEMONIC, 1).unwrap()];
        let err = workload.construct(&mut subs, &[0], 1, 1).unwrap_err();
        assert!(matches!(err, RunnerError::NotInitialized(_)));
    }
}
