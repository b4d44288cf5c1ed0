//! ERC-20 transfer workload against a freshly deployed token.

use std::time::Duration;

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, U256, hex};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::SolCall;
use surge_rpc::NodeClient;
use surge_wallet::{Account, AccountSet};
use tracing::{debug, info};

use crate::error::RunnerError;
use crate::progress::ProgressObserver;
use crate::workload::{TxCost, UnsignedTx, Workload};

alloy_sol_macro::sol! {
    interface IToken {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function symbol() external view returns (string);
        function totalSupply() external view returns (uint256);
    }
}

/// Compiled token artifact, consumed as an opaque deployment blob.
const TOKEN_BYTECODE_HEX: &str = include_str!("../../contracts/token_bytecode.hex");

/// Gas limit for the deployment transaction.
const DEPLOY_GAS_LIMIT: u64 = 5_000_000;

/// How long the deployment may take to mine.
const DEPLOY_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Tokens moved by each workload transfer.
const TRANSFER_AMOUNT: U256 = U256::ONE;

/// Round-robin `transfer(receiver, 1)` calls against a token deployed by
/// the root at startup. Gas limit and price are scaled ×1.5 over the node's
/// estimates so transfers survive estimation drift on busy nodes.
#[derive(Debug, Default)]
pub struct Erc20Workload {
    cost: TxCost,
    contract: Option<Address>,
    symbol: String,
    total_supply: U256,
}

impl Erc20Workload {
    /// Creates the workload; `init` deploys the token.
    pub fn new() -> Self {
        Self::default()
    }

    fn contract(&self) -> Result<Address, RunnerError> {
        self.contract.ok_or(RunnerError::NotInitialized("token contract not deployed"))
    }

    /// Returns the token deployment bytecode.
    fn deploy_bytecode() -> Bytes {
        let bytecode = hex::decode(TOKEN_BYTECODE_HEX.trim().trim_start_matches("0x"))
            .expect("invalid token bytecode hex");
        Bytes::from(bytecode)
    }
}

/// Encodes `transfer(to, amount)` calldata.
pub(crate) fn encode_transfer(to: Address, amount: U256) -> Bytes {
    IToken::transferCall { to, amount }.abi_encode().into()
}

/// Builds the read-only `balanceOf(owner)` call request.
pub(crate) fn balance_of_request(contract: Address, owner: Address) -> TransactionRequest {
    TransactionRequest::default()
        .with_to(contract)
        .with_input(Bytes::from(IToken::balanceOfCall { owner }.abi_encode()))
}

/// Decodes the `balanceOf` return value.
pub(crate) fn decode_balance(output: &[u8]) -> Result<U256, RunnerError> {
    Ok(IToken::balanceOfCall::abi_decode_returns(output)?)
}

impl Workload for Erc20Workload {
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
        debug!(%hash, "Deploying token contract");

        let receipt = client.wait_for_receipt(hash, DEPLOY_RECEIPT_TIMEOUT).await?;
        if !receipt.is_success() {
            return Err(RunnerError::ExecutionFailed(hash));
        }
        let contract = accounts.root.address().create(deploy_nonce);
        self.contract = Some(contract);

        let symbol_out = client
            .call(
                TransactionRequest::default()
                    .with_to(contract)
                    .with_input(Bytes::from(IToken::symbolCall {}.abi_encode())),
            )
            .await?;
        self.symbol = IToken::symbolCall::abi_decode_returns(&symbol_out)?;

        let supply_out = client
            .call(
                TransactionRequest::default()
                    .with_to(contract)
                    .with_input(Bytes::from(IToken::totalSupplyCall {}.abi_encode())),
            )
            .await?;
        self.total_supply = IToken::totalSupplyCall::abi_decode_returns(&supply_out)?;

        info!(%contract, symbol = %self.symbol, supply = %self.total_supply, "Token deployed");
        Ok(())
    }

    async fn fetch_gas_price(&mut self, client: &NodeClient) -> Result<(), RunnerError> {
        let observed = client.gas_price().await?;
        self.cost.set_gas_price(observed.saturating_mul(3) / 2);
        Ok(())
    }

    async fn estimate_base_gas(
        &mut self,
        client: &NodeClient,
        accounts: &AccountSet,
    ) -> Result<(), RunnerError> {
        let contract = self.contract()?;
        let to = accounts.subs.first().map_or(accounts.root.address(), Account::address);
        let request = TransactionRequest::default()
            .with_from(accounts.root.address())
            .with_to(contract)
            .with_input(encode_transfer(to, TRANSFER_AMOUNT));
        let estimated = client.estimate_gas(request).await?;
        self.cost.set_gas_limit(estimated.saturating_mul(3) / 2);
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

    async fn distribute_assets(
        &self,
        client: &NodeClient,
        accounts: &mut AccountSet,
        ready: &[usize],
        transactions: u64,
        chain_id: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<usize>, RunnerError> {
        crate::token::distribute_tokens(
            client,
            accounts,
            ready,
            self.contract()?,
            transactions,
            self.gas_limit()?,
            self.gas_price()?,
            chain_id,
            progress,
        )
        .await
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
            let receiver = subs[ready[(i + 1) % k]].address();
            let calldata = encode_transfer(receiver, TRANSFER_AMOUNT);
            let tx = subs[sender].call_tx(contract, calldata, gas_limit, gas_price, chain_id);
            txs.push(UnsignedTx { sender, tx });
        }
        Ok(txs)
    }

    fn start_message(&self) -> String {
        format!("Starting ERC-20 workload: {} transfers of 1 token each", self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    // transfer(address,uint256)
    const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

    #[test]
    fn test_transfer_calldata_uses_canonical_selector() {
        let calldata = encode_transfer(Address::repeat_byte(0x42), U256::ONE);
        assert_eq!(&calldata[..4], TRANSFER_SELECTOR);
        assert_eq!(calldata.len(), 4 + 32 + 32);
    }

    #[test]
    fn test_balance_of_round_trips() {
        let owner = Address::repeat_byte(0x24);
        let request = balance_of_request(Address::repeat_byte(0x11), owner);
        let input = request.input.input().unwrap();

        let decoded = IToken::balanceOfCall::abi_decode(input).unwrap();
        assert_eq!(decoded.owner, owner);
    }

    #[test]
    fn test_decode_balance() {
        let encoded = U256::from(77u64).to_be_bytes::<32>();
        assert_eq!(decode_balance(&encoded).unwrap(), U256::from(77u64));
    }

    #[test]
    fn test_construct_before_init_fails() {
        let mut workload = Erc20Workload::new();
        workload.cost.set_gas_limit(60_000);
        workload.cost.set_gas_price(1_000);

        let mut subs = vec![Account::derive(TEST_MNEMONIC, 1).unwrap()];
        let err = workload.construct(&mut subs, &[0], 1, 1).unwrap_err();
        assert!(matches!(err, RunnerError::NotInitialized(_)));
    }

    #[test]
    fn test_construct_targets_contract_with_zero_value() {
        let mut workload = Erc20Workload::new();
        workload.cost.set_gas_limit(60_000);
        workload.cost.set_gas_price(1_000);
        let contract = Address::repeat_byte(0xee);
        workload.contract = Some(contract);

        let mut subs: Vec<Account> =
            (1..=2).map(|i| Account::derive(TEST_MNEMONIC, i).unwrap()).collect();
        let txs = workload.construct(&mut subs, &[0, 1], 4, 1).unwrap();

        for unsigned in &txs {
            assert_eq!(unsigned.tx.to, alloy_primitives::TxKind::Call(contract));
            assert_eq!(unsigned.tx.value, U256::ZERO);
            assert_eq!(&unsigned.tx.input[..4], TRANSFER_SELECTOR);
        }
        // Senders alternate.
        assert_eq!(txs[0].sender, 0);
        assert_eq!(txs[1].sender, 1);
    }

    #[test]
    fn test_deploy_bytecode_is_valid_hex() {
        let bytecode = Erc20Workload::deploy_bytecode();
        assert!(!bytecode.is_empty());
    }
}
