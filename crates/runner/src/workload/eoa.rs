//! Plain native-transfer workload between sub-accounts.

use alloy_network::TransactionBuilder;
use alloy_primitives::U256;
use alloy_rpc_types_eth::TransactionRequest;
use surge_rpc::NodeClient;
use surge_wallet::{Account, AccountSet};

use crate::error::RunnerError;
use crate::workload::{TxCost, UnsignedTx, Workload};

/// Value carried by each transfer: 10⁻⁴ of the native unit.
const TRANSFER_VALUE_WEI: u64 = 100_000_000_000_000;

/// Round-robin native transfers: transaction i goes from account
/// `ready[i mod k]` to account `ready[(i+1) mod k]`.
#[derive(Debug, Default)]
pub struct EoaWorkload {
    cost: TxCost,
}

impl EoaWorkload {
    /// Creates the workload with gas parameters still unobserved.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Workload for EoaWorkload {
    async fn init(
        &mut self,
        _client: &NodeClient,
        _accounts: &mut AccountSet,
        _chain_id: u64,
    ) -> Result<(), RunnerError> {
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
        let to = accounts.subs.first().map_or(accounts.root.address(), Account::address);
        let request = TransactionRequest::default()
            .with_from(accounts.root.address())
            .with_to(to)
            .with_value(self.value());
        self.cost.set_gas_limit(client.estimate_gas(request).await?);
        Ok(())
    }

    fn value(&self) -> U256 {
        U256::from(TRANSFER_VALUE_WEI)
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
        let gas_limit = self.gas_limit()?;
        let gas_price = self.gas_price()?;
        let k = ready.len();

        let mut txs = Vec::with_capacity(transactions as usize);
        for i in 0..transactions as usize {
            let sender = ready[i % k];
            let receiver = subs[ready[(i + 1) % k]].address();
            let tx = subs[sender].transfer_tx(receiver, self.value(), gas_limit, gas_price, chain_id);
            txs.push(UnsignedTx { sender, tx });
        }
        Ok(txs)
    }

    fn start_message(&self) -> String {
        "Starting EOA workload: native transfers between sub-accounts".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::TxKind;

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn workload() -> EoaWorkload {
        let mut workload = EoaWorkload::new();
        workload.cost.set_gas_limit(21_000);
        workload.cost.set_gas_price(1_000_000_000);
        workload
    }

    fn sub_accounts(count: usize) -> Vec<Account> {
        (1..=count as u32)
            .map(|i| {
                let mut account = Account::derive(TEST_MNEMONIC, i).unwrap();
                account.set_nonce(0);
                account
            })
            .collect()
    }

    #[test]
    fn test_construct_round_robins_senders_and_receivers() {
        let mut subs = sub_accounts(3);
        let addresses: Vec<_> = subs.iter().map(Account::address).collect();
        let txs = workload().construct(&mut subs, &[0, 1, 2], 6, 1).unwrap();

        assert_eq!(txs.len(), 6);
        for (i, unsigned) in txs.iter().enumerate() {
            assert_eq!(unsigned.sender, i % 3);
            assert_eq!(unsigned.tx.to, TxKind::Call(addresses[(i + 1) % 3]));
            assert_eq!(unsigned.tx.value, U256::from(TRANSFER_VALUE_WEI));
            assert_eq!(unsigned.tx.gas_limit, 21_000);
            assert_eq!(unsigned.tx.gas_price, 1_000_000_000);
        }
    }

    #[test]
    fn test_construct_nonces_are_consecutive_per_sender() {
        let mut subs = sub_accounts(2);
        let txs = workload().construct(&mut subs, &[0, 1], 6, 1).unwrap();

        let nonces_of = |sender: usize| -> Vec<u64> {
            txs.iter().filter(|t| t.sender == sender).map(|t| t.tx.nonce).collect()
        };
        assert_eq!(nonces_of(0), vec![0, 1, 2]);
        assert_eq!(nonces_of(1), vec![0, 1, 2]);
        assert_eq!(subs[0].nonce(), 3);
        assert_eq!(subs[1].nonce(), 3);
    }

    #[test]
    fn test_construct_single_account_self_transfers() {
        let mut subs = sub_accounts(1);
        let self_address = subs[0].address();
        let txs = workload().construct(&mut subs, &[0], 3, 1).unwrap();

        for unsigned in &txs {
            assert_eq!(unsigned.sender, 0);
            assert_eq!(unsigned.tx.to, TxKind::Call(self_address));
        }
    }

    #[test]
    fn test_construct_without_gas_parameters_fails() {
        let mut subs = sub_accounts(1);
        let err = EoaWorkload::new().construct(&mut subs, &[0], 1, 1).unwrap_err();
        assert!(matches!(err, RunnerError::NotInitialized(_)));
    }

    #[test]
    fn test_required_balance_covers_full_workload() {
        let workload = workload();
        // 2000 × (21_000 × 1 gwei + 10⁻⁴ ETH)
        let per_tx = U256::from(21_000u64) * U256::from(1_000_000_000u64)
            + U256::from(TRANSFER_VALUE_WEI);
        assert_eq!(workload.required_balance(2000).unwrap(), per_tx * U256::from(2000u64));
    }
}
