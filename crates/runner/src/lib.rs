//! Transaction generation, funding, and measurement pipeline.
//!
//! The pipeline runs in one pass: derive accounts from the mnemonic, top up
//! sub-account balances from the root (plus token balances in ERC-20 mode),
//! construct and sign the workload, fire it at the node as batched
//! `eth_sendRawTransaction` arrays, then wait for the mempool to drain and
//! reconstruct what the chain actually did with it.

mod collector;
mod engine;
mod error;
mod fund;
mod progress;
mod report;
mod run;
mod token;
mod workload;

pub use collector::{BlockRecord, Collector, RunStats, TxRecord, aggregate};
pub use engine::prepare_transactions;
pub use error::RunnerError;
pub use fund::distribute_native;
pub use progress::{LogProgress, NoopProgress, ProgressObserver};
pub use report::{BlockEntry, RunReport, write_report};
pub use run::{Mode, RunConfig, run};
pub use token::distribute_tokens;
pub use workload::{EoaWorkload, Erc20Workload, Erc721Workload, UnsignedTx, Workload};
