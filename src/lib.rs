//! Multi-currency hierarchical deterministic wallet library.
//!
//! Derives BIP-44 address chains for BTC, BCH and ETH from a mnemonic or
//! extended key, discovers used addresses and balances through an
//! abstract [`ChainAdapter`], and builds signed sweep transactions that
//! move every confirmed balance to fresh addresses under a foreign
//! extended public key.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use chainsweep::{chain::mock::MockAdapter, CoinType, Wallet};
//!
//! # async fn demo() -> chainsweep::Result<()> {
//! let adapter = Arc::new(MockAdapter::new());
//! let wallet = Wallet::from_mnemonic("...", "", CoinType::Btc, 0, adapter)?;
//! let report = wallet.sweep(&CancellationToken::new(), "xpub...", 20).await?;
//! for raw in &report.transactions {
//!     println!("{raw}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod core;
pub mod keys;
pub mod tx;
pub mod wallet;

pub use crate::chain::{ChainAdapter, Unspent};
pub use crate::core::coin::CoinType;
pub use crate::core::errors::{CodecError, KeyError, Result, WalletError};
pub use crate::keys::extended::ExtendedKey;
pub use crate::keys::path::{Chain, DerivationPath};
pub use crate::wallet::{
    account_balances, sweep_accounts, AccountBalances, AddressRecord, Scanner, SweepEngine,
    SweepFailure, SweepReport, Wallet,
};
