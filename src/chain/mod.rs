//! The abstract view of a chain explorer.
//!
//! The core never talks to the network itself; everything on-chain is
//! reached through [`ChainAdapter`]. One adapter serves one coin; the
//! wallet, not the call, decides which coin it is scanning. Adapter
//! implementations own their transports, timeouts (30 s per request is
//! the expected default) and any fan-out across redundant endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::errors::Result;

pub mod mock;

/// One unspent transaction output as reported by an explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unspent {
    /// Hex transaction id in explorer (display) byte order.
    pub tx: String,
    /// Output index within that transaction.
    pub n: u32,
    /// Amount in the smallest coin unit (satoshi or wei).
    pub amount: u64,
    /// Confirmation count; below 1 the output is not yet spendable.
    pub confirmations: i32,
    /// Hex-encoded scriptPubKey locking the output.
    pub script: String,
}

impl Unspent {
    /// Whether this output may be spent by the sweep engine.
    pub fn is_spendable(&self) -> bool {
        self.confirmations >= 1
    }
}

/// Capability set the scanner and sweep engine require from an explorer.
///
/// Every call takes a [`CancellationToken`]; implementations must give up
/// promptly and return [`WalletError::Cancelled`] once it fires. Batched
/// address arguments map to one upstream round trip where the explorer
/// allows it.
///
/// [`WalletError::Cancelled`]: crate::core::errors::WalletError::Cancelled
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Unspent outputs per address. Addresses without entries have none.
    async fn unspent(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, Vec<Unspent>>>;

    /// Whether each address has ever appeared in a transaction. Missing
    /// entries mean "no transactions".
    async fn has_transactions(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, bool>>;

    /// Outgoing transaction count per address, the nonce source for
    /// account-model coins. UTXO-only adapters may return
    /// [`WalletError::NotImplemented`].
    ///
    /// [`WalletError::NotImplemented`]: crate::core::errors::WalletError::NotImplemented
    async fn count_transactions(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, u64>>;

    /// Submit raw transactions (hex). The result maps each raw
    /// transaction to the primary endpoint's error, if any.
    async fn broadcast(
        &self,
        ctx: &CancellationToken,
        raw_txs: &[String],
    ) -> Result<HashMap<String, Option<String>>>;
}
