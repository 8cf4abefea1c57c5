//! Deterministic in-memory adapter used throughout the test suites.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ChainAdapter, Unspent};
use crate::core::errors::{Result, WalletError};

#[derive(Default)]
struct State {
    /// Outgoing transaction count per address; any entry > 0 also means
    /// "has transactions".
    tx_counts: HashMap<String, u64>,
    unspent: HashMap<String, Vec<Unspent>>,
    broadcasts: Vec<String>,
    has_transactions_batches: u32,
    unspent_batches: u32,
    /// When set, this address is smuggled into every `has_transactions`
    /// response to exercise the protocol checks.
    spurious: Option<String>,
}

/// Scripted [`ChainAdapter`] backed by plain maps.
#[derive(Default)]
pub struct MockAdapter {
    state: Mutex<State>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an address as having on-chain history.
    pub fn mark_used(&self, addr: &str) {
        self.set_transaction_count(addr, 1);
    }

    pub fn set_transaction_count(&self, addr: &str, count: u64) {
        self.lock().tx_counts.insert(addr.to_string(), count);
    }

    pub fn add_unspent(&self, addr: &str, unspent: Unspent) {
        let mut state = self.lock();
        state.tx_counts.entry(addr.to_string()).or_insert(1);
        state.unspent.entry(addr.to_string()).or_default().push(unspent);
    }

    pub fn clear_unspent(&self, addr: &str) {
        self.lock().unspent.remove(addr);
    }

    /// Include `addr` in every `has_transactions` reply, requested or not.
    pub fn inject_spurious_address(&self, addr: &str) {
        self.lock().spurious = Some(addr.to_string());
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.lock().broadcasts.clone()
    }

    /// Number of `has_transactions` batches served so far.
    pub fn has_transactions_batches(&self) -> u32 {
        self.lock().has_transactions_batches
    }

    pub fn unspent_batches(&self) -> u32 {
        self.lock().unspent_batches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock state lock")
    }

    fn check_cancelled(ctx: &CancellationToken) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(WalletError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    async fn unspent(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, Vec<Unspent>>> {
        Self::check_cancelled(ctx)?;
        let mut state = self.lock();
        state.unspent_batches += 1;
        Ok(addrs
            .iter()
            .filter_map(|a| state.unspent.get(a).map(|u| (a.clone(), u.clone())))
            .collect())
    }

    async fn has_transactions(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, bool>> {
        Self::check_cancelled(ctx)?;
        let mut state = self.lock();
        state.has_transactions_batches += 1;
        let mut out: HashMap<String, bool> = addrs
            .iter()
            .map(|a| (a.clone(), state.tx_counts.get(a).copied().unwrap_or(0) > 0))
            .collect();
        if let Some(spurious) = &state.spurious {
            out.insert(spurious.clone(), true);
        }
        Ok(out)
    }

    async fn count_transactions(
        &self,
        ctx: &CancellationToken,
        addrs: &[String],
    ) -> Result<HashMap<String, u64>> {
        Self::check_cancelled(ctx)?;
        let state = self.lock();
        Ok(addrs
            .iter()
            .map(|a| (a.clone(), state.tx_counts.get(a).copied().unwrap_or(0)))
            .collect())
    }

    async fn broadcast(
        &self,
        ctx: &CancellationToken,
        raw_txs: &[String],
    ) -> Result<HashMap<String, Option<String>>> {
        Self::check_cancelled(ctx)?;
        let mut state = self.lock();
        state.broadcasts.extend(raw_txs.iter().cloned());
        Ok(raw_txs.iter().map(|t| (t.clone(), None)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_addresses_report_no_transactions() {
        let mock = MockAdapter::new();
        mock.mark_used("a");
        let ctx = CancellationToken::new();
        let found = mock.has_transactions(&ctx, &addrs(&["a", "b"])).await.unwrap();
        assert_eq!(found["a"], true);
        assert_eq!(found["b"], false);
        assert_eq!(mock.has_transactions_batches(), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let mock = MockAdapter::new();
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert!(matches!(
            mock.unspent(&ctx, &addrs(&["a"])).await,
            Err(WalletError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn broadcast_records_and_acks() {
        let mock = MockAdapter::new();
        let ctx = CancellationToken::new();
        let raws = addrs(&["deadbeef"]);
        let result = mock.broadcast(&ctx, &raws).await.unwrap();
        assert_eq!(result["deadbeef"], None);
        assert_eq!(mock.broadcasts(), raws);
    }
}
