//! BIP-44 gap-limit discovery and balance aggregation.

use std::collections::HashMap;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chain::ChainAdapter;
use crate::core::coin::CoinType;
use crate::core::errors::{Result, WalletError};
use crate::keys::address::encode_address;
use crate::keys::extended::ExtendedKey;
use crate::keys::path::{Chain, HARDENED};

/// Upper bound when searching the destination chain for an unused address.
pub const FRESH_ADDRESS_SEARCH_CAP: u32 = 9_999_999;

/// A discovered address with its confirmed balance. Lives for the span of
/// one scan or sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressRecord {
    pub chain: Chain,
    pub index: u32,
    pub address: String,
    pub balance: u64,
}

/// Walks the address chains of one account against a [`ChainAdapter`].
pub struct Scanner<'a> {
    adapter: &'a dyn ChainAdapter,
    account_key: &'a ExtendedKey,
    coin: CoinType,
}

impl<'a> Scanner<'a> {
    /// `account_key` is the key at m/44'/coin'/account', either variant.
    pub fn new(adapter: &'a dyn ChainAdapter, account_key: &'a ExtendedKey, coin: CoinType) -> Self {
        Self { adapter, account_key, coin }
    }

    /// Indices on `chain` whose addresses have on-chain history.
    ///
    /// Queries windows of `address_gap + 1` addresses in one adapter batch
    /// each. A window without a single hit ends the scan; otherwise the
    /// next window starts right after the highest hit, so the final
    /// accepted gap between used indices is exactly `address_gap`.
    pub async fn discover_used_indices(
        &self,
        ctx: &CancellationToken,
        chain: Chain,
        address_gap: u32,
    ) -> Result<Vec<u32>> {
        if address_gap == 0 {
            return Err(WalletError::InvalidInput("address gap must be positive".into()));
        }
        let chain_key = self.account_key.child(chain.index())?;

        let mut used = Vec::new();
        let mut start = 0u32;
        loop {
            if ctx.is_cancelled() {
                return Err(WalletError::Cancelled);
            }
            let mut addresses = Vec::with_capacity(address_gap as usize + 1);
            let mut index_of = HashMap::new();
            for offset in 0..=address_gap {
                let index = match start.checked_add(offset) {
                    Some(i) if i < HARDENED => i,
                    _ => break,
                };
                let address =
                    encode_address(self.coin, &chain_key.child(index)?.public_key());
                index_of.insert(address.clone(), index);
                addresses.push(address);
            }
            if addresses.is_empty() {
                break;
            }

            let found = self.adapter.has_transactions(ctx, &addresses).await?;
            for addr in found.keys() {
                if !index_of.contains_key(addr) {
                    return Err(WalletError::AdapterProtocol(format!(
                        "adapter answered for unrequested address {addr}"
                    )));
                }
            }

            // The hit flag is per window; only a fully silent window ends
            // the scan.
            let mut any_hit = false;
            let mut last_hit = start;
            for addr in &addresses {
                if found.get(addr).copied().unwrap_or(false) {
                    let index = index_of[addr];
                    used.push(index);
                    any_hit = true;
                    last_hit = index;
                }
            }
            debug!(coin = %self.coin, %chain, start, hits = used.len(), "scanned window");
            if !any_hit {
                break;
            }
            start = last_hit + 1;
        }
        Ok(used)
    }

    /// Confirmed balance per used index on `chain`, plus the highest used
    /// index (0 when nothing is used). One `unspent` batch for the whole
    /// index set; outputs below one confirmation are ignored.
    pub async fn balances_by_index(
        &self,
        ctx: &CancellationToken,
        chain: Chain,
        address_gap: u32,
    ) -> Result<(Vec<AddressRecord>, u32)> {
        let used = self.discover_used_indices(ctx, chain, address_gap).await?;
        if used.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let chain_key = self.account_key.child(chain.index())?;
        let mut derived = Vec::with_capacity(used.len());
        let mut addresses = Vec::with_capacity(used.len());
        let mut highest = 0u32;
        for &index in &used {
            let address = encode_address(self.coin, &chain_key.child(index)?.public_key());
            addresses.push(address.clone());
            derived.push((index, address));
            highest = highest.max(index);
        }

        let unspent = self.adapter.unspent(ctx, &addresses).await?;
        for addr in unspent.keys() {
            if !addresses.contains(addr) {
                return Err(WalletError::AdapterProtocol(format!(
                    "adapter returned outputs for unrequested address {addr}"
                )));
            }
        }

        let mut records = Vec::new();
        for (index, address) in derived {
            let balance: u64 = unspent
                .get(&address)
                .map(|outs| {
                    outs.iter().filter(|u| u.is_spendable()).map(|u| u.amount).sum()
                })
                .unwrap_or(0);
            if balance >= 1 {
                records.push(AddressRecord { chain, index, address, balance });
            }
        }
        debug!(coin = %self.coin, %chain, funded = records.len(), highest, "aggregated balances");
        Ok((records, highest))
    }
}

/// First external-chain address under `destination` that reports no
/// transactions. Queried one address at a time so allocation order is the
/// first-match order the destination wallet will discover later.
pub async fn fresh_address(
    adapter: &dyn ChainAdapter,
    ctx: &CancellationToken,
    destination: &ExtendedKey,
    coin: CoinType,
) -> Result<String> {
    let chain_key = destination.child(Chain::External.index())?;
    for index in 0..FRESH_ADDRESS_SEARCH_CAP {
        let address = encode_address(coin, &chain_key.child(index)?.public_key());
        let found = adapter
            .has_transactions(ctx, std::slice::from_ref(&address))
            .await?;
        if !found.get(&address).copied().unwrap_or(false) {
            return Ok(address);
        }
    }
    Err(WalletError::AdapterProtocol(
        "destination chain reports every address as used".into(),
    ))
}
