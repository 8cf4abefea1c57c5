//! The wallet facade: one coin, one BIP-44 account, one chain adapter.
//!
//! A wallet built from a mnemonic holds the account private key and can
//! sign sweeps; one built from an extended public key is watch-only.
//! Wallets keep no mutable history: every operation derives what it
//! needs from the account key and asks the adapter for the rest.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chain::ChainAdapter;
use crate::core::coin::CoinType;
use crate::core::errors::{Result, WalletError};
use crate::keys::address::{encode_address, export_private_key};
use crate::keys::extended::ExtendedKey;
use crate::keys::mnemonic::mnemonic_to_seed;
use crate::keys::path::{Chain, DerivationPath, HARDENED};

pub mod scanner;
pub mod sweep;

pub use scanner::{AddressRecord, Scanner};
pub use sweep::{SweepEngine, SweepFailure, SweepReport};

pub struct Wallet {
    coin: CoinType,
    account: u32,
    /// Account-level private key, absent on watch-only wallets.
    private: Option<ExtendedKey>,
    /// Neutered account key; all address derivation goes through this.
    public: ExtendedKey,
    adapter: Arc<dyn ChainAdapter>,
}

impl Wallet {
    /// Full-capability wallet: derives m/44'/coin'/account' from the
    /// mnemonic and keeps both the private key and its neutered form.
    pub fn from_mnemonic(
        mnemonic: &str,
        passphrase: &str,
        coin: CoinType,
        account: u32,
        adapter: Arc<dyn ChainAdapter>,
    ) -> Result<Self> {
        let seed = mnemonic_to_seed(mnemonic, passphrase)?;
        let master = ExtendedKey::master(seed.as_ref())?;
        let account_key = master.derive_path(&DerivationPath::account(coin, account)?)?;
        let public = account_key.neuter();
        debug!(%coin, account, "derived account keys");
        Ok(Self { coin, account, private: Some(account_key), public, adapter })
    }

    /// Watch-only wallet over a Base58 extended public key at the account
    /// level. Signing operations fail with
    /// [`WalletError::MissingPrivateKey`].
    pub fn from_public(
        account_xpub: &str,
        coin: CoinType,
        adapter: Arc<dyn ChainAdapter>,
    ) -> Result<Self> {
        if account_xpub.is_empty() {
            return Err(WalletError::InvalidInput("empty extended public key".into()));
        }
        let key = ExtendedKey::from_base58(account_xpub)?;
        Ok(Self { coin, account: 0, private: None, public: key.neuter(), adapter })
    }

    pub fn coin(&self) -> CoinType {
        self.coin
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    /// Base58 form of the shareable account public key.
    pub fn account_xpub(&self) -> String {
        self.public.to_base58()
    }

    pub(crate) fn account_public(&self) -> &ExtendedKey {
        &self.public
    }

    pub(crate) fn account_private(&self) -> Result<&ExtendedKey> {
        self.private.as_ref().ok_or(WalletError::MissingPrivateKey)
    }

    /// Private key at m/44'/coin'/account'/chain/index.
    pub(crate) fn key_at(&self, chain: Chain, index: u32) -> Result<ExtendedKey> {
        self.account_private()?.child(chain.index())?.child(index)
    }

    /// Address at the given chain and index.
    pub fn address_at(&self, chain: Chain, index: u32) -> Result<String> {
        let key = self.public.child(chain.index())?.child(index)?;
        Ok(encode_address(self.coin, &key.public_key()))
    }

    /// `limit` consecutive addresses starting at `start`.
    pub fn addresses(&self, chain: Chain, start: u32, limit: u32) -> Result<Vec<String>> {
        let end = start
            .checked_add(limit)
            .filter(|&e| e <= HARDENED)
            .ok_or_else(|| WalletError::InvalidInput("address range out of bounds".into()))?;
        (start..end).map(|index| self.address_at(chain, index)).collect()
    }

    /// The coin-native export of one address key: WIF for BTC/BCH, bare
    /// hex for ETH.
    pub fn export_key(&self, chain: Chain, index: u32) -> Result<String> {
        let key = self.key_at(chain, index)?;
        let secret = key.secret_key().ok_or(WalletError::MissingPrivateKey)?;
        Ok(export_private_key(self.coin, secret))
    }

    /// Confirmed balance per used address on `chain`, discovered under
    /// the gap limit.
    pub async fn balance(
        &self,
        ctx: &CancellationToken,
        chain: Chain,
        address_gap: u32,
    ) -> Result<HashMap<String, u64>> {
        let scanner = Scanner::new(self.adapter.as_ref(), &self.public, self.coin);
        let (records, _) = scanner.balances_by_index(ctx, chain, address_gap).await?;
        Ok(records.into_iter().map(|r| (r.address, r.balance)).collect())
    }

    /// Confirmed balance of explicit addresses, one adapter batch.
    pub async fn balance_by_address(
        &self,
        ctx: &CancellationToken,
        addresses: &[String],
    ) -> Result<HashMap<String, u64>> {
        if addresses.is_empty() {
            return Err(WalletError::InvalidInput("empty address list".into()));
        }
        let unspent = self.adapter.unspent(ctx, addresses).await?;
        let mut balances = HashMap::new();
        for (address, outputs) in unspent {
            if !addresses.contains(&address) {
                return Err(WalletError::AdapterProtocol(format!(
                    "adapter returned outputs for unrequested address {address}"
                )));
            }
            let confirmed: u64 =
                outputs.iter().filter(|u| u.is_spendable()).map(|u| u.amount).sum();
            if confirmed > 0 {
                balances.insert(address, confirmed);
            }
        }
        Ok(balances)
    }

    /// Sweep the whole account to fresh addresses under
    /// `destination_xpub`. Returns the signed raw transactions; nothing
    /// is broadcast here.
    pub async fn sweep(
        &self,
        ctx: &CancellationToken,
        destination_xpub: &str,
        address_gap: u32,
    ) -> Result<SweepReport> {
        self.account_private()?;
        let destination = ExtendedKey::from_base58(destination_xpub)?.neuter();
        SweepEngine::new(self.adapter.as_ref())
            .sweep(ctx, self, &destination, address_gap)
            .await
    }

    /// Hand raw transactions to the adapter. The result maps each raw
    /// transaction to the primary endpoint's error, if any.
    pub async fn broadcast(
        &self,
        ctx: &CancellationToken,
        raw_txs: &[String],
    ) -> Result<HashMap<String, Option<String>>> {
        if raw_txs.is_empty() {
            return Err(WalletError::InvalidInput("nothing to broadcast".into()));
        }
        self.adapter.broadcast(ctx, raw_txs).await
    }
}

/// Aggregate balances across accounts, split by chain.
#[derive(Debug, Default)]
pub struct AccountBalances {
    pub external: BTreeMap<u32, HashMap<String, u64>>,
    pub internal: BTreeMap<u32, HashMap<String, u64>>,
    pub total: u64,
}

/// Sweep consecutive accounts of a mnemonic until `accounts_gap` accounts
/// in a row produce nothing, mirroring the BIP-44 account-gap discipline:
/// any productive account resets the countdown.
///
/// Returns the per-account sweep reports for accounts that produced
/// transactions or failures.
pub async fn sweep_accounts(
    ctx: &CancellationToken,
    mnemonic: &str,
    passphrase: &str,
    coin: CoinType,
    adapter: Arc<dyn ChainAdapter>,
    destination_xpub: &str,
    accounts_gap: u32,
    address_gap: u32,
) -> Result<BTreeMap<u32, SweepReport>> {
    let mut reports = BTreeMap::new();
    let mut account = 0u32;
    let mut silent_run = 0u32;
    while silent_run <= accounts_gap {
        let wallet = Wallet::from_mnemonic(mnemonic, passphrase, coin, account, adapter.clone())?;
        let report = wallet.sweep(ctx, destination_xpub, address_gap).await?;
        if report.transactions.is_empty() {
            silent_run += 1;
        } else {
            silent_run = 1;
        }
        if !report.transactions.is_empty() || !report.failures.is_empty() {
            info!(account, transactions = report.transactions.len(), "account swept");
            reports.insert(account, report);
        }
        account += 1;
    }
    Ok(reports)
}

/// Balance report across consecutive accounts with the same account-gap
/// discipline as [`sweep_accounts`].
pub async fn account_balances(
    ctx: &CancellationToken,
    mnemonic: &str,
    passphrase: &str,
    coin: CoinType,
    adapter: Arc<dyn ChainAdapter>,
    accounts_gap: u32,
    address_gap: u32,
) -> Result<AccountBalances> {
    let mut balances = AccountBalances::default();
    let mut account = 0u32;
    let mut silent_run = 0u32;
    while silent_run <= accounts_gap {
        let wallet = Wallet::from_mnemonic(mnemonic, passphrase, coin, account, adapter.clone())?;
        let external = wallet.balance(ctx, Chain::External, address_gap).await?;
        let internal = wallet.balance(ctx, Chain::Internal, address_gap).await?;

        if external.is_empty() && internal.is_empty() {
            silent_run += 1;
        } else {
            silent_run = 1;
        }
        balances.total += external.values().sum::<u64>() + internal.values().sum::<u64>();
        if !external.is_empty() {
            balances.external.insert(account, external);
        }
        if !internal.is_empty() {
            balances.internal.insert(account, internal);
        }
        account += 1;
    }
    Ok(balances)
}
