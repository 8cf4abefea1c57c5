//! The sweep engine: move everything an account holds to fresh addresses
//! under a foreign extended public key.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::ChainAdapter;
use crate::core::coin::{estimate_fee, CoinType, ETH_GAS_LIMIT, ETH_GAS_PRICE_WEI};
use crate::core::errors::{Result, WalletError};
use crate::keys::address::to_wif;
use crate::keys::extended::ExtendedKey;
use crate::keys::path::Chain;
use crate::tx;
use crate::wallet::scanner::{fresh_address, AddressRecord, Scanner};
use crate::wallet::Wallet;

/// Fee used for the first, size-probing build of each transaction.
pub const FIRST_PASS_FEE: u64 = 1_000;

/// One source address the engine could not sweep.
#[derive(Debug)]
pub struct SweepFailure {
    pub chain: Chain,
    pub index: u32,
    pub error: WalletError,
}

/// Outcome of a sweep. Failures never retract already-signed
/// transactions; broadcasting is the caller's move.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Raw signed transactions, hex encoded, in scan order.
    pub transactions: Vec<String>,
    /// Per-address failures, in scan order.
    pub failures: Vec<SweepFailure>,
}

pub struct SweepEngine<'a> {
    adapter: &'a dyn ChainAdapter,
}

impl<'a> SweepEngine<'a> {
    pub fn new(adapter: &'a dyn ChainAdapter) -> Self {
        Self { adapter }
    }

    /// Sweep every funded address of `wallet`'s account into fresh
    /// addresses under `destination`.
    ///
    /// External indices are visited first, then internal ones, ascending.
    /// The internal chain is scanned with a window of
    /// `address_gap + highest external index` so change addresses that
    /// outran the receive chain are still found. Each withdrawal gets the
    /// cached destination address if the previous one was not consumed,
    /// otherwise a freshly allocated one.
    pub async fn sweep(
        &self,
        ctx: &CancellationToken,
        wallet: &Wallet,
        destination: &ExtendedKey,
        address_gap: u32,
    ) -> Result<SweepReport> {
        wallet.account_private()?;
        let scanner = Scanner::new(self.adapter, wallet.account_public(), wallet.coin());

        let (mut records, highest_external) =
            scanner.balances_by_index(ctx, Chain::External, address_gap).await?;
        let (internal, _) = scanner
            .balances_by_index(ctx, Chain::Internal, address_gap + highest_external)
            .await?;
        records.extend(internal);
        info!(
            coin = %wallet.coin(),
            account = wallet.account(),
            funded = records.len(),
            "sweep scan complete"
        );

        let mut report = SweepReport::default();
        let mut cached_destination: Option<String> = None;
        for record in &records {
            let to_address = match &cached_destination {
                Some(address) => address.clone(),
                None => match fresh_address(self.adapter, ctx, destination, wallet.coin()).await
                {
                    Ok(address) => {
                        cached_destination = Some(address.clone());
                        address
                    }
                    Err(error) => {
                        // Without a destination nothing further can be
                        // swept this round.
                        report.failures.push(SweepFailure {
                            chain: record.chain,
                            index: record.index,
                            error,
                        });
                        break;
                    }
                },
            };

            match self.withdraw(ctx, wallet, &to_address, record).await {
                Ok(Some(raw)) => {
                    report.transactions.push(raw);
                    // The next withdrawal needs an untouched address.
                    cached_destination = None;
                }
                Ok(None) => {}
                Err(error @ WalletError::Cancelled) => {
                    report.failures.push(SweepFailure {
                        chain: record.chain,
                        index: record.index,
                        error,
                    });
                    break;
                }
                Err(error) => {
                    warn!(index = record.index, %error, "withdrawal failed, continuing");
                    report.failures.push(SweepFailure {
                        chain: record.chain,
                        index: record.index,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Sweep one source address. Returns `None` when the balance cannot
    /// cover the fee; that address is simply left alone.
    async fn withdraw(
        &self,
        ctx: &CancellationToken,
        wallet: &Wallet,
        to_address: &str,
        record: &AddressRecord,
    ) -> Result<Option<String>> {
        if record.balance <= FIRST_PASS_FEE {
            debug!(index = record.index, balance = record.balance, "balance below probe fee");
            return Ok(None);
        }

        let probe = self
            .make_transaction(
                ctx,
                wallet,
                record,
                to_address,
                record.balance - FIRST_PASS_FEE,
                FIRST_PASS_FEE,
            )
            .await?;
        let fee = estimate_fee(wallet.coin(), &probe);
        if record.balance <= fee {
            info!(
                index = record.index,
                balance = record.balance,
                fee,
                "amount does not cover the fee, skipping"
            );
            return Ok(None);
        }

        let raw = self
            .make_transaction(ctx, wallet, record, to_address, record.balance - fee, fee)
            .await?;
        Ok(Some(hex::encode(raw)))
    }

    async fn make_transaction(
        &self,
        ctx: &CancellationToken,
        wallet: &Wallet,
        record: &AddressRecord,
        to_address: &str,
        amount: u64,
        fee: u64,
    ) -> Result<Vec<u8>> {
        let key = wallet.key_at(record.chain, record.index)?;
        let secret = key.secret_key().ok_or(WalletError::MissingPrivateKey)?;

        match wallet.coin() {
            CoinType::Btc | CoinType::Bch => {
                let unspent = self
                    .adapter
                    .unspent(ctx, std::slice::from_ref(&record.address))
                    .await?;
                let utxos: Vec<_> = unspent
                    .get(&record.address)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|u| u.is_spendable())
                    .collect();
                let wif = to_wif(wallet.coin(), secret);
                tx::bitcoin::build_sweep(&wif, to_address, amount, fee, &utxos)
            }
            CoinType::Eth => {
                let counts = self
                    .adapter
                    .count_transactions(ctx, std::slice::from_ref(&record.address))
                    .await?;
                let nonce = counts.get(&record.address).copied().ok_or_else(|| {
                    WalletError::AdapterProtocol(format!(
                        "adapter did not return a nonce for {}",
                        record.address
                    ))
                })?;
                tx::ethereum::build_transfer(
                    secret,
                    to_address,
                    nonce,
                    amount,
                    ETH_GAS_LIMIT,
                    ETH_GAS_PRICE_WEI,
                )
            }
        }
    }
}
