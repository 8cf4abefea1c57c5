//! Supported coins and their per-coin dispatch records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fee charged per serialized byte of a BTC/BCH transaction, in satoshi.
pub const BTC_FEE_PER_BYTE: u64 = 130;
/// Gas limit of a plain ETH value transfer.
pub const ETH_GAS_LIMIT: u64 = 21_000;
/// Flat gas price in wei (51 Gwei). Stored in wei and used as-is.
pub const ETH_GAS_PRICE_WEI: u64 = 51_000_000_000;
/// Ethereum mainnet chain id, mixed into EIP-155 signatures.
pub const ETH_CHAIN_ID: u64 = 1;

/// Coins supported by the wallet, with their SLIP-44 indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoinType {
    Btc,
    Bch,
    Eth,
}

impl CoinType {
    /// SLIP-44 coin index used in the BIP-44 path.
    pub fn slip44(self) -> u32 {
        match self {
            CoinType::Btc => 0,
            CoinType::Eth => 60,
            CoinType::Bch => 145,
        }
    }

    /// Whether balances live in unspent transaction outputs rather than
    /// account state.
    pub fn is_utxo(self) -> bool {
        !matches!(self, CoinType::Eth)
    }

    pub fn profile(self) -> &'static CoinProfile {
        match self {
            CoinType::Btc => &BTC_PROFILE,
            CoinType::Bch => &BCH_PROFILE,
            CoinType::Eth => &ETH_PROFILE,
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoinType::Btc => "BTC",
            CoinType::Bch => "BCH",
            CoinType::Eth => "ETH",
        };
        f.write_str(name)
    }
}

/// How the sweep fee is computed for a coin.
#[derive(Debug, Clone, Copy)]
pub enum FeePolicy {
    /// Fee proportional to the serialized transaction size.
    PerByte { rate: u64 },
    /// Flat fee independent of the payload (empty-data transfers).
    FlatGas { gas_limit: u64, gas_price_wei: u64 },
}

/// Per-coin constants collected in one record so encoding, fee estimation
/// and transaction building all dispatch off the same place.
#[derive(Debug, Clone, Copy)]
pub struct CoinProfile {
    pub slip44: u32,
    /// Base58Check version byte of P2PKH addresses, for UTXO coins.
    pub p2pkh_version: Option<u8>,
    /// Base58Check version byte of WIF private keys, for UTXO coins.
    pub wif_version: Option<u8>,
    pub fee: FeePolicy,
}

// BCH reuses the BTC mainnet P2PKH encoding; CashAddr is not emitted.
static BTC_PROFILE: CoinProfile = CoinProfile {
    slip44: 0,
    p2pkh_version: Some(0x00),
    wif_version: Some(0x80),
    fee: FeePolicy::PerByte { rate: BTC_FEE_PER_BYTE },
};

static BCH_PROFILE: CoinProfile = CoinProfile {
    slip44: 145,
    p2pkh_version: Some(0x00),
    wif_version: Some(0x80),
    fee: FeePolicy::PerByte { rate: BTC_FEE_PER_BYTE },
};

static ETH_PROFILE: CoinProfile = CoinProfile {
    slip44: 60,
    p2pkh_version: None,
    wif_version: None,
    fee: FeePolicy::FlatGas { gas_limit: ETH_GAS_LIMIT, gas_price_wei: ETH_GAS_PRICE_WEI },
};

/// Fee for a serialized transaction under the coin's fee policy.
pub fn estimate_fee(coin: CoinType, raw_tx: &[u8]) -> u64 {
    match coin.profile().fee {
        FeePolicy::PerByte { rate } => rate * raw_tx.len() as u64,
        FeePolicy::FlatGas { gas_limit, gas_price_wei } => gas_limit * gas_price_wei,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slip44_indices() {
        assert_eq!(CoinType::Btc.slip44(), 0);
        assert_eq!(CoinType::Eth.slip44(), 60);
        assert_eq!(CoinType::Bch.slip44(), 145);
        for coin in [CoinType::Btc, CoinType::Bch, CoinType::Eth] {
            assert_eq!(coin.profile().slip44, coin.slip44());
        }
    }

    #[test]
    fn fee_scales_with_size_for_utxo_coins() {
        let raw = vec![0u8; 226];
        assert_eq!(estimate_fee(CoinType::Btc, &raw), 226 * BTC_FEE_PER_BYTE);
        assert_eq!(estimate_fee(CoinType::Bch, &raw), 226 * BTC_FEE_PER_BYTE);
    }

    #[test]
    fn eth_fee_ignores_payload() {
        assert_eq!(estimate_fee(CoinType::Eth, &[]), ETH_GAS_LIMIT * ETH_GAS_PRICE_WEI);
        assert_eq!(estimate_fee(CoinType::Eth, &[0u8; 500]), 21_000 * 51_000_000_000);
    }

    #[test]
    fn bch_is_btc_compatible() {
        let btc = CoinType::Btc.profile();
        let bch = CoinType::Bch.profile();
        assert_eq!(btc.p2pkh_version, bch.p2pkh_version);
        assert_eq!(btc.wif_version, bch.wif_version);
    }
}
