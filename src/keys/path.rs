//! BIP-44 derivation paths: m / 44' / coin' / account' / change / index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::coin::CoinType;
use crate::core::errors::{Result, WalletError};

/// First hardened child number (2^31).
pub const HARDENED: u32 = 0x8000_0000;

/// BIP-44 purpose field.
const PURPOSE: u32 = 44;

/// External (receiving) or internal (change) chain of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    External,
    Internal,
}

impl Chain {
    /// The non-hardened child number of this chain.
    pub fn index(self) -> u32 {
        match self {
            Chain::External => 0,
            Chain::Internal => 1,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::External => f.write_str("external"),
            Chain::Internal => f.write_str("internal"),
        }
    }
}

/// A validated sequence of BIP-32 child numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// Full BIP-44 address path m/44'/coin'/account'/change/index.
    pub fn bip44(coin: CoinType, account: u32, chain: Chain, index: u32) -> Result<Self> {
        let mut path = Self::account(coin, account)?;
        if index >= HARDENED {
            return Err(WalletError::InvalidInput(format!(
                "address index {index} out of range"
            )));
        }
        path.0.push(chain.index());
        path.0.push(index);
        Ok(path)
    }

    /// Account-level path m/44'/coin'/account' (depth 3). The key at this
    /// depth is what the wallet shares as its extended public key.
    pub fn account(coin: CoinType, account: u32) -> Result<Self> {
        if account >= HARDENED {
            return Err(WalletError::InvalidInput(format!(
                "account index {account} out of range"
            )));
        }
        Ok(Self(vec![
            PURPOSE | HARDENED,
            coin.slip44() | HARDENED,
            account | HARDENED,
        ]))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for &child in &self.0 {
            if child >= HARDENED {
                write!(f, "/{}'", child - HARDENED)?;
            } else {
                write!(f, "/{}", child)?;
            }
        }
        Ok(())
    }
}
