use thiserror::Error;

/// BIP-32 derivation failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// Hardened children require the parent private key.
    #[error("cannot derive a hardened child from a public key")]
    DeriveHardenedFromPublic,
    /// The seed hashed to a scalar outside [1, n-1].
    #[error("seed produced an out-of-range master key")]
    InvalidMasterKey,
    /// Child tweak out of range or the derived key degenerate.
    #[error("derived child key is invalid at index {0}")]
    InvalidChildKey(u32),
}

/// Encoding/decoding failures for keys and addresses.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid Base58Check payload")]
    InvalidBase58Check,
    #[error("invalid EIP-55 address")]
    InvalidEip55,
    #[error("invalid WIF private key")]
    InvalidWif,
}

/// Error type for all wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Malformed caller input: bad mnemonic, wrong entropy length,
    /// empty address list, zero fee, invalid gap and the like.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Key-tree derivation errors.
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] KeyError),
    /// Serialization-format errors.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// The inputs do not cover amount plus fee.
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds { available: u64, required: u64 },
    /// The adapter returned inconsistent or unexpected data.
    #[error("adapter protocol violation: {0}")]
    AdapterProtocol(String),
    /// Transport-level adapter failure, passed through verbatim.
    #[error("adapter error: {0}")]
    Adapter(String),
    /// The caller cancelled the operation or a deadline passed.
    #[error("operation cancelled")]
    Cancelled,
    /// The adapter capability is not available for this coin.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Signing was requested from a watch-only wallet.
    #[error("wallet has no private key")]
    MissingPrivateKey,
}

impl WalletError {
    /// Transport errors and cancellations are worth retrying; everything
    /// else is deterministic for the same inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Adapter(_) | WalletError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = WalletError::InsufficientFunds { available: 500, required: 1300 };
        assert_eq!(err.to_string(), "insufficient funds: 1300 required, 500 available");

        let err: WalletError = KeyError::DeriveHardenedFromPublic.into();
        assert_eq!(
            err.to_string(),
            "key derivation failed: cannot derive a hardened child from a public key"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(WalletError::Adapter("timeout".into()).is_retryable());
        assert!(WalletError::Cancelled.is_retryable());
        assert!(!WalletError::MissingPrivateKey.is_retryable());
        assert!(!WalletError::Codec(CodecError::InvalidWif).is_retryable());
    }
}
