//! Per-coin address encoding and private-key export.
//!
//! BTC and BCH share the Bitcoin mainnet P2PKH form; BCH addresses stay
//! byte-compatible with BTC tooling and CashAddr is not emitted. ETH
//! addresses carry the EIP-55 mixed-case checksum.

use ripemd::Ripemd160;
use secp256k1::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use zeroize::Zeroizing;

use crate::core::coin::CoinType;
use crate::core::errors::{CodecError, Result, WalletError};

/// RIPEMD160(SHA256(data)), the Bitcoin public-key hash.
pub(crate) fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Address of a compressed public key under the coin's encoding.
pub fn encode_address(coin: CoinType, public_key: &PublicKey) -> String {
    match coin {
        CoinType::Btc | CoinType::Bch => p2pkh_address(coin, public_key),
        CoinType::Eth => eth_address(public_key),
    }
}

fn p2pkh_address(coin: CoinType, public_key: &PublicKey) -> String {
    let version = coin
        .profile()
        .p2pkh_version
        .expect("UTXO coins carry a P2PKH version byte");
    bs58::encode(hash160(&public_key.serialize()))
        .with_check_version(version)
        .into_string()
}

fn eth_address(public_key: &PublicKey) -> String {
    // Uncompressed point minus the 0x04 prefix, Keccak-256, last 20 bytes.
    let uncompressed = public_key.serialize_uncompressed();
    let digest = keccak256(&uncompressed[1..]);
    checksum_eth_address(&hex::encode(&digest[12..])).expect("40 hex chars by construction")
}

/// Apply the EIP-55 mixed-case checksum to a 40-hex-char address, with or
/// without a `0x` prefix. Any existing casing is ignored.
pub fn checksum_eth_address(address: &str) -> Result<String> {
    let lower = address.strip_prefix("0x").unwrap_or(address).to_ascii_lowercase();
    if lower.len() != 40 || !lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidEip55.into());
    }
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.bytes().enumerate() {
        let nibble = if i % 2 == 0 { digest[i / 2] >> 4 } else { digest[i / 2] & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase() as char);
        } else {
            out.push(c as char);
        }
    }
    Ok(out)
}

/// Parse an ETH address into its 20 raw bytes. Mixed-case inputs must
/// carry a valid EIP-55 checksum; single-case inputs are accepted as-is.
pub fn parse_eth_address(address: &str) -> Result<[u8; 20]> {
    let hex_part = address.strip_prefix("0x").unwrap_or(address);
    if hex_part.len() != 40 {
        return Err(CodecError::InvalidEip55.into());
    }
    let has_upper = hex_part.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = hex_part.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower {
        let checksummed = checksum_eth_address(hex_part)?;
        if checksummed[2..] != *hex_part {
            return Err(CodecError::InvalidEip55.into());
        }
    }
    let raw = hex::decode(hex_part).map_err(|_| CodecError::InvalidEip55)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// Export a private key in the coin's native form: compressed-key WIF for
/// BTC/BCH, bare lowercase hex for ETH.
pub fn export_private_key(coin: CoinType, secret: &SecretKey) -> String {
    match coin {
        CoinType::Btc | CoinType::Bch => to_wif(coin, secret),
        CoinType::Eth => hex::encode(secret.secret_bytes()),
    }
}

/// WIF, mainnet, compressed: Base58Check(0x80 | scalar | 0x01).
pub fn to_wif(coin: CoinType, secret: &SecretKey) -> String {
    let version = coin
        .profile()
        .wif_version
        .expect("UTXO coins carry a WIF version byte");
    let mut payload = Zeroizing::new([0u8; 33]);
    payload[..32].copy_from_slice(&secret.secret_bytes());
    payload[32] = 0x01; // compressed public key marker
    bs58::encode(&payload[..]).with_check_version(version).into_string()
}

/// Decode a mainnet compressed-key WIF back into its scalar.
pub fn from_wif(wif: &str) -> Result<SecretKey> {
    let raw = Zeroizing::new(
        bs58::decode(wif)
            .with_check(Some(0x80))
            .into_vec()
            .map_err(|_| CodecError::InvalidWif)?,
    );
    // version byte | 32-byte scalar | compression marker
    if raw.len() != 34 || raw[33] != 0x01 {
        return Err(CodecError::InvalidWif.into());
    }
    SecretKey::from_slice(&raw[1..33]).map_err(|_| WalletError::Codec(CodecError::InvalidWif))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::Secp256k1;

    fn keypair(byte: u8) -> (SecretKey, PublicKey) {
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        (sk, PublicKey::from_secret_key(&Secp256k1::new(), &sk))
    }

    #[test]
    fn p2pkh_shape() {
        let (_, pk) = keypair(1);
        let addr = encode_address(CoinType::Btc, &pk);
        assert!(addr.starts_with('1'));
        assert!((26..=35).contains(&addr.len()));
        // BCH reuses the exact same encoding.
        assert_eq!(addr, encode_address(CoinType::Bch, &pk));
    }

    #[test]
    fn eth_address_shape() {
        let (_, pk) = keypair(2);
        let addr = encode_address(CoinType::Eth, &pk);
        assert!(addr.starts_with("0x"));
        assert_eq!(addr.len(), 42);
        // Re-checksumming is a fixpoint.
        assert_eq!(checksum_eth_address(&addr).unwrap(), addr);
    }

    #[test]
    fn eip55_reference_vector() {
        let checksummed =
            checksum_eth_address("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
        assert_eq!(checksummed, "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
    }

    #[test]
    fn eip55_rejects_garbage() {
        assert!(checksum_eth_address("0x1234").is_err());
        assert!(checksum_eth_address("zz6916095ca1df60bb79ce92ce3ea74c37c5d359").is_err());
    }

    #[test]
    fn parse_eth_address_verifies_mixed_case() {
        let good = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
        assert!(parse_eth_address(good).is_ok());
        // All-lowercase carries no checksum claim.
        assert!(parse_eth_address(&good.to_ascii_lowercase()).is_ok());
        // A flipped case letter breaks the checksum.
        let bad = good.replacen("fB", "Fb", 1);
        assert!(parse_eth_address(&bad).is_err());
    }

    #[test]
    fn wif_round_trip() {
        let (sk, _) = keypair(3);
        let wif = to_wif(CoinType::Btc, &sk);
        assert!(wif.starts_with('K') || wif.starts_with('L'));
        assert_eq!(from_wif(&wif).unwrap(), sk);
    }

    #[test]
    fn wif_rejects_corruption() {
        let (sk, _) = keypair(4);
        let mut wif = to_wif(CoinType::Btc, &sk);
        wif.pop();
        wif.push('1');
        assert!(matches!(
            from_wif(&wif),
            Err(WalletError::Codec(CodecError::InvalidWif))
        ));
        assert!(from_wif("not-a-wif").is_err());
    }

    #[test]
    fn eth_export_is_bare_hex() {
        let (sk, _) = keypair(5);
        let exported = export_private_key(CoinType::Eth, &sk);
        assert_eq!(exported.len(), 64);
        assert_eq!(hex::decode(&exported).unwrap(), sk.secret_bytes());
    }
}
