//! Legacy (pre-typed) Ethereum value transfers with EIP-155 replay
//! protection.
//!
//! The signing preimage is the RLP list
//! `[nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0]`
//! hashed with Keccak-256; the broadcast form replaces the trailing
//! triple with `[v, r, s]` where `v = 2 * chain_id + 35 + recovery_id`.
//! Gas price is carried in wei and used as-is.

use rlp::{Rlp, RlpStream};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, SecretKey};
use tracing::debug;

use crate::core::coin::ETH_CHAIN_ID;
use crate::core::errors::{Result, WalletError};
use crate::keys::address::{checksum_eth_address, keccak256, parse_eth_address};

/// Decoded view of a signed transfer, for confirmation and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    /// Recovered EIP-155 signer.
    pub from: String,
    /// Destination address, EIP-55 encoded.
    pub to: String,
    /// Transferred value in wei.
    pub amount: u64,
    pub nonce: u64,
}

/// Build and sign a plain value transfer. `nonce` must be the *sender's*
/// outgoing transaction count.
pub fn build_transfer(
    secret: &SecretKey,
    to: &str,
    nonce: u64,
    value: u64,
    gas_limit: u64,
    gas_price: u64,
) -> Result<Vec<u8>> {
    if gas_price == 0 {
        return Err(WalletError::InvalidInput("gas price must be positive".into()));
    }
    let to_bytes = parse_eth_address(to)?;

    let preimage = encode_fields(nonce, gas_price, gas_limit, &to_bytes, value, |s| {
        s.append(&ETH_CHAIN_ID);
        s.append(&0u8);
        s.append(&0u8);
    });
    let sighash = keccak256(&preimage);

    let secp = Secp256k1::new();
    let message = Message::from_slice(&sighash)
        .map_err(|_| WalletError::InvalidInput("signing hash".into()))?;
    let signature = secp.sign_ecdsa_recoverable(&message, secret);
    let (recovery_id, compact) = signature.serialize_compact();
    let v = ETH_CHAIN_ID * 2 + 35 + recovery_id.to_i32() as u64;

    let raw = encode_fields(nonce, gas_price, gas_limit, &to_bytes, value, |s| {
        s.append(&v);
        s.append(&trim_leading_zeros(&compact[..32]).to_vec());
        s.append(&trim_leading_zeros(&compact[32..]).to_vec());
    });
    debug!(nonce, value, gas_price, v, "signed transfer");
    Ok(raw)
}

/// RLP-decode a signed transfer and recover its EIP-155 signer.
pub fn decode(raw: &[u8]) -> Result<DecodedTransfer> {
    let malformed = || WalletError::InvalidInput("malformed raw transaction".into());
    let rlp = Rlp::new(raw);
    if !rlp.is_list() || rlp.item_count().map_err(|_| malformed())? != 9 {
        return Err(malformed());
    }

    let nonce: u64 = rlp.val_at(0).map_err(|_| malformed())?;
    let gas_price: u64 = rlp.val_at(1).map_err(|_| malformed())?;
    let gas_limit: u64 = rlp.val_at(2).map_err(|_| malformed())?;
    let to: Vec<u8> = rlp.val_at(3).map_err(|_| malformed())?;
    let value: u64 = rlp.val_at(4).map_err(|_| malformed())?;
    let data: Vec<u8> = rlp.val_at(5).map_err(|_| malformed())?;
    let v: u64 = rlp.val_at(6).map_err(|_| malformed())?;
    let r: Vec<u8> = rlp.val_at(7).map_err(|_| malformed())?;
    let s: Vec<u8> = rlp.val_at(8).map_err(|_| malformed())?;

    if to.len() != 20 || !data.is_empty() || r.len() > 32 || s.len() > 32 {
        return Err(malformed());
    }
    if v < 35 {
        return Err(WalletError::InvalidInput("transaction is not EIP-155 signed".into()));
    }
    let recovery_id = ((v - 35) % 2) as i32;
    let chain_id = (v - 35) / 2;

    let mut to_fixed = [0u8; 20];
    to_fixed.copy_from_slice(&to);
    let preimage = encode_fields(nonce, gas_price, gas_limit, &to_fixed, value, |stream| {
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
    });
    let sighash = keccak256(&preimage);

    let mut compact = [0u8; 64];
    compact[32 - r.len()..32].copy_from_slice(&r);
    compact[64 - s.len()..].copy_from_slice(&s);
    let signature = RecoverableSignature::from_compact(
        &compact,
        RecoveryId::from_i32(recovery_id).map_err(|_| malformed())?,
    )
    .map_err(|_| malformed())?;

    let secp = Secp256k1::new();
    let message = Message::from_slice(&sighash).map_err(|_| malformed())?;
    let public_key = secp
        .recover_ecdsa(&message, &signature)
        .map_err(|_| WalletError::InvalidInput("signature recovery failed".into()))?;

    let uncompressed = public_key.serialize_uncompressed();
    let from_hash = keccak256(&uncompressed[1..]);
    let from = checksum_eth_address(&hex::encode(&from_hash[12..]))?;
    let to = checksum_eth_address(&hex::encode(to_fixed))?;
    Ok(DecodedTransfer { from, to, amount: value, nonce })
}

/// Encode the six common fields plus whatever the caller appends as the
/// trailing triple (chain-id placeholder or the signature).
fn encode_fields(
    nonce: u64,
    gas_price: u64,
    gas_limit: u64,
    to: &[u8; 20],
    value: u64,
    tail: impl FnOnce(&mut RlpStream),
) -> Vec<u8> {
    let mut stream = RlpStream::new_list(9);
    stream.append(&nonce);
    stream.append(&gas_price);
    stream.append(&gas_limit);
    stream.append(&to.to_vec());
    stream.append(&value);
    stream.append(&Vec::<u8>::new()); // no calldata on a plain transfer
    tail(&mut stream);
    stream.out().to_vec()
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
