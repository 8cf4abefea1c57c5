//! BIP-32 extended keys: master-key construction, hardened and
//! non-hardened child derivation and the 78-byte Base58Check wire form.
//!
//! Keys are plain values. Derivation is strictly downward: a child holds a
//! 4-byte fingerprint snapshot of its parent, never a reference.

use std::fmt;

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::core::errors::{CodecError, KeyError, Result, WalletError};
use crate::keys::address::hash160;
use crate::keys::path::{DerivationPath, HARDENED};

type HmacSha512 = Hmac<Sha512>;

/// Mainnet version bytes of serialized private keys ("xprv...").
pub const XPRV_VERSION: u32 = 0x0488_ADE4;
/// Mainnet version bytes of serialized public keys ("xpub...").
pub const XPUB_VERSION: u32 = 0x0488_B21E;

const SERIALIZED_LEN: usize = 78;

/// The secret scalar or compressed curve point an extended key carries.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial {
    Private(SecretKey),
    Public(PublicKey),
}

/// A BIP-32 extended key of either variant.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    material: KeyMaterial,
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
}

impl ExtendedKey {
    /// Master key of a seed: HMAC-SHA512 keyed with "Bitcoin seed".
    /// The left half must be a valid scalar in [1, n-1].
    pub fn master(seed: &[u8]) -> Result<Self> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(WalletError::InvalidInput(format!(
                "seed must be 16-64 bytes, got {}",
                seed.len()
            )));
        }
        let mut mac =
            HmacSha512::new_from_slice(b"Bitcoin seed").expect("HMAC accepts any key length");
        mac.update(seed);
        let digest = mac.finalize().into_bytes();
        let (il, ir) = digest.split_at(32);

        let key = SecretKey::from_slice(il).map_err(|_| KeyError::InvalidMasterKey)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);
        Ok(Self {
            material: KeyMaterial::Private(key),
            chain_code,
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
        })
    }

    /// The public counterpart: same chain code and metadata, secret scalar
    /// replaced by its curve point.
    pub fn neuter(&self) -> Self {
        let material = match self.material {
            KeyMaterial::Public(pk) => KeyMaterial::Public(pk),
            KeyMaterial::Private(sk) => {
                KeyMaterial::Public(PublicKey::from_secret_key(&Secp256k1::new(), &sk))
            }
        };
        Self { material, ..*self }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.material, KeyMaterial::Private(_))
    }

    /// Compressed public point of either variant.
    pub fn public_key(&self) -> PublicKey {
        match self.material {
            KeyMaterial::Public(pk) => pk,
            KeyMaterial::Private(sk) => PublicKey::from_secret_key(&Secp256k1::new(), &sk),
        }
    }

    /// The secret scalar, if this is a private key.
    pub fn secret_key(&self) -> Option<&SecretKey> {
        match &self.material {
            KeyMaterial::Private(sk) => Some(sk),
            KeyMaterial::Public(_) => None,
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    /// First 4 bytes of HASH160 of the compressed public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        let hash = hash160(&self.public_key().serialize());
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&hash[..4]);
        fp
    }

    /// Derive the child at `index`. Hardened indices (>= 2^31) require the
    /// private variant.
    pub fn child(&self, index: u32) -> Result<Self> {
        let hardened = index >= HARDENED;
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        match (&self.material, hardened) {
            (KeyMaterial::Public(_), true) => {
                return Err(KeyError::DeriveHardenedFromPublic.into());
            }
            (KeyMaterial::Private(sk), true) => {
                data.push(0x00);
                data.extend_from_slice(&sk.secret_bytes());
            }
            (KeyMaterial::Private(_), false) | (KeyMaterial::Public(_), false) => {
                data.extend_from_slice(&self.public_key().serialize());
            }
        }
        data.extend_from_slice(&index.to_be_bytes());

        let mut mac =
            HmacSha512::new_from_slice(&self.chain_code).expect("HMAC accepts any key length");
        mac.update(&data);
        let digest = mac.finalize().into_bytes();
        let (il, ir) = digest.split_at(32);

        let mut il_bytes = Zeroizing::new([0u8; 32]);
        il_bytes.copy_from_slice(il);
        // Rejects IL >= n outright; the additions below reject a zero or
        // degenerate child.
        let tweak =
            Scalar::from_be_bytes(*il_bytes).map_err(|_| KeyError::InvalidChildKey(index))?;

        let material = match &self.material {
            KeyMaterial::Private(sk) => KeyMaterial::Private(
                sk.add_tweak(&tweak).map_err(|_| KeyError::InvalidChildKey(index))?,
            ),
            KeyMaterial::Public(pk) => KeyMaterial::Public(
                pk.add_exp_tweak(&Secp256k1::new(), &tweak)
                    .map_err(|_| KeyError::InvalidChildKey(index))?,
            ),
        };

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);
        Ok(Self {
            material,
            chain_code,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: index,
        })
    }

    /// Iterated [`child`](Self::child) over every component of `path`.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self> {
        let mut key = self.clone();
        for &index in path.components() {
            key = key.child(index)?;
        }
        Ok(key)
    }

    /// Base58Check of the 78-byte layout
    /// version(4) | depth(1) | parent_fp(4) | child_number(4) | chain_code(32) | key(33).
    pub fn to_base58(&self) -> String {
        let mut buf = [0u8; SERIALIZED_LEN];
        let version = if self.is_private() { XPRV_VERSION } else { XPUB_VERSION };
        buf[0..4].copy_from_slice(&version.to_be_bytes());
        buf[4] = self.depth;
        buf[5..9].copy_from_slice(&self.parent_fingerprint);
        buf[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        buf[13..45].copy_from_slice(&self.chain_code);
        match &self.material {
            KeyMaterial::Private(sk) => {
                buf[45] = 0x00;
                buf[46..78].copy_from_slice(&sk.secret_bytes());
            }
            KeyMaterial::Public(pk) => buf[45..78].copy_from_slice(&pk.serialize()),
        }
        bs58::encode(&buf[..]).with_check().into_string()
    }

    /// Parse the Base58Check form produced by [`to_base58`](Self::to_base58).
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let raw = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|_| CodecError::InvalidBase58Check)?;
        if raw.len() != SERIALIZED_LEN {
            return Err(CodecError::InvalidBase58Check.into());
        }

        let version = u32::from_be_bytes(raw[0..4].try_into().expect("4-byte slice"));
        let material = match version {
            XPRV_VERSION => {
                if raw[45] != 0x00 {
                    return Err(CodecError::InvalidBase58Check.into());
                }
                KeyMaterial::Private(
                    SecretKey::from_slice(&raw[46..78])
                        .map_err(|_| CodecError::InvalidBase58Check)?,
                )
            }
            XPUB_VERSION => KeyMaterial::Public(
                PublicKey::from_slice(&raw[45..78]).map_err(|_| CodecError::InvalidBase58Check)?,
            ),
            _ => return Err(CodecError::InvalidBase58Check.into()),
        };

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&raw[5..9]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&raw[13..45]);
        Ok(Self {
            material,
            chain_code,
            depth: raw[4],
            parent_fingerprint,
            child_number: u32::from_be_bytes(raw[9..13].try_into().expect("4-byte slice")),
        })
    }
}

impl fmt::Debug for ExtendedKey {
    // Never print secret scalars.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("variant", &if self.is_private() { "private" } else { "public" })
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("fingerprint", &hex::encode(self.fingerprint()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coin::CoinType;
    use crate::keys::path::Chain;

    fn tv1_master() -> ExtendedKey {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        ExtendedKey::master(&seed).unwrap()
    }

    #[test]
    fn bip32_vector_one_master() {
        let master = tv1_master();
        assert_eq!(
            master.to_base58(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6Ln\
             F5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.neuter().to_base58(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8\
             YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn bip32_vector_one_first_hardened_child() {
        let child = tv1_master().child(HARDENED).unwrap();
        assert_eq!(
            child.to_base58(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd\
             7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
        assert_eq!(
            child.neuter().to_base58(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHC\
             drfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
        assert_eq!(child.depth(), 1);
        assert_eq!(child.child_number(), HARDENED);
    }

    #[test]
    fn base58_round_trip_preserves_structure() {
        let master = tv1_master();
        for key in [master.clone(), master.child(3).unwrap(), master.neuter()] {
            let decoded = ExtendedKey::from_base58(&key.to_base58()).unwrap();
            assert_eq!(decoded, key);
        }
    }

    #[test]
    fn from_base58_rejects_corruption() {
        let mut encoded = tv1_master().to_base58();
        encoded.replace_range(10..11, if &encoded[10..11] == "a" { "b" } else { "a" });
        assert!(matches!(
            ExtendedKey::from_base58(&encoded),
            Err(WalletError::Codec(CodecError::InvalidBase58Check))
        ));
        assert!(ExtendedKey::from_base58("").is_err());
        assert!(ExtendedKey::from_base58("xpub-definitely-not").is_err());
    }

    #[test]
    fn neuter_commutes_with_normal_derivation() {
        let master = tv1_master();
        for index in [0u32, 1, 42, HARDENED - 1] {
            let a = master.child(index).unwrap().neuter();
            let b = master.neuter().child(index).unwrap();
            assert_eq!(a, b, "index {index}");
        }
    }

    #[test]
    fn hardened_from_public_fails() {
        let xpub = tv1_master().neuter();
        for index in [HARDENED, HARDENED + 5, u32::MAX] {
            assert!(matches!(
                xpub.child(index),
                Err(WalletError::KeyDerivation(KeyError::DeriveHardenedFromPublic))
            ));
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let seed = [7u8; 32];
        let path = DerivationPath::bip44(CoinType::Btc, 0, Chain::External, 9).unwrap();
        let a = ExtendedKey::master(&seed).unwrap().derive_path(&path).unwrap();
        let b = ExtendedKey::master(&seed).unwrap().derive_path(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.depth(), 5);
    }

    #[test]
    fn master_rejects_bad_seed_lengths() {
        assert!(ExtendedKey::master(&[0u8; 8]).is_err());
        assert!(ExtendedKey::master(&[0u8; 65]).is_err());
    }

    #[test]
    fn debug_never_leaks_key_material() {
        let master = tv1_master();
        let rendered = format!("{master:?}");
        let secret = hex::encode(master.secret_key().unwrap().secret_bytes());
        assert!(!rendered.contains(&secret));
    }
}
