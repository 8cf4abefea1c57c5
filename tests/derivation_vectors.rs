//! End-to-end derivation vectors: mnemonic through BIP-32/44 down to
//! coin addresses.

use chainsweep::keys::address::{checksum_eth_address, encode_address};
use chainsweep::keys::mnemonic::{self, mnemonic_to_seed};
use chainsweep::keys::path::Chain;
use chainsweep::{CoinType, DerivationPath, ExtendedKey};

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn address_for(coin: CoinType, index: u32) -> String {
    let seed = mnemonic_to_seed(MNEMONIC, "").unwrap();
    let master = ExtendedKey::master(seed.as_ref()).unwrap();
    let path = DerivationPath::bip44(coin, 0, Chain::External, index).unwrap();
    let key = master.derive_path(&path).unwrap();
    encode_address(coin, &key.public_key())
}

#[test]
fn mnemonic_to_btc_address() {
    assert_eq!(address_for(CoinType::Btc, 0), "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
}

#[test]
fn mnemonic_to_eth_address() {
    assert_eq!(
        address_for(CoinType::Eth, 0),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );
}

#[test]
fn bch_addresses_match_btc_encoding() {
    // Same path semantics, different SLIP-44 index, identical encoding.
    let bch = address_for(CoinType::Bch, 0);
    assert!(bch.starts_with('1'));
    assert_ne!(bch, address_for(CoinType::Btc, 0));
}

#[test]
fn eip55_checksum_vector() {
    let checksummed = checksum_eth_address("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
    assert_eq!(checksummed, "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
    // Re-checksumming is a fixpoint.
    assert_eq!(checksum_eth_address(&checksummed).unwrap(), checksummed);
}

#[test]
fn fresh_master_round_trips_through_base58() {
    let (_, master) = mnemonic::generate().unwrap();
    let encoded = master.to_base58();
    assert!(encoded.starts_with("xprv"));
    assert_eq!(ExtendedKey::from_base58(&encoded).unwrap(), master);

    let xpub = master.neuter().to_base58();
    assert!(xpub.starts_with("xpub"));
    assert_eq!(ExtendedKey::from_base58(&xpub).unwrap(), master.neuter());
}

#[test]
fn account_xpub_derives_the_same_chain() {
    let seed = mnemonic_to_seed(MNEMONIC, "").unwrap();
    let master = ExtendedKey::master(seed.as_ref()).unwrap();
    let account = master
        .derive_path(&DerivationPath::account(CoinType::Btc, 0).unwrap())
        .unwrap();

    // Share the xpub, derive addresses without the private key.
    let shared = ExtendedKey::from_base58(&account.neuter().to_base58()).unwrap();
    for index in 0..5 {
        let from_private = account.child(0).unwrap().child(index).unwrap();
        let from_public = shared.child(0).unwrap().child(index).unwrap();
        assert_eq!(
            encode_address(CoinType::Btc, &from_private.public_key()),
            encode_address(CoinType::Btc, &from_public.public_key()),
        );
    }
}

#[test]
fn passphrase_yields_a_different_tree() {
    let plain = mnemonic_to_seed(MNEMONIC, "").unwrap();
    let salted = mnemonic_to_seed(MNEMONIC, "hunter2").unwrap();
    let a = ExtendedKey::master(plain.as_ref()).unwrap();
    let b = ExtendedKey::master(salted.as_ref()).unwrap();
    assert_ne!(a.to_base58(), b.to_base58());
}
