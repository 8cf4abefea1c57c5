//! Property tests for the round-trip and commutation invariants.

use proptest::prelude::*;

use chainsweep::keys::mnemonic::{entropy_to_mnemonic, mnemonic_to_entropy, validate_mnemonic};
use chainsweep::keys::path::HARDENED;
use chainsweep::ExtendedKey;

proptest! {
    #[test]
    fn mnemonic_round_trips_entropy(
        entropy in proptest::collection::vec(any::<u8>(), 16..=32)
    ) {
        prop_assume!(entropy.len() % 4 == 0);
        let mnemonic = entropy_to_mnemonic(&entropy).unwrap();
        prop_assert!(validate_mnemonic(&mnemonic));
        let decoded_entropy = mnemonic_to_entropy(&mnemonic).unwrap();
        prop_assert_eq!(decoded_entropy.as_slice(), &entropy[..]);
    }

    #[test]
    fn extended_keys_round_trip_base58(
        seed in proptest::array::uniform32(any::<u8>()),
        index in 0u32..1_000_000,
    ) {
        let master = ExtendedKey::master(&seed).unwrap();
        let child = master.child(index).unwrap();
        for key in [master, child.clone(), child.neuter()] {
            let decoded = ExtendedKey::from_base58(&key.to_base58()).unwrap();
            prop_assert_eq!(decoded, key);
        }
    }

    #[test]
    fn neuter_commutes_with_derivation(
        seed in proptest::array::uniform32(any::<u8>()),
        index in 0u32..HARDENED,
    ) {
        let master = ExtendedKey::master(&seed).unwrap();
        prop_assert_eq!(
            master.child(index).unwrap().neuter(),
            master.neuter().child(index).unwrap()
        );
    }

    #[test]
    fn derivation_is_deterministic(
        seed in proptest::collection::vec(any::<u8>(), 16..=64),
        index in 0u32..HARDENED,
    ) {
        let a = ExtendedKey::master(&seed).unwrap().child(index).unwrap();
        let b = ExtendedKey::master(&seed).unwrap().child(index).unwrap();
        prop_assert_eq!(a, b);
    }
}
