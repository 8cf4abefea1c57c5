//! Key material: BIP-39 mnemonics, BIP-32 extended keys, BIP-44 paths and
//! the per-coin address/key encodings.

pub mod address;
pub mod extended;
pub mod mnemonic;
pub mod path;
