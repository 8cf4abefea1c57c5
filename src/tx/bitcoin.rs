//! P2PKH sweep transaction assembly and signing.
//!
//! Sweeps spend every supplied UTXO into a single destination output.
//! A zero-value output with an empty script rides along as an unused
//! refund placeholder; [`decode`] collapses it again.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::address::Address;
use bitcoin::blockdata::script::Builder;
use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tracing::debug;

use crate::chain::Unspent;
use crate::core::errors::{Result, WalletError};
use crate::keys::address;

/// Decoded view of a sweep transaction, for confirmation and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    /// Destination address (or raw script hex when not standard P2PKH).
    pub to: String,
    /// Amount of the single positive output, in satoshi.
    pub amount: u64,
}

/// Build and sign a transaction spending all `utxos` of one address into
/// `to_address`. `amount` is what the destination receives; `fee` is left
/// to miners. Inputs are signed SIGHASH_ALL against each UTXO's
/// scriptPubKey with the WIF-decoded key.
pub fn build_sweep(
    priv_wif: &str,
    to_address: &str,
    amount: u64,
    fee: u64,
    utxos: &[Unspent],
) -> Result<Vec<u8>> {
    if utxos.is_empty() {
        return Err(WalletError::InvalidInput("no unspent outputs to sweep".into()));
    }
    if amount == 0 {
        return Err(WalletError::InvalidInput("sweep amount must be positive".into()));
    }
    if fee == 0 {
        return Err(WalletError::InvalidInput("fee must be positive".into()));
    }

    let total_input: u64 = utxos.iter().map(|u| u.amount).sum();
    if total_input < amount + fee {
        return Err(WalletError::InsufficientFunds {
            available: total_input,
            required: amount + fee,
        });
    }

    let recipient = Address::from_str(to_address)
        .map_err(|e| WalletError::InvalidInput(format!("invalid address {to_address}: {e}")))?
        .require_network(Network::Bitcoin)
        .map_err(|_| WalletError::InvalidInput(format!("{to_address} is not a mainnet address")))?;

    let mut inputs = Vec::with_capacity(utxos.len());
    for utxo in utxos {
        let txid = Txid::from_str(&utxo.tx)
            .map_err(|_| WalletError::InvalidInput(format!("invalid txid {}", utxo.tx)))?;
        inputs.push(TxIn {
            previous_output: OutPoint { txid, vout: utxo.n },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
    }

    let outputs = vec![
        TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: recipient.script_pubkey(),
        },
        // Refund placeholder, unused by sweeps.
        TxOut { value: Amount::ZERO, script_pubkey: ScriptBuf::new() },
    ];

    let mut tx = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    let secret = address::from_wif(priv_wif)?;
    let secp = Secp256k1::new();
    let signing_key = SecretKey::from_slice(&secret.secret_bytes())
        .map_err(|_| WalletError::InvalidInput("invalid private key".into()))?;
    let public_key = PublicKey::from_secret_key(&secp, &signing_key);

    for (i, utxo) in utxos.iter().enumerate() {
        let script_pubkey = ScriptBuf::from_hex(&utxo.script).map_err(|_| {
            WalletError::InvalidInput(format!("invalid scriptPubKey on input {i}"))
        })?;

        let sighash_cache = SighashCache::new(&tx);
        let sighash = sighash_cache
            .legacy_signature_hash(i, &script_pubkey, EcdsaSighashType::All.to_u32())
            .map_err(|e| WalletError::InvalidInput(format!("sighash for input {i}: {e}")))?;

        let message = Message::from_digest(*sighash.as_byte_array());
        let signature = secp.sign_ecdsa(&message, &signing_key);

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);
        let sig_push = PushBytesBuf::try_from(sig_bytes)
            .map_err(|_| WalletError::InvalidInput(format!("signature on input {i}")))?;
        let pk_push = PushBytesBuf::try_from(public_key.serialize().to_vec())
            .map_err(|_| WalletError::InvalidInput("public key push".into()))?;

        tx.input[i].script_sig =
            Builder::new().push_slice(sig_push).push_slice(pk_push).into_script();
    }

    debug!(txid = %tx.txid(), inputs = utxos.len(), amount, fee, "signed sweep transaction");
    Ok(serialize(&tx))
}

/// Parse a raw sweep transaction back into its single transfer. The
/// zero-value placeholder is collapsed first; anything other than exactly
/// one positive output is rejected.
pub fn decode(raw: &[u8]) -> Result<DecodedTransfer> {
    let tx: Transaction = deserialize(raw)
        .map_err(|_| WalletError::InvalidInput("malformed raw transaction".into()))?;

    let real: Vec<&TxOut> = tx
        .output
        .iter()
        .filter(|o| !(o.value == Amount::ZERO && o.script_pubkey.is_empty()))
        .collect();
    if real.len() != 1 {
        return Err(WalletError::InvalidInput(format!(
            "expected a single transfer output, found {}",
            real.len()
        )));
    }

    let output = real[0];
    let amount = output.value.to_sat();
    if amount < 1 {
        return Err(WalletError::InvalidInput("transfer output is empty".into()));
    }
    let to = match Address::from_script(output.script_pubkey.as_script(), Network::Bitcoin) {
        Ok(addr) => addr.to_string(),
        Err(_) => output.script_pubkey.to_hex_string(),
    };
    Ok(DecodedTransfer { to, amount })
}
