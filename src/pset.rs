//! Partially signed Elements transactions.
//!
//! A PSET moves through the pipeline as a base64 string or a decoded
//! [`PartiallySignedTransaction`]. Each stage takes the PSET by reference and
//! returns an updated copy:
//!
//! ```text
//! create / update  ->  blind  ->  sign  ->  finalize & extract
//! ```

pub mod blind;
pub mod creation;
pub mod finalize;
pub mod sign;

use std::str::FromStr;

use lwk_wollet::elements::hashes::{Hash, hash160};
use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::script::Builder;
use lwk_wollet::elements::secp256k1_zkp::{Message, PublicKey};
use lwk_wollet::elements::sighash::SighashCache;
use lwk_wollet::elements::opcodes::all::{OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160};
use lwk_wollet::elements::{EcdsaSighashType, Script, Transaction, TxOut, confidential, pset};

use crate::error::{Error, Result};

pub use blind::{blind_with_master_key, blind_with_owned_inputs};
pub use creation::{create_pset, update_pset};
pub use finalize::{finalize_and_extract, finalize_and_extract_for};
pub use sign::{sign_pset, sign_taproot, sign_transaction};

/// Decode a base64 PSET.
pub fn decode(base64: &str) -> Result<PartiallySignedTransaction> {
    if base64.is_empty() {
        return Err(Error::MissingPset);
    }
    PartiallySignedTransaction::from_str(base64).map_err(|e| Error::PsetDecode(e.to_string()))
}

/// Encode a PSET as base64.
pub fn encode(pset: &PartiallySignedTransaction) -> String {
    pset.to_string()
}

/// Create a new empty PSET v2.
pub(crate) fn new_pset() -> PartiallySignedTransaction {
    PartiallySignedTransaction::new_v2()
}

/// The transaction the PSET currently describes, without final witnesses.
pub(crate) fn unsigned_tx(pset: &PartiallySignedTransaction) -> Result<Transaction> {
    pset.extract_tx().map_err(|e| Error::Extract(e.to_string()))
}

/// Witness UTXOs of every input, in input order.
pub(crate) fn prevouts(pset: &PartiallySignedTransaction) -> Result<Vec<TxOut>> {
    pset.inputs()
        .iter()
        .enumerate()
        .map(|(index, input)| input.witness_utxo.clone().ok_or(Error::MissingWitnessUtxo(index)))
        .collect()
}

/// `OP_DUP OP_HASH160 <hash160(pubkey)> OP_EQUALVERIFY OP_CHECKSIG`.
pub(crate) fn p2pkh_script_code(pubkey: &PublicKey) -> Script {
    let hash = hash160::Hash::hash(&pubkey.serialize());
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(&hash.to_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Segwit v0 script code used to sign `input` with `pubkey`.
///
/// Script-hash spends sign with the witness script. Key-hash spends, native or
/// P2SH-wrapped, sign with the P2PKH script of the key, which must match the
/// committed program.
pub(crate) fn script_code(index: usize, input: &pset::Input, pubkey: &PublicKey) -> Result<Script> {
    if let Some(witness_script) = &input.witness_script {
        return Ok(witness_script.clone());
    }

    let utxo = input.witness_utxo.as_ref().ok_or(Error::MissingWitnessUtxo(index))?;
    let program = if utxo.script_pubkey.is_v0_p2wpkh() {
        utxo.script_pubkey.clone()
    } else {
        match &input.redeem_script {
            Some(redeem) if utxo.script_pubkey.is_p2sh() && redeem.is_v0_p2wpkh() => redeem.clone(),
            _ => {
                return Err(Error::UnsupportedScript {
                    index,
                    reason: "expected p2wpkh, p2sh-p2wpkh or a witness script".into(),
                });
            }
        }
    };

    let hash = hash160::Hash::hash(&pubkey.serialize());
    if program.as_bytes()[2..] != hash.to_byte_array()[..] {
        return Err(Error::UnsupportedScript {
            index,
            reason: "key does not match the witness program".into(),
        });
    }
    Ok(p2pkh_script_code(pubkey))
}

/// BIP143-style digest of input `index` as used by Elements.
pub(crate) fn segwit_v0_message(
    tx: &Transaction,
    index: usize,
    script_code: &Script,
    value: confidential::Value,
    sighash_type: EcdsaSighashType,
) -> Message {
    let mut cache = SighashCache::new(tx);
    let sighash = cache.segwitv0_sighash(index, script_code, value, sighash_type);
    Message::from_digest(sighash.to_byte_array())
}
