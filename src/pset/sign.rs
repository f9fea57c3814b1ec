use std::collections::{BTreeMap, HashMap};

use lwk_wollet::elements::encode::{deserialize, serialize_hex};
use lwk_wollet::elements::hashes::Hash;
use lwk_wollet::elements::pset::{PartiallySignedTransaction, PsbtSighashType};
use lwk_wollet::elements::schnorr::{SchnorrSig, TapTweak};
use lwk_wollet::elements::secp256k1_zkp::{Keypair, Message, Secp256k1};
use lwk_wollet::elements::sighash::{Prevouts, SighashCache};
use lwk_wollet::elements::taproot::TapLeafHash;
use lwk_wollet::elements::{
    BlockHash, EcdsaSighashType, SchnorrSighashType, Transaction, TxOut, bitcoin,
};

use crate::error::{Error, Result};
use crate::input::Input;
use crate::keys::KeyHierarchy;

/// Add this wallet's ECDSA signatures to a PSET.
///
/// `derivation_paths` maps prevout scripts (hex) to the path of the key that
/// locks them. Inputs with an unknown script are left alone. An input's
/// sighash type is kept when already set, otherwise `sighash_type` (default
/// `ALL`) is recorded. Every signature is verified before it is attached.
pub fn sign_pset<K: KeyHierarchy + ?Sized>(
    pset: &PartiallySignedTransaction,
    keys: &K,
    derivation_paths: &HashMap<String, String>,
    sighash_type: Option<EcdsaSighashType>,
) -> Result<PartiallySignedTransaction> {
    check_derivation_paths(keys, derivation_paths)?;
    keys.validate()?;

    let default_type = sighash_type.unwrap_or(EcdsaSighashType::All);
    let tx = super::unsigned_tx(pset)?;
    let secp = Secp256k1::new();
    let mut signed = pset.clone();

    for (index, input) in signed.inputs_mut().iter_mut().enumerate() {
        let Some(utxo) = input.witness_utxo.clone() else {
            log::debug!("sign: input {index} has no witness utxo, skipping");
            continue;
        };
        let Some(path) = derivation_paths.get(&hex::encode(utxo.script_pubkey.as_bytes())) else {
            continue;
        };

        let sighash_type = match input.sighash_type {
            Some(ty) => ty
                .ecdsa_hash_ty()
                .ok_or_else(|| Error::Sighash(format!("input {index} has a non-ECDSA sighash type")))?,
            None => {
                input.sighash_type = Some(PsbtSighashType::from(default_type));
                default_type
            }
        };

        let signing = keys.derive_signing_keys(path)?;
        let script_code = super::script_code(index, input, &signing.public_key())?;
        let msg = super::segwit_v0_message(&tx, index, &script_code, utxo.value, sighash_type);

        let sig = secp.sign_ecdsa(&msg, signing.secret_key());
        secp.verify_ecdsa(&msg, &sig, &signing.public_key())
            .map_err(|_| Error::SignatureVerification(index))?;

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(sighash_type.as_u32() as u8);
        input
            .partial_sigs
            .insert(bitcoin::PublicKey::new(signing.public_key()), sig_bytes);
        log::debug!("sign: signed input {index} with path {path}");
    }

    Ok(signed)
}

/// Add this wallet's Schnorr signatures to taproot inputs of a PSET.
///
/// For every leaf listed for our key in the input's taproot key origins a
/// script-path signature is made with the untweaked key. An input listing no
/// leaves for our key is signed on the key path with the key tweaked by the
/// input's merkle root. `genesis_hash` identifies the chain being signed for.
pub fn sign_taproot<K: KeyHierarchy + ?Sized>(
    pset: &PartiallySignedTransaction,
    keys: &K,
    derivation_paths: &HashMap<String, String>,
    genesis_hash: BlockHash,
    sighash_type: Option<SchnorrSighashType>,
) -> Result<PartiallySignedTransaction> {
    check_derivation_paths(keys, derivation_paths)?;
    keys.validate()?;

    let sighash_type = sighash_type.unwrap_or(SchnorrSighashType::Default);
    let tx = super::unsigned_tx(pset)?;
    let prevouts = super::prevouts(pset)?;
    let secp = Secp256k1::new();
    let mut cache = SighashCache::new(&tx);
    let mut signed = pset.clone();

    for (index, input) in signed.inputs_mut().iter_mut().enumerate() {
        let script = &prevouts[index].script_pubkey;
        let Some(path) = derivation_paths.get(&hex::encode(script.as_bytes())) else {
            continue;
        };

        let signing = keys.derive_signing_keys(path)?;
        let keypair = Keypair::from_secret_key(&secp, signing.secret_key());
        let (xonly, _parity) = keypair.x_only_public_key();
        input.sighash_type = Some(PsbtSighashType::from(sighash_type));

        let leaves: Vec<TapLeafHash> = input
            .tap_key_origins
            .get(&xonly)
            .map(|(leaves, _)| leaves.clone())
            .unwrap_or_default();

        if leaves.is_empty() {
            let tweaked = keypair.tap_tweak(&secp, input.tap_merkle_root).to_inner();
            let sighash = cache
                .taproot_key_spend_signature_hash(
                    index,
                    &Prevouts::All(&prevouts),
                    sighash_type,
                    genesis_hash,
                )
                .map_err(|e| Error::Sighash(e.to_string()))?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let sig = secp.sign_schnorr_no_aux_rand(&msg, &tweaked);
            secp.verify_schnorr(&sig, &msg, &tweaked.x_only_public_key().0)
                .map_err(|_| Error::SignatureVerification(index))?;
            input.tap_key_sig = Some(SchnorrSig {
                sig,
                hash_ty: sighash_type,
            });
            log::debug!("sign: key-path signed taproot input {index}");
            continue;
        }

        for leaf in leaves {
            let sighash = cache
                .taproot_script_spend_signature_hash(
                    index,
                    &Prevouts::All(&prevouts),
                    leaf,
                    sighash_type,
                    genesis_hash,
                )
                .map_err(|e| Error::Sighash(e.to_string()))?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let sig = secp.sign_schnorr_no_aux_rand(&msg, &keypair);
            secp.verify_schnorr(&sig, &msg, &xonly)
                .map_err(|_| Error::SignatureVerification(index))?;
            input.tap_script_sigs.insert(
                (xonly, leaf),
                SchnorrSig {
                    sig,
                    hash_ty: sighash_type,
                },
            );
        }
        log::debug!("sign: script-path signed taproot input {index}");
    }

    Ok(signed)
}

/// Sign P2WPKH inputs of a raw transaction and set their witnesses.
///
/// `inputs` maps input positions to the coins they spend; each coin must
/// carry the derivation path of its key. Returns the transaction hex.
pub fn sign_transaction<K: KeyHierarchy + ?Sized>(
    tx_hex: &str,
    keys: &K,
    inputs: &BTreeMap<u32, Input>,
    sighash_type: Option<EcdsaSighashType>,
) -> Result<String> {
    let bytes = hex::decode(tx_hex).map_err(|e| Error::TxDecode(e.to_string()))?;
    let mut tx: Transaction = deserialize(&bytes).map_err(|e| Error::TxDecode(e.to_string()))?;

    if inputs.is_empty() {
        return Err(Error::MissingPrevouts);
    }
    for (&index, input) in inputs {
        let index = index as usize;
        if index >= tx.input.len() {
            return Err(Error::InputIndexOutOfRange(index));
        }
        let path = match input.derivation_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(Error::InvalidInput {
                    index,
                    source: Box::new(Error::MissingDerivationPath),
                });
            }
        };
        keys.check_signing_path(path)
            .map_err(|e| invalid_path(path, &input.script, e))?;
    }
    keys.validate()?;

    let sighash_type = sighash_type.unwrap_or(EcdsaSighashType::All);
    let unsigned = tx.clone();
    let secp = Secp256k1::new();

    for (&index, input) in inputs {
        let index = index as usize;
        let script = input.script_pubkey();
        if !script.is_v0_p2wpkh() {
            return Err(Error::UnsupportedScript {
                index,
                reason: "only p2wpkh inputs can be signed in a raw transaction".into(),
            });
        }
        let prevout: TxOut = input.prevout().map_err(|e| Error::InvalidInput {
            index,
            source: Box::new(e),
        })?;

        let path = input.derivation_path.as_deref().unwrap_or_default();
        let signing = keys.derive_signing_keys(path)?;
        let script_code = super::p2pkh_script_code(&signing.public_key());
        let msg = super::segwit_v0_message(&unsigned, index, &script_code, prevout.value, sighash_type);

        let sig = secp.sign_ecdsa(&msg, signing.secret_key());
        secp.verify_ecdsa(&msg, &sig, &signing.public_key())
            .map_err(|_| Error::SignatureVerification(index))?;

        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(sighash_type.as_u32() as u8);
        tx.input[index].witness.script_witness =
            vec![sig_bytes, signing.public_key().serialize().to_vec()];
    }

    Ok(serialize_hex(&tx))
}

/// Reject an empty map or any path the wallet cannot sign with, before any
/// key is derived.
fn check_derivation_paths<K: KeyHierarchy + ?Sized>(
    keys: &K,
    derivation_paths: &HashMap<String, String>,
) -> Result<()> {
    if derivation_paths.is_empty() {
        return Err(Error::MissingDerivationPaths);
    }
    for (script, path) in derivation_paths {
        keys.check_signing_path(path).map_err(|e| Error::InvalidDerivationPath {
            path: path.clone(),
            script: script.clone(),
            source: Box::new(e),
        })?;
    }
    Ok(())
}

fn invalid_path(path: &str, script: &[u8], err: Error) -> Error {
    Error::InvalidDerivationPath {
        path: path.to_string(),
        script: hex::encode(script),
        source: Box::new(err),
    }
}
