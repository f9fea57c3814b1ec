use lwk_wollet::elements::encode::serialize_hex;
use lwk_wollet::elements::hashes::Hash;
use lwk_wollet::elements::pset::{self, PartiallySignedTransaction, PsbtSighashType};
use lwk_wollet::elements::script::{Builder, Instruction};
use lwk_wollet::elements::secp256k1_zkp::{Message, Secp256k1, Verification, XOnlyPublicKey, ecdsa};
use lwk_wollet::elements::sighash::{Prevouts, SighashCache};
use lwk_wollet::elements::taproot::TapLeafHash;
use lwk_wollet::elements::{BlockHash, Script, Transaction, TxOut, Txid};

use crate::error::{Error, Result};
use crate::estimation::multisig_stats;
use crate::network::Network;

/// Verify every signature, finalize every input and extract the transaction.
///
/// Returns the transaction hex and its id. Supported spends are P2WPKH,
/// P2SH-P2WPKH, P2WSH and P2SH-P2WSH multisig, and taproot key or script path.
/// Taproot signatures are checked against the Liquid genesis hash; use
/// [`finalize_and_extract_for`] on other chains.
pub fn finalize_and_extract(pset: &PartiallySignedTransaction) -> Result<(String, Txid)> {
    finalize_and_extract_for(pset, Network::Liquid.genesis_hash())
}

/// [`finalize_and_extract`] for the chain starting at `genesis_hash`.
pub fn finalize_and_extract_for(
    pset: &PartiallySignedTransaction,
    genesis_hash: BlockHash,
) -> Result<(String, Txid)> {
    let tx = super::unsigned_tx(pset)?;
    if !signatures_are_valid(pset, &tx, genesis_hash)? {
        return Err(Error::InvalidSignatures);
    }

    let mut finalized = pset.clone();
    for (index, input) in finalized.inputs_mut().iter_mut().enumerate() {
        finalize_input(index, input)?;
    }

    let tx = finalized
        .extract_tx()
        .map_err(|e| Error::Extract(e.to_string()))?;
    let txid = tx.txid();
    log::debug!("finalize: extracted transaction {txid}");
    Ok((serialize_hex(&tx), txid))
}

fn signatures_are_valid(
    pset: &PartiallySignedTransaction,
    tx: &Transaction,
    genesis_hash: BlockHash,
) -> Result<bool> {
    let secp = Secp256k1::verification_only();
    let mut cache = SighashCache::new(tx);
    let prevouts = super::prevouts(pset).ok();

    for (index, input) in pset.inputs().iter().enumerate() {
        let utxo = input
            .witness_utxo
            .as_ref()
            .ok_or(Error::MissingWitnessUtxo(index))?;

        for (pubkey, sig) in &input.partial_sigs {
            let Some((&hash_byte, der)) = sig.split_last() else {
                return Ok(false);
            };
            let Some(sighash_type) = PsbtSighashType::from_u32(u32::from(hash_byte)).ecdsa_hash_ty()
            else {
                return Ok(false);
            };
            let Ok(sig) = ecdsa::Signature::from_der(der) else {
                return Ok(false);
            };
            let script_code = super::script_code(index, input, &pubkey.inner)?;
            let msg = super::segwit_v0_message(tx, index, &script_code, utxo.value, sighash_type);
            if secp.verify_ecdsa(&msg, &sig, &pubkey.inner).is_err() {
                return Ok(false);
            }
        }

        if input.tap_key_sig.is_none() && input.tap_script_sigs.is_empty() {
            continue;
        }
        let prevouts = prevouts.as_deref().ok_or(Error::MissingWitnessUtxo(index))?;

        if let Some(sig) = &input.tap_key_sig {
            let output_key = taproot_output_key(index, &utxo.script_pubkey)?;
            let sighash = cache
                .taproot_key_spend_signature_hash(
                    index,
                    &Prevouts::All(prevouts),
                    sig.hash_ty,
                    genesis_hash,
                )
                .map_err(|e| Error::Sighash(e.to_string()))?;
            if !schnorr_ok(&secp, sighash.to_byte_array(), &sig.sig, &output_key) {
                return Ok(false);
            }
        }
        for ((xonly, leaf), sig) in &input.tap_script_sigs {
            let sighash = cache
                .taproot_script_spend_signature_hash(
                    index,
                    &Prevouts::All(prevouts),
                    *leaf,
                    sig.hash_ty,
                    genesis_hash,
                )
                .map_err(|e| Error::Sighash(e.to_string()))?;
            if !schnorr_ok(&secp, sighash.to_byte_array(), &sig.sig, xonly) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn schnorr_ok<C: Verification>(
    secp: &Secp256k1<C>,
    digest: [u8; 32],
    sig: &lwk_wollet::elements::secp256k1_zkp::schnorr::Signature,
    key: &XOnlyPublicKey,
) -> bool {
    secp.verify_schnorr(sig, &Message::from_digest(digest), key).is_ok()
}

fn taproot_output_key(index: usize, script: &Script) -> Result<XOnlyPublicKey> {
    if !script.is_v1_p2tr() {
        return Err(Error::UnsupportedScript {
            index,
            reason: "taproot signature on a non-taproot output".into(),
        });
    }
    XOnlyPublicKey::from_slice(&script.as_bytes()[2..]).map_err(|e| Error::UnsupportedScript {
        index,
        reason: e.to_string(),
    })
}

fn finalize_input(index: usize, input: &mut pset::Input) -> Result<()> {
    if input.final_script_witness.is_some() || input.final_script_sig.is_some() {
        return Ok(());
    }
    let utxo: TxOut = input
        .witness_utxo
        .clone()
        .ok_or(Error::MissingWitnessUtxo(index))?;
    let script = &utxo.script_pubkey;
    let fail = |reason: &str| Error::Finalize {
        index,
        reason: reason.to_string(),
    };

    let (witness, script_sig) = if script.is_v1_p2tr() {
        (taproot_witness(input).ok_or_else(|| fail("missing taproot signature"))?, None)
    } else if let Some(witness_script) = &input.witness_script {
        let witness = multisig_witness(input, witness_script).map_err(|reason| fail(&reason))?;
        (witness, wrapped_script_sig(script, input.redeem_script.as_ref()))
    } else if script.is_v0_p2wpkh()
        || (script.is_p2sh() && input.redeem_script.as_ref().is_some_and(|r| r.is_v0_p2wpkh()))
    {
        let mut sigs = input.partial_sigs.iter();
        let (pubkey, sig) = sigs.next().ok_or_else(|| fail("missing signature"))?;
        if sigs.next().is_some() {
            return Err(fail("more than one signature for a single-key spend"));
        }
        let witness = vec![sig.clone(), pubkey.to_bytes()];
        (witness, wrapped_script_sig(script, input.redeem_script.as_ref()))
    } else {
        return Err(fail("unsupported script type"));
    };

    input.final_script_witness = Some(witness);
    input.final_script_sig = script_sig;

    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
    Ok(())
}

/// scriptSig of a P2SH-wrapped segwit spend: a single push of the program.
fn wrapped_script_sig(script: &Script, redeem_script: Option<&Script>) -> Option<Script> {
    let redeem_script = redeem_script.filter(|_| script.is_p2sh())?;
    Some(Builder::new().push_slice(redeem_script.as_bytes()).into_script())
}

fn taproot_witness(input: &pset::Input) -> Option<Vec<Vec<u8>>> {
    if let Some(sig) = &input.tap_key_sig {
        return Some(vec![sig.to_vec()]);
    }
    let ((_, leaf), sig) = input.tap_script_sigs.iter().next()?;
    let (control_block, (leaf_script, _)) = input
        .tap_scripts
        .iter()
        .find(|(_, (leaf_script, version))| TapLeafHash::from_script(leaf_script, *version) == *leaf)?;
    Some(vec![
        sig.to_vec(),
        leaf_script.as_bytes().to_vec(),
        control_block.serialize(),
    ])
}

/// `[<empty>, sig_1 .. sig_m, witness_script]` with signatures in key order.
fn multisig_witness(
    input: &pset::Input,
    witness_script: &Script,
) -> std::result::Result<Vec<Vec<u8>>, String> {
    let (_, threshold) =
        multisig_stats(witness_script).ok_or_else(|| "unsupported witness script".to_string())?;

    let mut sigs = Vec::with_capacity(threshold);
    for instruction in witness_script.instructions().flatten() {
        let Instruction::PushBytes(key) = instruction else {
            continue;
        };
        let sig = input
            .partial_sigs
            .iter()
            .find(|(pubkey, _)| pubkey.to_bytes() == key)
            .map(|(_, sig)| sig.clone());
        if let Some(sig) = sig {
            sigs.push(sig);
        }
        if sigs.len() == threshold {
            break;
        }
    }
    if sigs.len() < threshold {
        return Err(format!("{} of {threshold} signatures", sigs.len()));
    }

    let mut witness = Vec::with_capacity(threshold + 2);
    witness.push(Vec::new());
    witness.extend(sigs);
    witness.push(witness_script.as_bytes().to_vec());
    Ok(witness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn unsigned_input_cannot_be_finalized() {
        let wallet = testing::single_sig_wallet();
        let input = testing::funded_input(&wallet, "0'/0/0", 10_000);
        let pset = crate::pset::create_pset(&[input], &[]).expect("pset");
        assert!(matches!(
            finalize_and_extract(&pset),
            Err(Error::Finalize { index: 0, .. })
        ));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let wallet = testing::single_sig_wallet();
        let input = testing::funded_input(&wallet, "0'/0/0", 10_000);
        let output = crate::output::Output {
            asset: testing::LBTC.into(),
            amount: 9_900,
            script: input.script.clone(),
            ..Default::default()
        };
        let fee = crate::output::Output {
            asset: testing::LBTC.into(),
            amount: 100,
            ..Default::default()
        };
        let pset = crate::pset::create_pset(std::slice::from_ref(&input), &[output, fee]).expect("pset");
        let paths = testing::derivation_paths(&[&input]);
        let mut signed = crate::pset::sign_pset(&pset, &wallet, &paths, None).expect("signed");

        let sig = signed.inputs_mut()[0]
            .partial_sigs
            .values_mut()
            .next()
            .expect("signature");
        // Flip a bit of `s`.
        let len = sig.len();
        sig[len - 2] ^= 0x01;

        assert!(matches!(
            finalize_and_extract(&signed),
            Err(Error::InvalidSignatures)
        ));
    }
}
