use lwk_wollet::elements::pset::{self, PartiallySignedTransaction};
use lwk_wollet::elements::secp256k1_zkp::{RangeProof, Secp256k1, SurjectionProof};
use lwk_wollet::elements::{BlindAssetProofs, BlindValueProofs, Sequence, TxOut};

use crate::error::{Error, Result};
use crate::input::Input;
use crate::output::Output;

/// Create a PSET spending `inputs` into `outputs`.
///
/// Inputs are added in order, then outputs in order. Every confidential
/// output must name an existing input as its blinder. Confidential prevouts
/// carry their rangeproof plus explicit value and asset proofs so that
/// anyone can check the revealed amounts.
pub fn create_pset(inputs: &[Input], outputs: &[Output]) -> Result<PartiallySignedTransaction> {
    validate_inputs(inputs)?;
    validate_outputs(outputs)?;

    if inputs.is_empty() && outputs.iter().any(Output::is_confidential) {
        return Err(Error::MissingInputs);
    }
    for (index, output) in outputs.iter().enumerate() {
        if output.is_confidential() && output.blinder_index as usize >= inputs.len() {
            return Err(Error::BlinderIndexOutOfRange {
                index,
                blinder_index: output.blinder_index,
                inputs: inputs.len(),
            });
        }
    }

    let mut pset = super::new_pset();
    append_inputs(&mut pset, inputs)?;
    for output in outputs {
        pset.add_output(output.to_pset_output()?);
    }

    log::debug!(
        "create: pset with {} inputs and {} outputs",
        pset.n_inputs(),
        pset.n_outputs()
    );
    Ok(pset)
}

/// Append `inputs` and `outputs` to an existing PSET.
///
/// New confidential outputs are blinded by the first newly added input,
/// whatever blinder index they carry.
pub fn update_pset(
    pset: &PartiallySignedTransaction,
    inputs: &[Input],
    outputs: &[Output],
) -> Result<PartiallySignedTransaction> {
    validate_inputs(inputs)?;
    validate_outputs(outputs)?;

    if inputs.is_empty() && outputs.iter().any(Output::is_confidential) {
        return Err(Error::MissingInputs);
    }

    let mut updated = pset.clone();
    let blinder_index = pset.n_inputs() as u32;
    append_inputs(&mut updated, inputs)?;
    for output in outputs {
        let mut output = output.to_pset_output()?;
        if output.is_marked_for_blinding() {
            output.blinder_index = Some(blinder_index);
        }
        updated.add_output(output);
    }

    log::debug!(
        "update: added {} inputs and {} outputs",
        inputs.len(),
        outputs.len()
    );
    Ok(updated)
}

fn validate_inputs(inputs: &[Input]) -> Result<()> {
    for (index, input) in inputs.iter().enumerate() {
        input.validate().map_err(|e| Error::InvalidInput {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

fn validate_outputs(outputs: &[Output]) -> Result<()> {
    for (index, output) in outputs.iter().enumerate() {
        output.validate().map_err(|e| Error::InvalidOutput {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

fn append_inputs(pset: &mut PartiallySignedTransaction, inputs: &[Input]) -> Result<()> {
    let offset = pset.n_inputs();
    for (i, input) in inputs.iter().enumerate() {
        let pset_input = to_pset_input(input).map_err(|e| Error::InvalidInput {
            index: offset + i,
            source: Box::new(e),
        })?;
        pset.add_input(pset_input);
    }
    Ok(())
}

fn to_pset_input(input: &Input) -> Result<pset::Input> {
    let outpoint = input.outpoint()?;
    let prevout = input.prevout()?;

    let mut pset_input = pset::Input {
        previous_txid: outpoint.txid,
        previous_output_index: outpoint.vout,
        witness_utxo: Some(prevout.clone()),
        sequence: Some(Sequence::ENABLE_LOCKTIME_NO_RBF),
        ..Default::default()
    };

    if input.is_confidential() {
        attach_explicit_proofs(&mut pset_input, input, &prevout)?;
    }

    if let Some(redeem_script) = input.redeem_script() {
        // P2SH-wrapped script hash: the P2SH redeem script is the P2WSH program.
        if prevout.script_pubkey.is_p2sh() {
            pset_input.redeem_script = Some(redeem_script.to_v0_p2wsh());
        }
        pset_input.witness_script = Some(redeem_script);
    }

    Ok(pset_input)
}

/// Attach the prevout rangeproof and proofs that the committed value and asset
/// match the revealed ones.
fn attach_explicit_proofs(pset_input: &mut pset::Input, input: &Input, prevout: &TxOut) -> Result<()> {
    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    let secrets = input.secrets()?;

    if !input.range_proof.is_empty() {
        let proof = RangeProof::from_slice(&input.range_proof).map_err(|e| {
            Error::InputInvalidField {
                field: "range proof",
                reason: e.to_string(),
            }
        })?;
        pset_input.in_utxo_rangeproof = Some(Box::new(proof));
    }

    pset_input.amount = Some(secrets.value);
    pset_input.asset = Some(secrets.asset);

    if let (Some(value_commitment), Some(asset_generator)) =
        (prevout.value.commitment(), prevout.asset.commitment())
    {
        let proof = RangeProof::blind_value_proof(
            &mut rng,
            &secp,
            secrets.value,
            value_commitment,
            asset_generator,
            secrets.value_bf,
        )
        .map_err(|e| Error::Blinding(format!("value proof: {e}")))?;
        pset_input.blind_value_proof = Some(Box::new(proof));
    }

    if prevout.asset.is_confidential() {
        let proof =
            SurjectionProof::blind_asset_proof(&mut rng, &secp, secrets.asset, secrets.asset_bf)
                .map_err(|e| Error::Blinding(format!("asset proof: {e}")))?;
        pset_input.blind_asset_proof = Some(Box::new(proof));
    }

    Ok(())
}
