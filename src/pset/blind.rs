use std::collections::{BTreeMap, BTreeSet, HashMap};

use lwk_wollet::elements::confidential::{self, AssetBlindingFactor, ValueBlindingFactor};
use lwk_wollet::elements::pset::{self, PartiallySignedTransaction};
use lwk_wollet::elements::secp256k1_zkp::{Secp256k1, SecretKey, Verification};
use lwk_wollet::elements_miniscript::slip77::MasterBlindingKey;
use lwk_wollet::elements::{TxOut, TxOutSecrets};

use crate::error::{Error, Result};
use crate::input::Input;

/// Blind the outputs assigned to inputs whose secrets the caller supplies.
///
/// `owned_inputs` maps input positions to their revealed value, asset and
/// blinders. An output is blinded when its blinder index is one of those
/// positions. The last blinder also balances the blinding factors of the
/// whole transaction. A PSET with nothing left to blind is returned as-is.
pub fn blind_with_owned_inputs(
    pset: &PartiallySignedTransaction,
    owned_inputs: &BTreeMap<usize, Input>,
    last_blinder: bool,
) -> Result<PartiallySignedTransaction> {
    if owned_inputs.is_empty() {
        return Err(Error::MissingOwnedInputs);
    }
    if owned_inputs.keys().any(|&index| index >= pset.n_inputs()) {
        return Err(Error::BlindInputOutOfRange);
    }
    if !needs_blinding(pset) {
        return Ok(pset.clone());
    }

    let mut secrets = HashMap::with_capacity(owned_inputs.len());
    for (&index, input) in owned_inputs {
        let revealed = input.secrets().map_err(|e| Error::InvalidInput {
            index,
            source: Box::new(e),
        })?;
        secrets.insert(index, revealed);
    }

    blind(pset, secrets, last_blinder)
}

/// Blind the outputs assigned to this wallet's inputs, unblinding them with
/// the wallet's SLIP-77 master key.
///
/// `extra_blinding_keys` maps prevout scripts (hex) to private blinding keys
/// for inputs that were not derived from `master_key`. Inputs whose script is
/// in the map are unblinded with that key; every other input is treated as
/// owned.
pub fn blind_with_master_key(
    pset: &PartiallySignedTransaction,
    master_key: &MasterBlindingKey,
    extra_blinding_keys: &HashMap<String, SecretKey>,
    last_blinder: bool,
) -> Result<PartiallySignedTransaction> {
    if !needs_blinding(pset) {
        return Ok(pset.clone());
    }

    let consumed = consumed_blinders(pset);
    let secp = Secp256k1::new();
    let mut secrets = HashMap::with_capacity(pset.n_inputs());
    for (index, input) in pset.inputs().iter().enumerate() {
        if consumed.contains(&index) {
            continue;
        }
        let prevout = prevout_with_proof(index, input)?;
        let script = hex::encode(prevout.script_pubkey.as_bytes());

        let revealed = match extra_blinding_keys.get(&script) {
            Some(key) => reveal(&secp, &prevout, *key)
                .map_err(|_| Error::UnblindMismatch { index, script })?,
            None => {
                let key = master_key.blinding_private_key(&prevout.script_pubkey);
                reveal(&secp, &prevout, key).map_err(|reason| Error::Unblind { index, reason })?
            }
        };
        secrets.insert(index, revealed);
    }

    blind(pset, secrets, last_blinder)
}

fn needs_blinding(pset: &PartiallySignedTransaction) -> bool {
    pset.outputs().iter().any(pending_blinding)
}

fn pending_blinding(output: &pset::Output) -> bool {
    output.is_marked_for_blinding() && !output.is_fully_blinded()
}

/// Inputs that blinded an output in an earlier round. Their blinding factors
/// are already folded into the PSET's global scalars.
fn consumed_blinders(pset: &PartiallySignedTransaction) -> BTreeSet<usize> {
    pset.outputs()
        .iter()
        .filter(|output| output.is_fully_blinded())
        .filter_map(|output| output.blinder_index)
        .map(|index| index as usize)
        .collect()
}

/// Positions of outputs still waiting for one of `blinders` to blind them.
fn outputs_to_blind(pset: &PartiallySignedTransaction, blinders: &BTreeSet<usize>) -> Vec<usize> {
    pset.outputs()
        .iter()
        .enumerate()
        .filter(|(_, output)| pending_blinding(output))
        .filter(|(_, output)| {
            output
                .blinder_index
                .is_some_and(|index| blinders.contains(&(index as usize)))
        })
        .map(|(index, _)| index)
        .collect()
}

fn blind(
    pset: &PartiallySignedTransaction,
    secrets: HashMap<usize, TxOutSecrets>,
    last_blinder: bool,
) -> Result<PartiallySignedTransaction> {
    // Consumed inputs never reach the blinder again.
    let consumed = consumed_blinders(pset);
    let secrets: HashMap<usize, TxOutSecrets> = secrets
        .into_iter()
        .filter(|(index, _)| !consumed.contains(index))
        .collect();
    if !consumed.is_empty() {
        log::debug!("blind: inputs {consumed:?} already blinded in an earlier round");
    }

    let blinders: BTreeSet<usize> = secrets.keys().copied().collect();
    let selected = outputs_to_blind(pset, &blinders);
    if selected.is_empty() {
        log::debug!("blind: no outputs assigned to inputs {blinders:?}");
        return Ok(pset.clone());
    }

    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    let mut blinded = pset.clone();
    if last_blinder {
        blinded
            .blind_last(&mut rng, &secp, &secrets)
            .map_err(|e| Error::Blinding(e.to_string()))?;
    } else {
        blinded
            .blind_non_last(&mut rng, &secp, &secrets)
            .map_err(|e| Error::Blinding(e.to_string()))?;
    }

    if let Some(index) = selected
        .iter()
        .copied()
        .find(|&index| !blinded.outputs()[index].is_fully_blinded())
    {
        return Err(Error::Blinding(format!("output {index} was not blinded")));
    }

    log::debug!("blind: blinded outputs {selected:?} (last blinder: {last_blinder})");
    Ok(blinded)
}

/// Witness UTXO of `input` with its rangeproof restored, so it can be
/// unblinded.
fn prevout_with_proof(index: usize, input: &pset::Input) -> Result<TxOut> {
    let mut prevout = input
        .witness_utxo
        .clone()
        .ok_or(Error::MissingWitnessUtxo(index))?;
    if prevout.witness.rangeproof.is_none() {
        prevout.witness.rangeproof = input.in_utxo_rangeproof.clone();
    }
    Ok(prevout)
}

/// Reveal the secrets of `prevout`. Explicit prevouts have zero blinders.
fn reveal<C: Verification>(
    secp: &Secp256k1<C>,
    prevout: &TxOut,
    key: SecretKey,
) -> std::result::Result<TxOutSecrets, String> {
    if let (confidential::Asset::Explicit(asset), confidential::Value::Explicit(value)) =
        (prevout.asset, prevout.value)
    {
        return Ok(TxOutSecrets::new(
            asset,
            AssetBlindingFactor::zero(),
            value,
            ValueBlindingFactor::zero(),
        ));
    }
    prevout.unblind(secp, key).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, LBTC};

    #[test]
    fn owned_inputs_are_mandatory_and_in_range() {
        let wallet = testing::single_sig_wallet();
        let input = testing::funded_input(&wallet, "0'/0/0", 10_000);
        let pset = crate::pset::create_pset(
            std::slice::from_ref(&input),
            &[testing::confidential_output(&wallet, "0'/0/1", 9_000, 0)],
        )
        .expect("pset");

        assert!(matches!(
            blind_with_owned_inputs(&pset, &BTreeMap::new(), true),
            Err(Error::MissingOwnedInputs)
        ));
        let out_of_range = BTreeMap::from([(1, input)]);
        assert!(matches!(
            blind_with_owned_inputs(&pset, &out_of_range, true),
            Err(Error::BlindInputOutOfRange)
        ));
    }

    #[test]
    fn nothing_to_blind_is_a_no_op() {
        let wallet = testing::single_sig_wallet();
        let input = testing::funded_input(&wallet, "0'/0/0", 10_000);
        let output = crate::output::Output {
            asset: LBTC.into(),
            amount: 9_500,
            script: input.script.clone(),
            ..Default::default()
        };
        let pset = crate::pset::create_pset(std::slice::from_ref(&input), &[output]).expect("pset");
        let owned = BTreeMap::from([(0, input)]);
        let blinded = blind_with_owned_inputs(&pset, &owned, true).expect("no-op");
        assert_eq!(crate::pset::encode(&blinded), crate::pset::encode(&pset));
    }

    #[test]
    fn outputs_are_selected_by_blinder_index() {
        let wallet = testing::single_sig_wallet();
        let inputs = [
            testing::funded_input(&wallet, "0'/0/0", 10_000),
            testing::funded_input(&wallet, "0'/0/1", 10_000),
        ];
        let outputs = [
            testing::confidential_output(&wallet, "0'/0/2", 1_000, 0),
            testing::confidential_output(&wallet, "0'/0/3", 1_000, 1),
        ];
        let pset = crate::pset::create_pset(&inputs, &outputs).expect("pset");
        assert_eq!(outputs_to_blind(&pset, &BTreeSet::from([1])), vec![1]);
        assert_eq!(outputs_to_blind(&pset, &BTreeSet::from([0, 1])), vec![0, 1]);
        assert!(outputs_to_blind(&pset, &BTreeSet::from([2])).is_empty());
    }

    #[test]
    fn blinded_outputs_retire_their_blinder() {
        let wallet = testing::single_sig_wallet();
        let input = testing::funded_input(&wallet, "0'/0/0", 10_000);
        let pset = crate::pset::create_pset(
            std::slice::from_ref(&input),
            &[testing::confidential_output(&wallet, "0'/0/2", 9_000, 0)],
        )
        .expect("pset");
        assert!(consumed_blinders(&pset).is_empty());

        let owned = BTreeMap::from([(0, input)]);
        let blinded = blind_with_owned_inputs(&pset, &owned, false).expect("blind");
        assert_eq!(blinded.global.scalars.len(), 1);
        assert_eq!(consumed_blinders(&blinded), BTreeSet::from([0]));
        assert!(outputs_to_blind(&blinded, &BTreeSet::from([0])).is_empty());
    }

    #[test]
    fn explicit_prevouts_reveal_zero_blinders() {
        let secp = Secp256k1::new();
        let wallet = testing::single_sig_wallet();
        let prevout = testing::funded_input(&wallet, "0'/0/0", 4_200)
            .prevout()
            .expect("prevout");
        let key = SecretKey::from_slice(&[1u8; 32]).expect("key");
        let secrets = reveal(&secp, &prevout, key).expect("explicit");
        assert_eq!(secrets.value, 4_200);
        assert_eq!(secrets.asset_bf, AssetBlindingFactor::zero());
    }
}
