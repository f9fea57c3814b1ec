//! Transaction size and fee estimation.
//!
//! Sizes mirror the Elements wire format: every input and output carries
//! witness fields for issuance, peg-in and proofs even when empty, and a
//! transaction always ends with an explicit fee output.

use lwk_wollet::elements::Script;
use lwk_wollet::elements::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_1, OP_PUSHNUM_16};
use lwk_wollet::elements::script::Instruction;

use crate::input::Input;
use crate::output::Output;

/// Spending script kinds that drive scriptSig and witness estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    P2pk,
    P2pkh,
    P2ms,
    P2shP2wpkh,
    P2shP2wsh,
    P2wpkh,
    P2wsh,
}

impl ScriptType {
    /// Classify a prevout script. A P2SH script spent with a redeem script is
    /// wrapped segwit script-hash; otherwise wrapped pubkey-hash.
    /// Unrecognised scripts are estimated as P2PK.
    pub fn classify(script: &Script, has_redeem_script: bool) -> Self {
        if script.is_p2pkh() {
            ScriptType::P2pkh
        } else if script.is_p2sh() {
            if has_redeem_script {
                ScriptType::P2shP2wsh
            } else {
                ScriptType::P2shP2wpkh
            }
        } else if script.is_v0_p2wpkh() {
            ScriptType::P2wpkh
        } else if script.is_v0_p2wsh() {
            ScriptType::P2wsh
        } else if multisig_stats(script).is_some() {
            ScriptType::P2ms
        } else {
            ScriptType::P2pk
        }
    }

    /// Serialized scriptSig size, length prefix included.
    pub const fn script_sig_size(self) -> usize {
        match self {
            // len + opcode + sig + opcode + uncompressed pubkey
            ScriptType::P2pk => 140,
            // len + opcode + sig + opcode + pubkey
            ScriptType::P2pkh => 108,
            ScriptType::P2ms => 0,
            // len + p2wpkh program
            ScriptType::P2shP2wpkh => 23,
            // len + p2wsh program
            ScriptType::P2shP2wsh => 35,
            ScriptType::P2wpkh | ScriptType::P2wsh => 1,
        }
    }
}

// Witness of a single-sig spend: item count + [sig, pubkey].
const DEFAULT_WITNESS_SIZE: usize = 1 + 107;
// Empty issuance amount proof, inflation keys proof and peg-in witness.
const INPUT_WITNESS_MARKERS: usize = 3;

// asset + explicit value + empty nonce
const UNCONFIDENTIAL_OUTPUT_SIZE: usize = 33 + 9 + 1;
// asset + value + nonce commitments
const CONFIDENTIAL_OUTPUT_SIZE: usize = 33 + 33 + 33;
// empty rangeproof + empty surjection proof
const UNCONFIDENTIAL_OUTPUT_WITNESS: usize = 1 + 1;
// len + rangeproof + len + surjection proof
const CONFIDENTIAL_OUTPUT_WITNESS: usize = 3 + 4174 + 1 + 131;
// asset + explicit value + empty script + empty nonce
const FEE_OUTPUT_SIZE: usize = 33 + 9 + 1 + 1;

// txid + vout + sequence
const INPUT_BASE_SIZE: usize = 40;
// version + flag + locktime
const TX_OVERHEAD: usize = 9;

/// Estimated virtual size of a transaction spending `inputs` into `outputs`
/// plus an explicit fee output.
///
/// Multisig inputs without an explicit witness size are estimated from their
/// redeem script. If the redeem script is not a recognisable multisig the
/// single-sig default is used instead.
pub fn estimate_tx_size(inputs: &[Input], outputs: &[Output]) -> u64 {
    let mut base = TX_OVERHEAD + var_int_size(inputs.len() as u64)
        + var_int_size(outputs.len() as u64 + 1);
    let mut witness = 0;

    for input in inputs {
        let script_sig = input
            .script_sig_size
            .unwrap_or_else(|| input.script_type().script_sig_size());
        base += INPUT_BASE_SIZE + script_sig;
        witness += input_witness_size(input) + INPUT_WITNESS_MARKERS;
    }

    for output in outputs {
        if output.is_confidential() {
            base += CONFIDENTIAL_OUTPUT_SIZE + output.script_size();
            witness += CONFIDENTIAL_OUTPUT_WITNESS;
        } else {
            base += UNCONFIDENTIAL_OUTPUT_SIZE + output.script_size();
            witness += UNCONFIDENTIAL_OUTPUT_WITNESS;
        }
    }

    base += FEE_OUTPUT_SIZE;
    witness += UNCONFIDENTIAL_OUTPUT_WITNESS;

    let total = base + witness;
    let weight = base * 3 + total;
    weight.div_ceil(4) as u64
}

/// Fee for the estimated size at `millisats_per_byte`, rounded up.
pub fn estimate_fees(inputs: &[Input], outputs: &[Output], millisats_per_byte: u64) -> u64 {
    let vsize = estimate_tx_size(inputs, outputs);
    (vsize * millisats_per_byte).div_ceil(1000)
}

fn input_witness_size(input: &Input) -> usize {
    if let Some(size) = input.witness_size {
        return size;
    }
    if input.redeem_script.is_empty() {
        return DEFAULT_WITNESS_SIZE;
    }
    let redeem_script = Script::from(input.redeem_script.clone());
    match multisig_stats(&redeem_script) {
        // sigs + separators + redeem script
        Some((_, m)) => 75 * m + m - 1 + var_slice_size(input.redeem_script.len()),
        None => {
            log::debug!("estimation: redeem script is not multisig, using default witness size");
            DEFAULT_WITNESS_SIZE
        }
    }
}

/// `(n, m)` of a bare `m <n pubkeys> n OP_CHECKMULTISIG` script.
pub fn multisig_stats(script: &Script) -> Option<(usize, usize)> {
    let instructions: Vec<Instruction<'_>> = script.instructions().collect::<Result<_, _>>().ok()?;
    let (first, rest) = instructions.split_first()?;
    let (last, rest) = rest.split_last()?;
    let (total, keys) = rest.split_last()?;

    if !matches!(last, Instruction::Op(op) if *op == OP_CHECKMULTISIG) {
        return None;
    }
    let m = small_int(first)?;
    let n = small_int(total)?;
    let all_keys = keys
        .iter()
        .all(|k| matches!(k, Instruction::PushBytes(bytes) if bytes.len() == 33 || bytes.len() == 65));
    if !all_keys || keys.len() != n || m == 0 || m > n {
        return None;
    }
    Some((n, m))
}

fn small_int(instruction: &Instruction<'_>) -> Option<usize> {
    match instruction {
        Instruction::Op(op) => {
            let code = op.into_u8();
            if (OP_PUSHNUM_1.into_u8()..=OP_PUSHNUM_16.into_u8()).contains(&code) {
                Some((code - OP_PUSHNUM_1.into_u8() + 1) as usize)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub(crate) fn var_int_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub(crate) fn var_slice_size(len: usize) -> usize {
    var_int_size(len as u64) + len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(hex_str: &str) -> Script {
        Script::from(hex::decode(hex_str).expect("hex"))
    }

    #[test]
    fn classifies_standard_scripts() {
        let p2wpkh = script("00140b51f5036527f61a234015ed3bdc84497793b26d");
        let p2sh = script("a914ecc84d1102e0d11f3ab9448e994248291a3582df87");
        let p2wsh = script("002026b2fb5626d5dbb0e089fd99ecbbf11561bc2a63b05401d3a27e24c7f2ee9cc5");
        let p2pkh = script("76a91483a220425cf9f653175e81e7438f57ba7483e26288ac");

        assert_eq!(ScriptType::classify(&p2wpkh, false), ScriptType::P2wpkh);
        assert_eq!(ScriptType::classify(&p2sh, false), ScriptType::P2shP2wpkh);
        assert_eq!(ScriptType::classify(&p2sh, true), ScriptType::P2shP2wsh);
        assert_eq!(ScriptType::classify(&p2wsh, false), ScriptType::P2wsh);
        assert_eq!(ScriptType::classify(&p2pkh, false), ScriptType::P2pkh);
        assert_eq!(ScriptType::classify(&Script::new(), false), ScriptType::P2pk);
    }

    #[test]
    fn var_int_boundaries() {
        assert_eq!(var_int_size(0xfc), 1);
        assert_eq!(var_int_size(0xfd), 3);
        assert_eq!(var_int_size(0xffff), 3);
        assert_eq!(var_int_size(0x1_0000), 5);
        assert_eq!(var_int_size(u64::from(u32::MAX) + 1), 9);
        assert_eq!(var_slice_size(22), 23);
    }

    #[test]
    fn multisig_stats_rejects_non_multisig() {
        assert_eq!(multisig_stats(&script("00140b51f5036527f61a234015ed3bdc84497793b26d")), None);
        assert_eq!(multisig_stats(&Script::new()), None);
    }
}
