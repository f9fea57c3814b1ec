//! Shared fixtures for unit and integration tests.

use std::collections::HashMap;

use lwk_wollet::elements::confidential::{AssetBlindingFactor, ValueBlindingFactor};
use lwk_wollet::elements::encode::serialize;
use lwk_wollet::elements::secp256k1_zkp::Secp256k1;
use lwk_wollet::elements::{TxOut, TxOutSecrets};
use sha2::{Digest, Sha256};

use crate::input::Input;
use crate::keys::{KeyHierarchy, SingleSigWallet};
use crate::network::Network;
use crate::output::Output;

pub const TEST_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";
pub const TEST_SINGLE_SIG_ROOT: &str = "m/84'/0'";
pub const TEST_MULTI_SIG_ROOT: &str = "m/48'/1'/0'/2'";
pub const TEST_COSIGNER_XPUB: &str = "xpub6EuX7TBEwhFgifQY24vFeMRqeWHGyGCupztDxk7G2ECAqGQ22Fik8E811p8GrM2LfajQzLidXy4qECxhdcxChkjiKhnq2fiVMVjdfSoZQwg";
pub const TEST_TXID: &str = "3bf5b21f9b5785de089be6dc4963058b4734bf86a9434c9910ad739dbf742eb0";
/// Liquid policy asset.
pub const LBTC: &str = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

pub const TEST_NETWORK: Network = Network::Liquid;

pub fn single_sig_wallet() -> SingleSigWallet {
    SingleSigWallet::from_mnemonic(TEST_MNEMONIC, TEST_SINGLE_SIG_ROOT).expect("test wallet")
}

/// Txid derived from `seed`, so fixtures built from different paths spend
/// different outpoints.
pub fn fake_txid(seed: &str) -> String {
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// An explicit L-BTC coin locked to the wallet's unconfidential address at
/// `path`, carrying the path needed to sign it.
pub fn funded_input<K: KeyHierarchy + ?Sized>(wallet: &K, path: &str, value: u64) -> Input {
    let derived = wallet
        .derive_address(path, TEST_NETWORK, false)
        .expect("derive address");
    Input {
        txid: fake_txid(path),
        index: 0,
        value,
        asset: LBTC.into(),
        script: derived.script_pubkey.as_bytes().to_vec(),
        derivation_path: Some(path.to_string()),
        redeem_script: derived
            .witness_script
            .map(|s| s.as_bytes().to_vec())
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// A confidential L-BTC coin sent to the wallet's confidential address at
/// `path`, with its blinders revealed.
pub fn confidential_input<K: KeyHierarchy + ?Sized>(wallet: &K, path: &str, value: u64) -> Input {
    let derived = wallet
        .derive_address(path, TEST_NETWORK, true)
        .expect("derive confidential address");
    let (txout, asset_bf, value_bf) = blinded_txout(&derived.address, value);

    let mut input = funded_input(wallet, path, value);
    input.value_commitment = serialize(&txout.value);
    input.asset_commitment = serialize(&txout.asset);
    input.nonce = serialize(&txout.nonce);
    input.range_proof = txout
        .witness
        .rangeproof
        .as_ref()
        .map(|proof| proof.serialize())
        .unwrap_or_default();
    input.surjection_proof = txout
        .witness
        .surjection_proof
        .as_ref()
        .map(|proof| proof.serialize())
        .unwrap_or_default();
    input.asset_blinder = asset_bf.into_inner().as_ref().to_vec();
    input.value_blinder = value_bf.into_inner().as_ref().to_vec();
    input
}

fn blinded_txout(
    address: &lwk_wollet::elements::Address,
    value: u64,
) -> (TxOut, AssetBlindingFactor, ValueBlindingFactor) {
    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    let asset = LBTC.parse().expect("asset id");
    let spent = TxOutSecrets::new(
        asset,
        AssetBlindingFactor::zero(),
        value,
        ValueBlindingFactor::zero(),
    );
    let (txout, asset_bf, value_bf, _ephemeral) = TxOut::new_not_last_confidential(
        &mut rng,
        &secp,
        value,
        address.clone(),
        asset,
        &[spent],
    )
    .expect("blind txout");
    (txout, asset_bf, value_bf)
}

/// An output paying `amount` to the wallet's confidential address at `path`.
pub fn confidential_output<K: KeyHierarchy + ?Sized>(
    wallet: &K,
    path: &str,
    amount: u64,
    blinder_index: u32,
) -> Output {
    let derived = wallet
        .derive_address(path, TEST_NETWORK, true)
        .expect("derive confidential address");
    Output {
        asset: LBTC.into(),
        amount,
        script: derived.script_pubkey.as_bytes().to_vec(),
        blinding_key: derived
            .blinding_pubkey
            .expect("confidential address has a blinding key")
            .serialize()
            .to_vec(),
        blinder_index,
    }
}

/// Explicit fee output.
pub fn fee_output(amount: u64) -> Output {
    Output {
        asset: LBTC.into(),
        amount,
        ..Default::default()
    }
}

/// Prevout script (hex) to derivation path, as the signing stages expect.
pub fn derivation_paths(inputs: &[&Input]) -> HashMap<String, String> {
    inputs
        .iter()
        .filter_map(|input| {
            let path = input.derivation_path.clone()?;
            Some((hex::encode(&input.script), path))
        })
        .collect()
}
