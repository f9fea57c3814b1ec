use lwk_wollet::elements::opcodes::all::OP_CHECKMULTISIG;
use lwk_wollet::elements::script::Builder;
use lwk_wollet::elements::secp256k1_zkp::PublicKey;
use lwk_wollet::elements::{Address, Script, bitcoin};

use crate::network::Network;

/// Result of an address derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Address,
    /// Locking script of the output paying to `address`.
    pub script_pubkey: Script,
    /// Witness script for script-hash payments.
    pub witness_script: Option<Script>,
    pub blinding_pubkey: Option<PublicKey>,
}

impl DerivedAddress {
    pub fn is_confidential(&self) -> bool {
        self.blinding_pubkey.is_some()
    }
}

/// P2WPKH payment to `pubkey`, confidential when a blinding key is given.
pub fn p2wpkh(pubkey: &PublicKey, blinding: Option<PublicKey>, network: Network) -> DerivedAddress {
    let address = Address::p2wpkh(
        &bitcoin::PublicKey::new(*pubkey),
        blinding,
        network.address_params(),
    );
    DerivedAddress {
        script_pubkey: address.script_pubkey(),
        address,
        witness_script: None,
        blinding_pubkey: blinding,
    }
}

/// P2WSH payment to `witness_script`.
pub fn p2wsh(witness_script: &Script, blinding: Option<PublicKey>, network: Network) -> DerivedAddress {
    let address = Address::p2wsh(witness_script, blinding, network.address_params());
    DerivedAddress {
        script_pubkey: address.script_pubkey(),
        address,
        witness_script: Some(witness_script.clone()),
        blinding_pubkey: blinding,
    }
}

/// Bare `m <pubkeys...> n OP_CHECKMULTISIG` script. Keys are used in the given order.
pub fn multisig_script(threshold: usize, pubkeys: &[PublicKey]) -> Script {
    let mut builder = Builder::new().push_int(threshold as i64);
    for pubkey in pubkeys {
        builder = builder.push_slice(&pubkey.serialize());
    }
    builder
        .push_int(pubkeys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::multisig_stats;
    use lwk_wollet::elements::secp256k1_zkp::{Secp256k1, SecretKey};

    fn pubkey(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).expect("valid secret");
        PublicKey::from_secret_key(&secp, &sk)
    }

    #[test]
    fn p2wpkh_confidentiality_follows_blinding_key() {
        let unconf = p2wpkh(&pubkey(1), None, Network::Liquid);
        assert!(!unconf.is_confidential());
        assert!(unconf.script_pubkey.is_v0_p2wpkh());

        let conf = p2wpkh(&pubkey(1), Some(pubkey(2)), Network::Liquid);
        assert!(conf.is_confidential());
        assert!(conf.address.is_blinded());
        // Blinding does not change the locking script.
        assert_eq!(conf.script_pubkey, unconf.script_pubkey);
    }

    #[test]
    fn multisig_script_round_trips_through_stats() {
        let keys = [pubkey(1), pubkey(2), pubkey(3)];
        let script = multisig_script(2, &keys);
        assert_eq!(multisig_stats(&script), Some((3, 2)));

        let payment = p2wsh(&script, None, Network::LiquidTestnet);
        assert!(payment.script_pubkey.is_v0_p2wsh());
        assert_eq!(payment.witness_script, Some(script));
    }
}
