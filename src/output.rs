use std::str::FromStr;

use lwk_wollet::elements::pset;
use lwk_wollet::elements::secp256k1_zkp::PublicKey;
use lwk_wollet::elements::{AssetId, Script, bitcoin};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::estimation::{multisig_stats, var_slice_size};

/// An output to add to a PSET. Confidential when a blinding key is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Asset id in display hex.
    pub asset: String,
    pub amount: u64,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
    #[serde(with = "hex")]
    pub blinding_key: Vec<u8>,
    /// Index of the input whose owner blinds this output.
    pub blinder_index: u32,
}

impl Output {
    pub fn validate(&self) -> Result<()> {
        if self.asset.is_empty() {
            return Err(Error::OutputMissingAsset);
        }
        match hex::decode(&self.asset) {
            Ok(bytes) if bytes.len() == 32 => {}
            _ => return Err(Error::OutputInvalidAsset),
        }
        if !self.script.is_empty() && !is_standard(&Script::from(self.script.clone())) {
            return Err(Error::OutputInvalidScript);
        }
        if !self.blinding_key.is_empty() {
            PublicKey::from_slice(&self.blinding_key)
                .map_err(|_| Error::OutputInvalidBlindingKey)?;
        }
        Ok(())
    }

    pub fn is_confidential(&self) -> bool {
        !self.blinding_key.is_empty()
    }

    /// Serialized script size, length prefix included.
    pub fn script_size(&self) -> usize {
        var_slice_size(self.script.len())
    }

    pub fn asset_id(&self) -> Result<AssetId> {
        AssetId::from_str(&self.asset).map_err(|_| Error::OutputInvalidAsset)
    }

    pub(crate) fn to_pset_output(&self) -> Result<pset::Output> {
        let mut output = pset::Output {
            amount: Some(self.amount),
            asset: Some(self.asset_id()?),
            script_pubkey: Script::from(self.script.clone()),
            ..Default::default()
        };
        if self.is_confidential() {
            let blinding_key = PublicKey::from_slice(&self.blinding_key)
                .map_err(|_| Error::OutputInvalidBlindingKey)?;
            output.blinding_key = Some(bitcoin::PublicKey::new(blinding_key));
            output.blinder_index = Some(self.blinder_index);
        }
        Ok(output)
    }
}

/// Script templates an output may lock to.
fn is_standard(script: &Script) -> bool {
    script.is_p2pk()
        || script.is_p2pkh()
        || script.is_p2sh()
        || script.is_v0_p2wpkh()
        || script.is_v0_p2wsh()
        || script.is_v1_p2tr()
        || script.is_op_return()
        || multisig_stats(script).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LBTC: &str = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

    #[test]
    fn validation_errors() {
        let mut output = Output::default();
        assert!(matches!(output.validate(), Err(Error::OutputMissingAsset)));

        output.asset = "00".repeat(33);
        assert!(matches!(output.validate(), Err(Error::OutputInvalidAsset)));

        output.asset = LBTC.into();
        output.validate().expect("explicit output without script is valid");

        // Push of 20 bytes with only 2 bytes following.
        output.script = vec![0x00, 0x14, 0xaa, 0xbb];
        assert!(matches!(output.validate(), Err(Error::OutputInvalidScript)));

        output.script = hex::decode("00140b51f5036527f61a234015ed3bdc84497793b26d").expect("hex");
        output.blinding_key = vec![0u8; 33];
        assert!(matches!(output.validate(), Err(Error::OutputInvalidBlindingKey)));
    }

    #[test]
    fn only_standard_scripts_are_accepted() {
        let mut output = Output {
            asset: LBTC.into(),
            amount: 1_000,
            ..Default::default()
        };

        for script in [
            "76a9140b51f5036527f61a234015ed3bdc84497793b26d88ac",
            "a914ecc84d1102e0d11f3ab9448e994248291a3582df87",
            "00140b51f5036527f61a234015ed3bdc84497793b26d",
            "002026b2fb5626d5dbb0e089fd99ecbbf11561bc2a63b05401d3a27e24c7f2ee9cc5",
            "512026b2fb5626d5dbb0e089fd99ecbbf11561bc2a63b05401d3a27e24c7f2ee9cc5",
            "6a0b68656c6c6f20776f726c64",
        ] {
            output.script = hex::decode(script).expect("hex");
            output.validate().expect(script);
        }

        // OP_TRUE
        output.script = vec![0x51];
        assert!(matches!(output.validate(), Err(Error::OutputInvalidScript)));
        // Witness v0 program of the wrong length.
        output.script = hex::decode("00100b51f5036527f61a234015ed3bdc8449").expect("hex");
        assert!(matches!(output.validate(), Err(Error::OutputInvalidScript)));
    }

    #[test]
    fn confidential_outputs_carry_blinding_metadata() {
        let secp = lwk_wollet::elements::secp256k1_zkp::Secp256k1::new();
        let sk = lwk_wollet::elements::secp256k1_zkp::SecretKey::from_slice(&[7u8; 32])
            .expect("secret");
        let output = Output {
            asset: LBTC.into(),
            amount: 5_000,
            script: hex::decode("00140b51f5036527f61a234015ed3bdc84497793b26d").expect("hex"),
            blinding_key: PublicKey::from_secret_key(&secp, &sk).serialize().to_vec(),
            blinder_index: 1,
        };
        output.validate().expect("valid");
        assert!(output.is_confidential());
        assert_eq!(output.script_size(), 23);

        let pset_output = output.to_pset_output().expect("pset output");
        assert!(pset_output.is_marked_for_blinding());
        assert_eq!(pset_output.blinder_index, Some(1));
        assert_eq!(pset_output.amount, Some(5_000));
    }

    #[test]
    fn unconfidential_output_is_not_marked() {
        let output = Output {
            asset: LBTC.into(),
            amount: 500,
            ..Default::default()
        };
        let pset_output = output.to_pset_output().expect("pset output");
        assert!(!pset_output.is_marked_for_blinding());
        assert!(pset_output.blinder_index.is_none());
    }
}
