use std::str::FromStr;

use lwk_wollet::elements::confidential::{
    self, AssetBlindingFactor, ValueBlindingFactor,
};
use lwk_wollet::elements::{AssetId, OutPoint, Script, TxOut, TxOutSecrets, Txid};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::estimation::ScriptType;

/// A coin to spend: the outpoint, everything known about the prevout, and the
/// metadata needed to sign it and estimate its size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    /// Txid in display (reversed) hex.
    pub txid: String,
    pub index: u32,
    pub value: u64,
    /// Asset id in display hex.
    pub asset: String,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
    #[serde(with = "hex")]
    pub value_blinder: Vec<u8>,
    #[serde(with = "hex")]
    pub asset_blinder: Vec<u8>,
    #[serde(with = "hex")]
    pub value_commitment: Vec<u8>,
    #[serde(with = "hex")]
    pub asset_commitment: Vec<u8>,
    #[serde(with = "hex")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex")]
    pub range_proof: Vec<u8>,
    #[serde(with = "hex")]
    pub surjection_proof: Vec<u8>,
    pub derivation_path: Option<String>,
    #[serde(with = "hex")]
    pub redeem_script: Vec<u8>,
    /// Overrides the scriptSig size estimate.
    pub script_sig_size: Option<usize>,
    /// Overrides the witness size estimate.
    pub witness_size: Option<usize>,
}

impl Input {
    pub fn validate(&self) -> Result<()> {
        if self.txid.is_empty() {
            return Err(Error::InputMissingTxid);
        }
        match hex::decode(&self.txid) {
            Ok(bytes) if bytes.len() == 32 => Ok(()),
            _ => Err(Error::InputInvalidTxid),
        }
    }

    pub fn outpoint(&self) -> Result<OutPoint> {
        self.validate()?;
        let txid = Txid::from_str(&self.txid).map_err(|_| Error::InputInvalidTxid)?;
        Ok(OutPoint::new(txid, self.index))
    }

    pub fn is_confidential(&self) -> bool {
        !self.value_commitment.is_empty() || !self.asset_commitment.is_empty()
    }

    pub fn script_type(&self) -> ScriptType {
        ScriptType::classify(&self.script_pubkey(), !self.redeem_script.is_empty())
    }

    pub fn script_pubkey(&self) -> Script {
        Script::from(self.script.clone())
    }

    pub fn redeem_script(&self) -> Option<Script> {
        (!self.redeem_script.is_empty()).then(|| Script::from(self.redeem_script.clone()))
    }

    /// The output being spent. Commitments win over explicit values; a missing
    /// nonce is null. Proofs are not part of the prevout itself.
    pub fn prevout(&self) -> Result<TxOut> {
        let value = if self.value_commitment.is_empty() {
            confidential::Value::Explicit(self.value)
        } else {
            confidential::Value::from_commitment(&self.value_commitment)
                .map_err(|e| invalid("value commitment", e))?
        };
        let asset = if self.asset_commitment.is_empty() {
            confidential::Asset::Explicit(self.asset_id()?)
        } else {
            confidential::Asset::from_commitment(&self.asset_commitment)
                .map_err(|e| invalid("asset commitment", e))?
        };
        let nonce = if self.nonce.is_empty() {
            confidential::Nonce::Null
        } else {
            confidential::Nonce::from_commitment(&self.nonce).map_err(|e| invalid("nonce", e))?
        };

        Ok(TxOut {
            asset,
            value,
            nonce,
            script_pubkey: self.script_pubkey(),
            witness: Default::default(),
        })
    }

    pub fn asset_id(&self) -> Result<AssetId> {
        AssetId::from_str(&self.asset).map_err(|e| invalid("asset", e))
    }

    /// Cleartext value, asset and blinders. Missing blinders are zero.
    pub fn secrets(&self) -> Result<TxOutSecrets> {
        let asset_bf = if self.asset_blinder.is_empty() {
            AssetBlindingFactor::zero()
        } else {
            AssetBlindingFactor::from_slice(&self.asset_blinder)
                .map_err(|e| invalid("asset blinder", e))?
        };
        let value_bf = if self.value_blinder.is_empty() {
            ValueBlindingFactor::zero()
        } else {
            ValueBlindingFactor::from_slice(&self.value_blinder)
                .map_err(|e| invalid("value blinder", e))?
        };
        Ok(TxOutSecrets::new(self.asset_id()?, asset_bf, self.value, value_bf))
    }
}

fn invalid(field: &'static str, err: impl std::fmt::Display) -> Error {
    Error::InputInvalidField {
        field,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "3bf5b21f9b5785de089be6dc4963058b4734bf86a9434c9910ad739dbf742eb0";
    const LBTC: &str = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

    #[test]
    fn validates_txid() {
        let mut input = Input::default();
        assert!(matches!(input.validate(), Err(Error::InputMissingTxid)));
        input.txid = "abcd".into();
        assert!(matches!(input.validate(), Err(Error::InputInvalidTxid)));
        input.txid = "zz".repeat(32);
        assert!(matches!(input.validate(), Err(Error::InputInvalidTxid)));
        input.txid = TXID.into();
        input.validate().expect("valid txid");
        assert_eq!(input.outpoint().expect("outpoint").txid.to_string(), TXID);
    }

    #[test]
    fn explicit_prevout() {
        let input = Input {
            txid: TXID.into(),
            value: 1_000,
            asset: LBTC.into(),
            script: hex::decode("00140b51f5036527f61a234015ed3bdc84497793b26d").expect("hex"),
            ..Default::default()
        };
        assert!(!input.is_confidential());
        let prevout = input.prevout().expect("prevout");
        assert_eq!(prevout.value, confidential::Value::Explicit(1_000));
        assert_eq!(prevout.asset.explicit().map(|a| a.to_string()), Some(LBTC.to_string()));
        assert!(prevout.nonce.is_null());
        assert_eq!(input.script_type(), ScriptType::P2wpkh);
    }

    #[test]
    fn redeem_script_turns_p2sh_into_wrapped_script_hash() {
        let mut input = Input {
            script: hex::decode("a914ecc84d1102e0d11f3ab9448e994248291a3582df87").expect("hex"),
            ..Default::default()
        };
        assert_eq!(input.script_type(), ScriptType::P2shP2wpkh);
        input.redeem_script = vec![0x51];
        assert_eq!(input.script_type(), ScriptType::P2shP2wsh);
    }

    #[test]
    fn secrets_default_blinders_to_zero() {
        let input = Input {
            txid: TXID.into(),
            value: 42,
            asset: LBTC.into(),
            ..Default::default()
        };
        let secrets = input.secrets().expect("secrets");
        assert_eq!(secrets.value, 42);
        assert_eq!(secrets.asset_bf, AssetBlindingFactor::zero());
        assert_eq!(secrets.value_bf, ValueBlindingFactor::zero());
    }

    #[test]
    fn serde_uses_hex_for_bytes() {
        let input = Input {
            txid: TXID.into(),
            script: vec![0x00, 0x14],
            ..Default::default()
        };
        let json = serde_json::to_value(&input).expect("serialize");
        assert_eq!(json["script"], "0014");
        let back: Input = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, input);
    }
}
