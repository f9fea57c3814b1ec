use std::str::FromStr;

use lwk_wollet::elements::BlockHash;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::estimation;
use crate::input::Input;
use crate::keys::{MultiSigWallet, SingleSigWallet, Wallet};
use crate::network::Network;
use crate::output::Output;

/// Default fee rate in millisats per byte (0.1 sat/vbyte).
pub const DEFAULT_FEE_RATE: u64 = 100;

/// Wallet settings, usually loaded from JSON.
///
/// ```json
/// { "network": "testnet", "root_path": "m/84'/1'", "fee_rate": 100 }
/// ```
///
/// A config listing cosigner xpubs opens a multisig wallet, otherwise a
/// single-signer one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(deserialize_with = "network_alias")]
    pub network: Network,
    pub root_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cosigner_xpubs: Vec<String>,
    /// Millisats per byte.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: u64,
    /// Overrides the network's genesis block hash for taproot sighashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_block_hash: Option<String>,
}

fn default_fee_rate() -> u64 {
    DEFAULT_FEE_RATE
}

fn network_alias<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Network, D::Error> {
    let name = String::deserialize(deserializer)?;
    Network::from_str(&name).map_err(serde::de::Error::custom)
}

impl WalletConfig {
    pub fn new(network: Network, root_path: impl Into<String>) -> Self {
        Self {
            network,
            root_path: root_path.into(),
            cosigner_xpubs: Vec::new(),
            fee_rate: DEFAULT_FEE_RATE,
            genesis_block_hash: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_path.is_empty() {
            return Err(Error::MissingRootPath);
        }
        if self.fee_rate == 0 {
            return Err(Error::Config("fee rate must be greater than zero".into()));
        }
        self.genesis_hash()?;
        Ok(())
    }

    pub fn is_multisig(&self) -> bool {
        !self.cosigner_xpubs.is_empty()
    }

    /// Genesis hash used when signing and verifying taproot inputs.
    pub fn genesis_hash(&self) -> Result<BlockHash> {
        match &self.genesis_block_hash {
            Some(hash) => BlockHash::from_str(hash)
                .map_err(|e| Error::Config(format!("invalid genesis block hash: {e}"))),
            None => Ok(self.network.genesis_hash()),
        }
    }

    /// Restore a wallet from `mnemonic`.
    pub fn open(&self, mnemonic: &str) -> Result<Wallet> {
        self.validate()?;
        let wallet = if self.is_multisig() {
            Wallet::Multi(MultiSigWallet::from_mnemonic(
                mnemonic,
                &self.root_path,
                &self.cosigner_xpubs,
            )?)
        } else {
            Wallet::Single(SingleSigWallet::from_mnemonic(mnemonic, &self.root_path)?)
        };
        log::info!(
            "opened {} wallet on {}",
            policy_name(&wallet),
            self.network.as_str()
        );
        Ok(wallet)
    }

    /// Create a wallet from a fresh mnemonic.
    pub fn create(&self) -> Result<Wallet> {
        self.validate()?;
        let wallet = if self.is_multisig() {
            Wallet::Multi(MultiSigWallet::new(&self.root_path, &self.cosigner_xpubs)?)
        } else {
            Wallet::Single(SingleSigWallet::new(&self.root_path)?)
        };
        log::info!(
            "created {} wallet on {}",
            policy_name(&wallet),
            self.network.as_str()
        );
        Ok(wallet)
    }

    /// Fee for spending `inputs` into `outputs` at the configured rate.
    pub fn estimate_fees(&self, inputs: &[Input], outputs: &[Output]) -> u64 {
        estimation::estimate_fees(inputs, outputs, self.fee_rate)
    }
}

fn policy_name(wallet: &Wallet) -> &'static str {
    match wallet {
        Wallet::Single(_) => "single-sig",
        Wallet::Multi(_) => "multisig",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        TEST_COSIGNER_XPUB, TEST_MNEMONIC, TEST_MULTI_SIG_ROOT, TEST_SINGLE_SIG_ROOT,
    };

    #[test]
    fn defaults_and_aliases() {
        let config =
            WalletConfig::from_json(r#"{"network": "mainnet", "root_path": "m/84'/0'"}"#)
                .expect("config");
        assert_eq!(config.network, Network::Liquid);
        assert_eq!(config.fee_rate, DEFAULT_FEE_RATE);
        assert!(!config.is_multisig());
        assert_eq!(
            config.genesis_hash().expect("genesis"),
            Network::Liquid.genesis_hash()
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            WalletConfig::from_json(r#"{"network": "bitcoin", "root_path": "m/84'/0'"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WalletConfig::from_json(r#"{"network": "liquid", "root_path": ""}"#),
            Err(Error::MissingRootPath)
        ));
        assert!(matches!(
            WalletConfig::from_json(
                r#"{"network": "liquid", "root_path": "m/84'/0'", "fee_rate": 0}"#
            ),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WalletConfig::from_json(
                r#"{"network": "liquid", "root_path": "m/84'/0'", "genesis_block_hash": "xyz"}"#
            ),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn genesis_override_wins() {
        let mut config = WalletConfig::new(Network::LiquidRegtest, TEST_SINGLE_SIG_ROOT);
        let testnet = Network::LiquidTestnet.genesis_hash();
        config.genesis_block_hash = Some(testnet.to_string());
        assert_eq!(config.genesis_hash().expect("genesis"), testnet);
    }

    #[test]
    fn policy_follows_cosigners() {
        let single = WalletConfig::new(Network::LiquidTestnet, TEST_SINGLE_SIG_ROOT);
        assert!(matches!(single.open(TEST_MNEMONIC), Ok(Wallet::Single(_))));

        let mut multi = WalletConfig::new(Network::LiquidTestnet, TEST_MULTI_SIG_ROOT);
        multi.cosigner_xpubs = vec![TEST_COSIGNER_XPUB.to_string()];
        assert!(matches!(multi.open(TEST_MNEMONIC), Ok(Wallet::Multi(_))));
        assert!(matches!(multi.create(), Ok(Wallet::Multi(_))));
    }

    #[test]
    fn json_round_trip() {
        let mut config = WalletConfig::new(Network::LiquidTestnet, TEST_MULTI_SIG_ROOT);
        config.cosigner_xpubs = vec![TEST_COSIGNER_XPUB.to_string()];
        config.fee_rate = 250;
        let json = config.to_json().expect("serialize");
        assert_eq!(WalletConfig::from_json(&json).expect("deserialize"), config);
    }
}
