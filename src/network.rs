use std::str::FromStr;

use lwk_wollet::ElementsNetwork;
use lwk_wollet::elements::{AddressParams, AssetId, BlockHash};
use serde::{Deserialize, Serialize};

const LIQUID_GENESIS: &str = "1466275836220db2944ca059a3a10ef6fd2ea684b0688d2c379296888a206003";
const LIQUID_TESTNET_GENESIS: &str =
    "a771da8e52ee6ad581ed1e9a99825e5b3b7992225534eaa2ae23244fe26ab1c1";
const LIQUID_REGTEST_GENESIS: &str =
    "00902a6b70c2ca83b5d9c815d96a0e2f4202179316970d14ea1847dae5b1ca21";

/// Network variants for Liquid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Liquid,
    LiquidTestnet,
    LiquidRegtest,
}

impl Network {
    pub fn into_lwk(self) -> ElementsNetwork {
        match self {
            Network::Liquid => ElementsNetwork::Liquid,
            Network::LiquidTestnet => ElementsNetwork::LiquidTestnet,
            Network::LiquidRegtest => ElementsNetwork::default_regtest(),
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Liquid)
    }

    pub fn address_params(self) -> &'static AddressParams {
        match self {
            Network::Liquid => &AddressParams::LIQUID,
            Network::LiquidTestnet => &AddressParams::LIQUID_TESTNET,
            Network::LiquidRegtest => &AddressParams::ELEMENTS,
        }
    }

    /// Hash of the genesis block, committed to by taproot sighashes.
    pub fn genesis_hash(self) -> BlockHash {
        let hex = match self {
            Network::Liquid => LIQUID_GENESIS,
            Network::LiquidTestnet => LIQUID_TESTNET_GENESIS,
            Network::LiquidRegtest => LIQUID_REGTEST_GENESIS,
        };
        BlockHash::from_str(hex).expect("genesis hash constants are valid hex")
    }

    /// The network's fee asset (L-BTC).
    pub fn policy_asset(self) -> AssetId {
        self.into_lwk().policy_asset()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Liquid => "mainnet",
            Network::LiquidTestnet => "testnet",
            Network::LiquidRegtest => "regtest",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "liquid" => Ok(Network::Liquid),
            "testnet" | "liquid-testnet" | "liquidtestnet" => Ok(Network::LiquidTestnet),
            "regtest" | "liquid-regtest" | "liquidregtest" => Ok(Network::LiquidRegtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("liquid".parse::<Network>(), Ok(Network::Liquid));
        assert_eq!("Testnet".parse::<Network>(), Ok(Network::LiquidTestnet));
        assert_eq!("liquid-regtest".parse::<Network>(), Ok(Network::LiquidRegtest));
        assert!("bitcoin".parse::<Network>().is_err());
    }

    #[test]
    fn genesis_hashes_render_in_display_order() {
        assert_eq!(Network::Liquid.genesis_hash().to_string(), LIQUID_GENESIS);
        assert_eq!(
            Network::LiquidTestnet.genesis_hash().to_string(),
            LIQUID_TESTNET_GENESIS
        );
        assert_eq!(
            Network::LiquidRegtest.genesis_hash().to_string(),
            LIQUID_REGTEST_GENESIS
        );
    }

    #[test]
    fn serde_is_lowercase() {
        let network: Network = serde_json::from_str("\"liquidtestnet\"").expect("deserialize");
        assert_eq!(network, Network::LiquidTestnet);
        assert_eq!(
            serde_json::to_string(&Network::Liquid).expect("serialize"),
            "\"liquid\""
        );
    }
}
