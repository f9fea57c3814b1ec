pub use lwk_wollet::elements;

pub mod address;
pub mod config;
pub mod error;
pub mod estimation;
pub mod input;
pub mod keys;
pub mod mnemonic;
pub mod network;
pub mod output;
pub mod pset;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Core types
pub use config::WalletConfig;
pub use error::{Error, Result};
pub use input::Input;
pub use network::Network;
pub use output::Output;

// Key hierarchies
pub use address::DerivedAddress;
pub use keys::{KeyHierarchy, MultiSigWallet, SigningKeys, SingleSigWallet, Wallet};
pub use mnemonic::{new_mnemonic, validate_mnemonic};

// Path parsing
pub use derivation_path::{self, DerivationPath};

// Fee estimation
pub use estimation::{ScriptType, estimate_fees, estimate_tx_size};

// PSET pipeline
pub use pset::{
    blind_with_master_key, blind_with_owned_inputs, create_pset, finalize_and_extract,
    finalize_and_extract_for, sign_pset, sign_taproot, sign_transaction, update_pset,
};

// Re-export LWK for app-layer use
pub use lwk_wollet;
