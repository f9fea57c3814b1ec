use std::fmt;

use derivation_path::{DerivationPath, HARDENED_OFFSET};
use lwk_wollet::elements::bitcoin::bip32::{ChildNumber, Xpub};
use lwk_wollet::elements::secp256k1_zkp::{PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements_miniscript::slip77::MasterBlindingKey;
use lwk_wollet::elements::Script;
use zeroize::Zeroizing;

use super::{KeyHierarchy, Redacted, SigningKeys};
use crate::address::{self, DerivedAddress};
use crate::error::{Error, Result};
use crate::mnemonic;
use crate::network::Network;

/// Single-signer HD wallet.
///
/// The signing master key is the xprv at the 2-element hardened root path
/// (`m/purpose'/coin_type'`). Signing keys live at `account'/branch/index`
/// below it. The blinding master key is SLIP-77 derived straight from the seed.
#[derive(Clone, PartialEq, Eq)]
pub struct SingleSigWallet {
    mnemonic: Option<Zeroizing<String>>,
    root_path: DerivationPath,
    signing_master_key: Zeroizing<Vec<u8>>,
    blinding_master_key: Zeroizing<Vec<u8>>,
}

impl SingleSigWallet {
    /// Create a wallet from a fresh 24-word mnemonic.
    pub fn new(root_path: &str) -> Result<Self> {
        let root = parse_root(root_path)?;
        let phrase = mnemonic::new_mnemonic(None)?;
        Self::build(phrase, root)
    }

    /// Restore a wallet from an existing mnemonic.
    pub fn from_mnemonic(phrase: &str, root_path: &str) -> Result<Self> {
        let root = parse_root(root_path)?;
        mnemonic::validate_mnemonic(phrase)?;
        Self::build(Zeroizing::new(phrase.to_string()), root)
    }

    fn build(phrase: Zeroizing<String>, root: DerivationPath) -> Result<Self> {
        let seed = mnemonic::seed_from_mnemonic(&phrase)?;
        let signing_master_key = super::signing_master_key(seed.as_ref(), &root)?;
        let blinding = MasterBlindingKey::from_seed(seed.as_ref());
        let blinding_master_key = Zeroizing::new(blinding.as_bytes().to_vec());

        log::debug!("single-sig wallet ready at root {root}");
        Ok(Self {
            mnemonic: Some(phrase),
            root_path: root,
            signing_master_key,
            blinding_master_key,
        })
    }

    pub fn mnemonic(&self) -> Result<&str> {
        self.validate()?;
        self.mnemonic
            .as_deref()
            .map(String::as_str)
            .ok_or(Error::MissingMnemonic)
    }

    /// Drop the mnemonic while keeping the derived keys.
    pub fn forget_mnemonic(&mut self) {
        self.mnemonic = None;
    }

    pub fn root_path(&self) -> &DerivationPath {
        &self.root_path
    }

    /// Base58 xprv of `account'` below the root path.
    pub fn account_extended_private_key(&self, account: u32) -> Result<Zeroizing<String>> {
        self.validate()?;
        let master = super::decode_xpriv(&self.signing_master_key)?;
        let secp = Secp256k1::new();
        let mut xprv = master
            .derive_priv(&secp, &[account_child(account)?])
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        let encoded = Zeroizing::new(xprv.to_string());
        xprv.private_key.non_secure_erase();
        Ok(encoded)
    }

    /// Base58 xpub of `account'` below the root path.
    pub fn account_extended_public_key(&self, account: u32) -> Result<String> {
        self.validate()?;
        let master = super::decode_xpriv(&self.signing_master_key)?;
        let secp = Secp256k1::new();
        let mut xprv = master
            .derive_priv(&secp, &[account_child(account)?])
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        let xpub = Xpub::from_priv(&secp, &xprv);
        xprv.private_key.non_secure_erase();
        Ok(xpub.to_string())
    }

    pub fn master_blinding_key_hex(&self) -> Result<String> {
        self.validate()?;
        Ok(hex::encode(self.blinding_master_key.as_slice()))
    }

    /// Derive a P2WPKH address. Confidential unless `unconfidential` is set.
    pub fn derive_address(
        &self,
        path: &str,
        network: Network,
        unconfidential: bool,
    ) -> Result<DerivedAddress> {
        KeyHierarchy::derive_address(self, path, network, !unconfidential)
    }
}

impl KeyHierarchy for SingleSigWallet {
    fn validate(&self) -> Result<()> {
        if self.signing_master_key.is_empty() {
            return Err(Error::WalletNotInitialized);
        }
        Ok(())
    }

    fn check_signing_path(&self, path: &str) -> Result<DerivationPath> {
        check_signing_path(path)
    }

    fn derive_signing_keys(&self, path: &str) -> Result<SigningKeys> {
        let path = check_signing_path(path)?;
        self.validate()?;

        let master = super::decode_xpriv(&self.signing_master_key)?;
        let secret = super::derive_secret(&master, &path)?;
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        Ok(SigningKeys::new(secret, vec![public]))
    }

    fn derive_blinding_key_pair(&self, script: &Script) -> Result<(SecretKey, PublicKey)> {
        if script.is_empty() {
            return Err(Error::MissingOutputScript);
        }
        self.validate()?;
        super::blinding_key_pair(&self.master_blinding_key()?, script)
    }

    fn derive_address(
        &self,
        path: &str,
        network: Network,
        confidential: bool,
    ) -> Result<DerivedAddress> {
        let keys = self.derive_signing_keys(path)?;
        let unconfidential = address::p2wpkh(&keys.public_key(), None, network);
        if !confidential {
            return Ok(unconfidential);
        }

        let (_, blinding_pubkey) = self.derive_blinding_key_pair(&unconfidential.script_pubkey)?;
        Ok(address::p2wpkh(&keys.public_key(), Some(blinding_pubkey), network))
    }

    fn master_blinding_key(&self) -> Result<MasterBlindingKey> {
        self.validate()?;
        super::master_blinding_key_from_bytes(&self.blinding_master_key)
    }
}

impl fmt::Debug for SingleSigWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleSigWallet")
            .field("root_path", &self.root_path.to_string())
            .field("mnemonic", &Redacted)
            .field("signing_master_key", &Redacted)
            .field("blinding_master_key", &Redacted)
            .finish()
    }
}

fn parse_root(root_path: &str) -> Result<DerivationPath> {
    if root_path.is_empty() {
        return Err(Error::MissingRootPath);
    }
    Ok(DerivationPath::parse_root(root_path)?)
}

fn account_child(account: u32) -> Result<ChildNumber> {
    if account >= HARDENED_OFFSET {
        return Err(Error::InvalidAccountIndex);
    }
    ChildNumber::from_hardened_idx(account).map_err(|_| Error::InvalidAccountIndex)
}

/// Signing paths are `account'/branch/index` relative to the root.
fn check_signing_path(path: &str) -> Result<DerivationPath> {
    let path = DerivationPath::parse(path)?;
    if path.len() != 3 {
        return Err(Error::InvalidSingleSigPathLength);
    }
    if !path.is_hardened(0) {
        return Err(Error::UnhardenedAccount);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_MNEMONIC, TEST_SINGLE_SIG_ROOT};

    fn wallet() -> SingleSigWallet {
        SingleSigWallet::from_mnemonic(TEST_MNEMONIC, TEST_SINGLE_SIG_ROOT).expect("wallet")
    }

    #[test]
    fn rejects_bad_construction_args() {
        assert!(matches!(
            SingleSigWallet::from_mnemonic(TEST_MNEMONIC, ""),
            Err(Error::MissingRootPath)
        ));
        assert!(matches!(
            SingleSigWallet::from_mnemonic(TEST_MNEMONIC, "m/84'/0'/0'"),
            Err(Error::Path(derivation_path::Error::InvalidRootLength))
        ));
        assert!(matches!(
            SingleSigWallet::from_mnemonic("", TEST_SINGLE_SIG_ROOT),
            Err(Error::MissingMnemonic)
        ));
        assert!(matches!(
            SingleSigWallet::from_mnemonic("not a mnemonic", TEST_SINGLE_SIG_ROOT),
            Err(Error::InvalidMnemonic)
        ));
    }

    #[test]
    fn signing_path_shape_is_enforced() {
        let wallet = wallet();
        assert!(matches!(
            wallet.derive_signing_keys("0'/0"),
            Err(Error::InvalidSingleSigPathLength)
        ));
        assert!(matches!(
            wallet.derive_signing_keys("0/0/0"),
            Err(Error::UnhardenedAccount)
        ));
        assert!(matches!(
            wallet.derive_signing_keys(""),
            Err(Error::Path(derivation_path::Error::Missing))
        ));
    }

    #[test]
    fn account_index_must_fit_hardened_range() {
        let wallet = wallet();
        assert!(matches!(
            wallet.account_extended_public_key(HARDENED_OFFSET),
            Err(Error::InvalidAccountIndex)
        ));
        let xpub = wallet.account_extended_public_key(0).expect("xpub");
        assert!(xpub.starts_with("xpub"));
        let xprv = wallet.account_extended_private_key(0).expect("xprv");
        assert!(xprv.starts_with("xprv"));
    }

    #[test]
    fn blinding_key_requires_script() {
        let wallet = wallet();
        assert!(matches!(
            wallet.derive_blinding_key_pair(&Script::new()),
            Err(Error::MissingOutputScript)
        ));
    }

    #[test]
    fn forgetting_mnemonic_keeps_keys() {
        let mut wallet = wallet();
        let before = wallet.derive_signing_keys("0'/0/0").expect("keys").public_key();
        wallet.forget_mnemonic();
        assert!(matches!(wallet.mnemonic(), Err(Error::MissingMnemonic)));
        let after = wallet.derive_signing_keys("0'/0/0").expect("keys").public_key();
        assert_eq!(before, after);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", wallet());
        assert!(!rendered.contains("legal"));
        assert!(rendered.contains("<redacted>"));
    }
}
