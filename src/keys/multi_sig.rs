use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use derivation_path::DerivationPath;
use lwk_wollet::elements::bitcoin::bip32::Xpub;
use lwk_wollet::elements::secp256k1_zkp::{PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements_miniscript::slip77::MasterBlindingKey;
use lwk_wollet::elements::Script;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{KeyHierarchy, Redacted, SigningKeys};
use crate::address::{self, DerivedAddress};
use crate::error::{Error, Result};
use crate::mnemonic;
use crate::network::Network;

const ROOT_PATH_LEN: usize = 4;
const BLINDING_KEY_PREFIX: &[u8] = b"blinding_key";

/// Cosigner wallet locking funds with an M-of-M P2WSH multisig.
///
/// The root path has 4 hardened elements (e.g. `m/48'/1776'/0'/2'`); its xprv
/// is the account key and keys live at `branch/index` below it. The blinding
/// master key is shared by all cosigners:
/// `slip77_from_seed(sha256("blinding_key" || xor(chain codes)))`.
#[derive(Clone, PartialEq, Eq)]
pub struct MultiSigWallet {
    mnemonic: Option<Zeroizing<String>>,
    signing_master_key: Zeroizing<Vec<u8>>,
    blinding_master_key: Zeroizing<Vec<u8>>,
    xpubs: Vec<String>,
}

impl MultiSigWallet {
    /// Create a wallet from a fresh 24-word mnemonic.
    pub fn new(root_path: &str, xpubs: &[String]) -> Result<Self> {
        let root = parse_root(root_path)?;
        validate_xpubs(xpubs)?;
        let phrase = mnemonic::new_mnemonic(None)?;
        Self::build(phrase, &root, xpubs)
    }

    /// Restore a wallet from an existing mnemonic and the cosigners' xpubs.
    pub fn from_mnemonic(phrase: &str, root_path: &str, xpubs: &[String]) -> Result<Self> {
        let root = parse_root(root_path)?;
        mnemonic::validate_mnemonic(phrase)?;
        validate_xpubs(xpubs)?;
        Self::build(Zeroizing::new(phrase.to_string()), &root, xpubs)
    }

    fn build(phrase: Zeroizing<String>, root: &DerivationPath, cosigners: &[String]) -> Result<Self> {
        let seed = mnemonic::seed_from_mnemonic(&phrase)?;
        let signing_master_key = super::signing_master_key(seed.as_ref(), root)?;
        let own_xpub = own_xpub(&signing_master_key)?;

        let mut xpubs: Vec<String> = Vec::with_capacity(cosigners.len() + 1);
        for xpub in cosigners.iter().chain(std::iter::once(&own_xpub)) {
            if !xpubs.contains(xpub) {
                xpubs.push(xpub.clone());
            }
        }

        let blinding_master_key = shared_blinding_master_key(&xpubs)?;
        log::debug!(
            "multi-sig wallet ready at root {root} with {} cosigners",
            xpubs.len()
        );
        Ok(Self {
            mnemonic: Some(phrase),
            signing_master_key,
            blinding_master_key,
            xpubs,
        })
    }

    pub fn mnemonic(&self) -> Result<&str> {
        self.validate()?;
        self.mnemonic
            .as_deref()
            .map(String::as_str)
            .ok_or(Error::MissingMnemonic)
    }

    pub fn forget_mnemonic(&mut self) {
        self.mnemonic = None;
    }

    /// All cosigner xpubs, this wallet's included.
    pub fn xpubs(&self) -> &[String] {
        &self.xpubs
    }

    /// Base58 xprv at the root path.
    pub fn account_extended_private_key(&self) -> Result<Zeroizing<String>> {
        self.validate()?;
        let mut xprv = super::decode_xpriv(&self.signing_master_key)?;
        let encoded = Zeroizing::new(xprv.to_string());
        xprv.private_key.non_secure_erase();
        Ok(encoded)
    }

    /// Base58 xpub at the root path, the one shared with cosigners.
    pub fn account_extended_public_key(&self) -> Result<String> {
        self.validate()?;
        own_xpub(&self.signing_master_key)
    }

    pub fn master_blinding_key_hex(&self) -> Result<String> {
        self.validate()?;
        Ok(hex::encode(self.blinding_master_key.as_slice()))
    }

    /// Confidential M-of-M P2WSH address at `branch/index`.
    pub fn derive_confidential_address(&self, path: &str, network: Network) -> Result<DerivedAddress> {
        KeyHierarchy::derive_address(self, path, network, true)
    }
}

impl KeyHierarchy for MultiSigWallet {
    fn validate(&self) -> Result<()> {
        if self.signing_master_key.is_empty() {
            return Err(Error::WalletNotInitialized);
        }
        if self.xpubs.is_empty() {
            return Err(Error::MissingCosignerXpubs);
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

        // Sorting by base58 string gives every cosigner the same key order.
        let sorted: BTreeSet<&String> = self.xpubs.iter().collect();
        let mut public_keys = Vec::with_capacity(sorted.len());
        for xpub in sorted {
            let xpub = Xpub::from_str(xpub).map_err(|_| Error::InvalidXpub)?;
            public_keys.push(super::derive_public(&xpub, &path)?);
        }

        Ok(SigningKeys::new(secret, public_keys))
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
        let witness_script = address::multisig_script(keys.public_keys().len(), keys.public_keys());
        let unconfidential = address::p2wsh(&witness_script, None, network);
        if !confidential {
            return Ok(unconfidential);
        }

        let (_, blinding_pubkey) = self.derive_blinding_key_pair(&unconfidential.script_pubkey)?;
        Ok(address::p2wsh(&witness_script, Some(blinding_pubkey), network))
    }

    fn master_blinding_key(&self) -> Result<MasterBlindingKey> {
        self.validate()?;
        super::master_blinding_key_from_bytes(&self.blinding_master_key)
    }
}

impl fmt::Debug for MultiSigWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSigWallet")
            .field("xpubs", &self.xpubs)
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
    let root = DerivationPath::parse(root_path)?;
    if root.len() != ROOT_PATH_LEN || !root.all_hardened() {
        return Err(Error::InvalidRootPath {
            expected: ROOT_PATH_LEN,
        });
    }
    Ok(root)
}

fn validate_xpubs(xpubs: &[String]) -> Result<()> {
    if xpubs.is_empty() {
        return Err(Error::MissingCosignerXpubs);
    }
    for xpub in xpubs {
        Xpub::from_str(xpub).map_err(|_| Error::InvalidXpub)?;
    }
    Ok(())
}

fn own_xpub(signing_master_key: &[u8]) -> Result<String> {
    let secp = Secp256k1::new();
    let mut xprv = super::decode_xpriv(signing_master_key)?;
    let xpub = Xpub::from_priv(&secp, &xprv);
    xprv.private_key.non_secure_erase();
    Ok(xpub.to_string())
}

/// `slip77_from_seed(sha256("blinding_key" || xor(chain codes)))`.
fn shared_blinding_master_key(xpubs: &[String]) -> Result<Zeroizing<Vec<u8>>> {
    let mut xor = [0u8; 32];
    for xpub in xpubs {
        let xpub = Xpub::from_str(xpub).map_err(|_| Error::InvalidXpub)?;
        // Bytes 13..45 of the BIP32 serialization hold the chain code.
        let encoded = xpub.encode();
        for (acc, byte) in xor.iter_mut().zip(&encoded[13..45]) {
            *acc ^= byte;
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(BLINDING_KEY_PREFIX);
    hasher.update(xor);
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(hasher.finalize().into());

    let master = MasterBlindingKey::from_seed(seed.as_slice());
    Ok(Zeroizing::new(master.as_bytes().to_vec()))
}

/// Signing paths are `branch/index`, both unhardened.
fn check_signing_path(path: &str) -> Result<DerivationPath> {
    let path = DerivationPath::parse(path)?;
    if path.len() != 2 {
        return Err(Error::InvalidMultiSigPathLength);
    }
    if path.is_hardened(0) || path.is_hardened(1) {
        return Err(Error::HardenedMultiSigPath);
    }
    Ok(path)
}
