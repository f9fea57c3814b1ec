//! HD key hierarchies.
//!
//! Two wallet policies share the [`KeyHierarchy`] capability set:
//! [`SingleSigWallet`] derives one key per `account'/branch/index` path and a
//! seed-based SLIP-77 blinding key. [`MultiSigWallet`] derives a key per
//! `branch/index` path for every cosigner and a blinding key shared by all of
//! them, computed from their chain codes.

pub mod multi_sig;
pub mod single_sig;

use std::fmt;

use derivation_path::DerivationPath;
use lwk_wollet::elements::bitcoin::NetworkKind;
use lwk_wollet::elements::bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use lwk_wollet::elements::secp256k1_zkp::{self, PublicKey, Secp256k1, SecretKey};
use lwk_wollet::elements_miniscript::slip77::MasterBlindingKey;
use lwk_wollet::elements::Script;
use zeroize::Zeroizing;

use crate::address::DerivedAddress;
use crate::error::{Error, Result};
use crate::network::Network;

pub use multi_sig::MultiSigWallet;
pub use single_sig::SingleSigWallet;

/// Operations every wallet policy provides.
pub trait KeyHierarchy {
    /// Fails with [`Error::WalletNotInitialized`] when key material is missing.
    fn validate(&self) -> Result<()>;

    /// Parse `path` and check it has the shape this policy signs with.
    fn check_signing_path(&self, path: &str) -> Result<DerivationPath>;

    /// Derive the private key at `path` together with the public keys that
    /// lock scripts derived at the same path.
    fn derive_signing_keys(&self, path: &str) -> Result<SigningKeys>;

    /// SLIP-77 blinding key pair for an output script.
    fn derive_blinding_key_pair(&self, script: &Script) -> Result<(SecretKey, PublicKey)>;

    fn derive_address(&self, path: &str, network: Network, confidential: bool)
    -> Result<DerivedAddress>;

    fn master_blinding_key(&self) -> Result<MasterBlindingKey>;
}

/// A derived private key and the public keys that go with it.
///
/// The secret is erased when the value is dropped.
pub struct SigningKeys {
    secret: SecretKey,
    public_key: PublicKey,
    public_keys: Vec<PublicKey>,
}

impl SigningKeys {
    pub(crate) fn new(secret: SecretKey, public_keys: Vec<PublicKey>) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret);
        Self {
            secret,
            public_key,
            public_keys,
        }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// This wallet's public key.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Keys locking the script in canonical order. Single-sig wallets return
    /// only their own key.
    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }
}

impl Drop for SigningKeys {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("public_key", &self.public_key)
            .field("public_keys", &self.public_keys)
            .finish_non_exhaustive()
    }
}

/// A wallet whose policy was chosen at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wallet {
    Single(SingleSigWallet),
    Multi(MultiSigWallet),
}

impl KeyHierarchy for Wallet {
    fn validate(&self) -> Result<()> {
        match self {
            Wallet::Single(w) => w.validate(),
            Wallet::Multi(w) => w.validate(),
        }
    }

    fn check_signing_path(&self, path: &str) -> Result<DerivationPath> {
        match self {
            Wallet::Single(w) => w.check_signing_path(path),
            Wallet::Multi(w) => w.check_signing_path(path),
        }
    }

    fn derive_signing_keys(&self, path: &str) -> Result<SigningKeys> {
        match self {
            Wallet::Single(w) => w.derive_signing_keys(path),
            Wallet::Multi(w) => w.derive_signing_keys(path),
        }
    }

    fn derive_blinding_key_pair(&self, script: &Script) -> Result<(SecretKey, PublicKey)> {
        match self {
            Wallet::Single(w) => w.derive_blinding_key_pair(script),
            Wallet::Multi(w) => w.derive_blinding_key_pair(script),
        }
    }

    fn derive_address(
        &self,
        path: &str,
        network: Network,
        confidential: bool,
    ) -> Result<DerivedAddress> {
        match self {
            Wallet::Single(w) => KeyHierarchy::derive_address(w, path, network, confidential),
            Wallet::Multi(w) => KeyHierarchy::derive_address(w, path, network, confidential),
        }
    }

    fn master_blinding_key(&self) -> Result<MasterBlindingKey> {
        match self {
            Wallet::Single(w) => w.master_blinding_key(),
            Wallet::Multi(w) => w.master_blinding_key(),
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────

pub(crate) fn child_numbers(path: &DerivationPath) -> Vec<ChildNumber> {
    path.iter().map(ChildNumber::from).collect()
}

/// Walk `root` from the BIP32 master of `seed` and return the serialized xprv.
pub(crate) fn signing_master_key(seed: &[u8], root: &DerivationPath) -> Result<Zeroizing<Vec<u8>>> {
    let secp = Secp256k1::new();
    let mut master = Xpriv::new_master(NetworkKind::Main, seed)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let mut account = master
        .derive_priv(&secp, &child_numbers(root))
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    master.private_key.non_secure_erase();

    let encoded = Zeroizing::new(account.encode().to_vec());
    account.private_key.non_secure_erase();
    Ok(encoded)
}

pub(crate) fn decode_xpriv(bytes: &[u8]) -> Result<Xpriv> {
    if bytes.is_empty() {
        return Err(Error::WalletNotInitialized);
    }
    Xpriv::decode(bytes).map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Derive the child secret key at `path` below `xpriv`.
pub(crate) fn derive_secret(xpriv: &Xpriv, path: &DerivationPath) -> Result<SecretKey> {
    let secp = Secp256k1::new();
    let mut child = xpriv
        .derive_priv(&secp, &child_numbers(path))
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let secret = secp256k1_zkp::SecretKey::from_slice(&child.private_key.secret_bytes())
        .map_err(|e| Error::KeyDerivation(e.to_string()));
    child.private_key.non_secure_erase();
    secret
}

pub(crate) fn derive_public(xpub: &Xpub, path: &DerivationPath) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    let child = xpub
        .derive_pub(&secp, &child_numbers(path))
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    PublicKey::from_slice(&child.public_key.serialize())
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

pub(crate) fn master_blinding_key_from_bytes(bytes: &[u8]) -> Result<MasterBlindingKey> {
    if bytes.is_empty() {
        return Err(Error::WalletNotInitialized);
    }
    let secret = SecretKey::from_slice(bytes).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(MasterBlindingKey::from(secret.secret_bytes()))
}

pub(crate) fn blinding_key_pair(
    master: &MasterBlindingKey,
    script: &Script,
) -> Result<(SecretKey, PublicKey)> {
    if script.is_empty() {
        return Err(Error::MissingOutputScript);
    }
    let secp = Secp256k1::new();
    let secret = master.blinding_private_key(script);
    let public = PublicKey::from_secret_key(&secp, &secret);
    Ok((secret, public))
}

/// Debug helper that never prints key material.
pub(crate) struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
