use bip39::Mnemonic;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub const DEFAULT_ENTROPY_BITS: u32 = 256;

/// Generate a fresh BIP39 phrase. 256 bits of entropy give 24 words, 128 give 12.
pub fn new_mnemonic(entropy_bits: Option<u32>) -> Result<Zeroizing<String>> {
    let bits = entropy_bits.unwrap_or(DEFAULT_ENTROPY_BITS);
    if bits != 128 && bits != 256 {
        return Err(Error::InvalidEntropySize);
    }

    let mut entropy = Zeroizing::new(vec![0u8; (bits / 8) as usize]);
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy).map_err(|_| Error::InvalidEntropySize)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

pub fn validate_mnemonic(phrase: &str) -> Result<Mnemonic> {
    if phrase.trim().is_empty() {
        return Err(Error::MissingMnemonic);
    }
    phrase
        .parse::<Mnemonic>()
        .map_err(|_| Error::InvalidMnemonic)
}

/// BIP39 seed with an empty passphrase.
pub(crate) fn seed_from_mnemonic(phrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = validate_mnemonic(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_24_words() {
        let phrase = new_mnemonic(None).expect("mnemonic");
        assert_eq!(phrase.split_whitespace().count(), 24);
        validate_mnemonic(&phrase).expect("generated phrase is valid");
    }

    #[test]
    fn entropy_128_is_12_words() {
        let phrase = new_mnemonic(Some(128)).expect("mnemonic");
        assert_eq!(phrase.split_whitespace().count(), 12);
    }

    #[test]
    fn rejects_other_entropy_sizes() {
        assert!(matches!(new_mnemonic(Some(192)), Err(Error::InvalidEntropySize)));
        assert!(matches!(new_mnemonic(Some(0)), Err(Error::InvalidEntropySize)));
    }

    #[test]
    fn validation_distinguishes_missing_from_invalid() {
        assert!(matches!(validate_mnemonic(""), Err(Error::MissingMnemonic)));
        assert!(matches!(
            validate_mnemonic("legal winner thank year wave sausage worth useful legal winner thank zzzz"),
            Err(Error::InvalidMnemonic)
        ));
    }
}
