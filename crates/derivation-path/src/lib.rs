//! BIP32 derivation paths as used by Ocean wallets.
//!
//! Paths are written either absolute (`m/84'/1776'/0'/0/3`) or relative
//! (`0'/0/3`). Each element may be decimal or `0x`-prefixed hex and may carry
//! a trailing `'` to mark it hardened. Whitespace around elements is ignored.

pub mod error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

/// First hardened child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Ordered list of child indexes. Values at or above [`HARDENED_OFFSET`] are
/// hardened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// Parse an absolute or relative path.
    pub fn parse(path: &str) -> Result<Self> {
        parse_path(path, false)
    }

    /// Parse a wallet root path: absolute, exactly `m/purpose'/coin_type'`.
    pub fn parse_root(path: &str) -> Result<Self> {
        let parsed = parse_path(path, true)?;
        if parsed.len() != 2 {
            return Err(Error::InvalidRootLength);
        }
        if !parsed.iter().all(is_hardened) {
            return Err(Error::InvalidRootPath);
        }
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Whether the element at `index` is hardened. Out of range is `false`.
    pub fn is_hardened(&self, index: usize) -> bool {
        self.0.get(index).copied().is_some_and(is_hardened)
    }

    /// True when every element is hardened.
    pub fn all_hardened(&self) -> bool {
        self.iter().all(is_hardened)
    }
}

fn is_hardened(step: u32) -> bool {
    step >= HARDENED_OFFSET
}

impl From<Vec<u32>> for DerivationPath {
    fn from(steps: Vec<u32>) -> Self {
        DerivationPath(steps)
    }
}

impl From<DerivationPath> for Vec<u32> {
    fn from(path: DerivationPath) -> Self {
        path.0
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DerivationPath::parse(s)
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        DerivationPath::parse(&s)
    }
}

impl From<DerivationPath> for String {
    fn from(path: DerivationPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str("m")?;
        for step in self.iter() {
            if is_hardened(step) {
                write!(f, "/{}'", step - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{step}")?;
            }
        }
        Ok(())
    }
}

fn parse_path(path: &str, require_absolute: bool) -> Result<DerivationPath> {
    if path.is_empty() {
        return Err(Error::Missing);
    }

    let mut elems: Vec<&str> = path.split('/').collect();
    if elems.len() > 1 && elems[0].is_empty() && elems[1..].iter().all(|e| !e.is_empty()) {
        return Err(Error::MissingAbsoluteMarker);
    }
    if elems.iter().any(|e| e.is_empty()) {
        return Err(Error::Malformed);
    }
    let is_absolute = elems[0].trim() == "m";
    if require_absolute && !is_absolute {
        return Err(Error::NotAbsolute);
    }
    // The `m` marker counts towards the minimum, so `m/0` is fine but `0` is not.
    if elems.len() < 2 {
        return Err(Error::Malformed);
    }
    if is_absolute {
        elems.remove(0);
    }

    elems
        .into_iter()
        .map(parse_elem)
        .collect::<Result<Vec<_>>>()
        .map(DerivationPath)
}

fn parse_elem(raw: &str) -> Result<u32> {
    let mut elem = raw.trim();
    let mut offset = 0;
    if let Some(stripped) = elem.strip_suffix('\'') {
        offset = HARDENED_OFFSET;
        elem = stripped.trim();
    }

    let value = parse_number(elem).ok_or_else(|| Error::InvalidElem(elem.to_string()))?;
    let max = u32::MAX - offset;
    if value < 0 || value > i128::from(max) {
        let value = value.to_string();
        return Err(if offset == 0 {
            Error::OutOfRange { value, max }
        } else {
            Error::OutOfHardenedRange { value, max }
        });
    }

    Ok(offset + value as u32)
}

fn parse_number(s: &str) -> Option<i128> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i128::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<i128>().ok()?
        }
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}
