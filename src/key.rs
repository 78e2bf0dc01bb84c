//! The 64-bit one-time-password value and its hex form.

use core::fmt;

use cow_utils::CowUtils;
use hex::FromHex;
use subtle::{Choice, ConstantTimeEq};

use crate::error::DecodeError;

/// An 8-byte one-time-password value.
///
/// A `Key` is either the current OTP itself or the input/output of the
/// one-way [`fold`](crate::chain::fold) step. Keys are never mutated in
/// place; every operation derives a new one.
///
/// The derived `PartialEq` is for tests and bookkeeping. Authentication
/// decisions must compare via [`ConstantTimeEq`] so timing cannot leak
/// how much of a guess matched.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; 8]);

impl Key {
    /// Wraps raw key bytes.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// The key bytes, low-order byte of the first folded word first.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Sixteen uppercase hex digits: bytes in order, high nibble first.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Hex form grouped in fours for display, e.g. `"C848 666B 6435 0A93"`.
    pub fn to_hex_grouped(&self) -> String {
        let h = self.to_hex();
        format!("{} {} {} {}", &h[0..4], &h[4..8], &h[8..12], &h[12..16])
    }

    /// Parses the hex form.
    ///
    /// ASCII spaces and tabs between digit groups are ignored; after that
    /// the input must be exactly sixteen hex digits.
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let s = s.cow_replace(" ", "");
        let s = s.cow_replace("\t", "");
        let bytes = <[u8; 8]>::from_hex(s.as_ref()).map_err(|_| DecodeError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl ConstantTimeEq for Key {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_grouped())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_hex())
    }
}
