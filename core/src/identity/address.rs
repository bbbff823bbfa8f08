//! # Addresses
//!
//! The 20-byte account identifier used for both vault addresses and owner
//! identities. Input is accepted as exactly 40 hex digits, with or without
//! a `0x` prefix, in any letter case. Anything else is rejected locally —
//! malformed input must never reach the vault collaborator.
//!
//! Internally an [`Address`] is the raw bytes, so two inputs that differ
//! only in case or prefix compare equal. The canonical display form is
//! `0x` followed by lower-case hex.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{ADDRESS_BYTE_LENGTH, ADDRESS_HEX_LENGTH, HEX_PREFIX};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The input, after stripping an optional `0x` prefix, is not exactly
    /// 40 characters long.
    #[error("invalid address length: expected {expected} hex digits, got {got}")]
    InvalidLength {
        /// Required number of hex digits.
        expected: usize,
        /// Number of characters actually supplied.
        got: usize,
    },

    /// The input contains a character outside `[0-9a-fA-F]`.
    #[error("invalid address: '{input}' is not a hex-encoded address")]
    NotHex {
        /// The offending input, as supplied by the caller.
        input: String,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or vault address.
///
/// Equality and hashing operate on the raw bytes, so `0xAB...` and `ab...`
/// refer to the same address. Display always emits the canonical
/// lower-cased, `0x`-prefixed form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTE_LENGTH]);

impl Address {
    /// Wraps raw address bytes. No validation is needed — any 20 bytes
    /// form a structurally valid address.
    pub fn from_bytes(bytes: [u8; ADDRESS_BYTE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses an address from its string form.
    ///
    /// Accepts exactly [`ADDRESS_HEX_LENGTH`] hex digits, optionally
    /// preceded by `0x`. Letter case is ignored.
    ///
    /// # Errors
    ///
    /// [`AddressError::InvalidLength`] when the digit count is wrong,
    /// [`AddressError::NotHex`] when a non-hex character is present.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix(HEX_PREFIX).unwrap_or(trimmed);

        if digits.len() != ADDRESS_HEX_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_HEX_LENGTH,
                got: digits.len(),
            });
        }

        let mut bytes = [0u8; ADDRESS_BYTE_LENGTH];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::NotHex {
            input: trimmed.to_string(),
        })?;

        Ok(Self(bytes))
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTE_LENGTH] {
        &self.0
    }

    /// Canonical lower-case hex form without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Shortened form for log lines: `0x1234…abcd`.
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}{}…{}", HEX_PREFIX, &full[..4], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", HEX_PREFIX, self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
