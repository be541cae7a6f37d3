//! MD5 digest value type
//!
//! Manifest checksums are 32-character hex strings. They are stored as the raw
//! 16 bytes so that comparisons against a computed digest never depend on the
//! letter case used by the manifest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ManifestError, ManifestResult};

/// MD5 digest stored as a 16-byte array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Md5Hash([u8; 16]);

impl Md5Hash {
    /// Digest of zero bytes of input
    pub const EMPTY: Md5Hash = Md5Hash([
        0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8, 0x42,
        0x7e,
    ]);

    /// Parse a 32-character hex string (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use condarepo::app::Md5Hash;
    ///
    /// let hash = Md5Hash::from_hex("D41D8CD98F00B204E9800998ECF8427E")?;
    /// assert_eq!(hash, Md5Hash::EMPTY);
    /// # Ok::<(), condarepo::errors::ManifestError>(())
    /// ```
    pub fn from_hex(hex: &str) -> ManifestResult<Self> {
        let invalid = || ManifestError::InvalidHash {
            hash: hex.to_string(),
        };

        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 16];
        for (slot, pair) in bytes.iter_mut().zip(hex.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }

        Ok(Md5Hash(bytes))
    }

    /// Lowercase 32-character hex representation
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(32), |mut acc, b| {
            let _ = write!(&mut acc, "{:02x}", b);
            acc
        })
    }

    /// Wrap a finished digest
    pub fn from_digest(digest: md5::Digest) -> Self {
        Md5Hash(digest.0)
    }
}

impl fmt::Display for Md5Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Md5Hash {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Md5Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Md5Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        let lower = Md5Hash::from_hex("312cc19649601e9675df7424b5b975a9").unwrap();
        let upper = Md5Hash::from_hex("312CC19649601E9675DF7424B5B975A9").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(upper.to_hex(), "312cc19649601e9675df7424b5b975a9");
    }

    #[test]
    fn test_invalid_hex_strings() {
        let invalid_cases = [
            "",
            "312cc19649601e9675df7424b5b975a",   // Too short
            "312cc19649601e9675df7424b5b975a99", // Too long
            "312cc19649601e9675df7424b5b975ag",  // Invalid character
            "312cc196 9601e9675df7424b5b975a9",  // Space
            "é12cc19649601e9675df7424b5b975a",   // Multi-byte character
        ];

        for hex in &invalid_cases {
            assert!(Md5Hash::from_hex(hex).is_err(), "Should reject: {}", hex);
        }
    }

    #[test]
    fn test_empty_digest_constant() {
        assert_eq!(Md5Hash::from_digest(md5::compute(b"")), Md5Hash::EMPTY);
        assert_eq!(Md5Hash::EMPTY.to_string(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash: Md5Hash = serde_json::from_str("\"312cc19649601e9675df7424b5b975a9\"").unwrap();
        assert_eq!(
            serde_json::to_string(&hash).unwrap(),
            "\"312cc19649601e9675df7424b5b975a9\""
        );
        assert!(serde_json::from_str::<Md5Hash>("\"not-a-hash\"").is_err());
    }
}
