//! Feeds and decoded feed values.
//!
//! A feed is identified by a 21-byte identifier: one category byte followed
//! by a 20-byte, zero-padded ASCII name (e.g. `0x01 || "BTC/USD"`). The
//! identifier is rendered as `0x`-prefixed lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{strip_hex_prefix, TypesError, FEED_ID_LEN};

/// Category byte for crypto-currency feeds.
pub const CATEGORY_CRYPTO: u8 = 0x01;

/// A 21-byte feed identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedId(pub [u8; FEED_ID_LEN]);

impl FeedId {
    /// Build a feed identifier from a category byte and a short name.
    ///
    /// Names longer than 20 bytes are truncated.
    pub fn from_name(category: u8, name: &str) -> Self {
        let mut id = [0u8; FEED_ID_LEN];
        id[0] = category;
        let bytes = name.as_bytes();
        let len = bytes.len().min(FEED_ID_LEN - 1);
        id[1..1 + len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Build a feed identifier from a byte slice of exactly 21 bytes.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != FEED_ID_LEN {
            return Err(TypesError::InvalidLength {
                expected: FEED_ID_LEN,
                actual: bytes.len(),
            });
        }
        let mut id = [0u8; FEED_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; FEED_ID_LEN] {
        &self.0
    }

    /// Lowercase hex rendering with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Human-readable name (the ASCII part without trailing zero padding).
    pub fn name(&self) -> String {
        let name = &self.0[1..];
        let end = name.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&name[..end]).into_owned()
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({})", self.to_hex())
    }
}

impl FromStr for FeedId {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        let bytes =
            hex::decode(strip_hex_prefix(s)).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for FeedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A feed: identifier plus the number of decimals its values carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feed {
    /// Feed identifier.
    pub id: FeedId,
    /// Decimal places of the fixed-point value (may be negative).
    pub decimals: i8,
}

impl Feed {
    /// Create a new feed.
    pub fn new(id: FeedId, decimals: i8) -> Self {
        Self { id, decimals }
    }
}

/// One voter's decoded value for one feed in one voting round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueWithDecimals {
    /// `true` when the voter submitted nothing for this feed.
    pub is_empty: bool,
    /// Fixed-point value (already shifted back from the excess-2^31 form).
    pub value: i32,
    /// Decimal places of `value`.
    pub decimals: i8,
}

impl ValueWithDecimals {
    /// A present value.
    pub fn new(value: i32, decimals: i8) -> Self {
        Self {
            is_empty: false,
            value,
            decimals,
        }
    }

    /// A missing value.
    pub fn empty(decimals: i8) -> Self {
        Self {
            is_empty: true,
            value: 0,
            decimals,
        }
    }

    /// Floating point rendering, `None` for empty values.
    pub fn to_f64(&self) -> Option<f64> {
        if self.is_empty {
            return None;
        }
        Some(f64::from(self.value) / 10f64.powi(i32::from(self.decimals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_id_from_name() {
        let id = FeedId::from_name(CATEGORY_CRYPTO, "BTC/USD");
        assert_eq!(id.0[0], 0x01);
        assert_eq!(&id.0[1..8], b"BTC/USD");
        assert!(id.0[8..].iter().all(|b| *b == 0));
        assert_eq!(id.name(), "BTC/USD");
    }

    #[test]
    fn test_feed_id_hex_roundtrip() {
        let id = FeedId::from_name(CATEGORY_CRYPTO, "ETH/USD");
        let parsed: FeedId = id.to_hex().parse().expect("parse");
        assert_eq!(parsed, id);
        assert_eq!(id.to_hex().len(), 2 + 42);
    }

    #[test]
    fn test_feed_id_wrong_length() {
        let err = "0x0102".parse::<FeedId>().expect_err("should fail");
        assert!(matches!(
            err,
            TypesError::InvalidLength {
                expected: 21,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_feed_id_serde_as_hex_string() {
        let id = FeedId::from_name(CATEGORY_CRYPTO, "XRP/USD");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: FeedId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_value_to_f64() {
        assert_eq!(ValueWithDecimals::new(12345, 2).to_f64(), Some(123.45));
        assert_eq!(ValueWithDecimals::new(-7, 0).to_f64(), Some(-7.0));
        assert_eq!(ValueWithDecimals::empty(2).to_f64(), None);
    }
}
