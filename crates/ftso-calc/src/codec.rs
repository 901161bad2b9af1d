//! Fixed-point feed value packing.
//!
//! Each price is scaled by `10^decimals`, rounded to the nearest integer
//! (halves towards positive infinity, so `-2.5` becomes `-2`) and shifted by
//! `2^31`, then written as 4 big-endian bytes. A missing price is
//! written as 4 zero bytes, which the shift keeps distinct from any real
//! value. Trailing missing prices are stripped; the decoder pads them back.
//!
//! ```text
//! group = u32_be(floor(price * 10^decimals + 0.5) + 2^31)     (0x00000000 = empty)
//! ```

use ftso_types::{Feed, ValueWithDecimals};

use crate::{CalcError, Result};

/// Bytes per packed value.
pub const GROUP_LEN: usize = 4;

/// Offset applied to every value on the wire.
pub const VALUE_OFFSET: i64 = 1 << 31;

/// Pack prices for the given feeds.
///
/// `prices[i]` belongs to `feeds[i]`; `None` marks a missing price. Fewer
/// prices than feeds is allowed (the rest are missing).
///
/// # Errors
///
/// - [`CalcError::MalformedInput`] if there are more prices than feeds
/// - [`CalcError::EncodingRange`] if a shifted value falls outside `[1, 2^32 - 1]`
pub fn encode_values(prices: &[Option<f64>], feeds: &[Feed]) -> Result<Vec<u8>> {
    if prices.len() > feeds.len() {
        return Err(CalcError::MalformedInput(format!(
            "{} values for {} feeds",
            prices.len(),
            feeds.len()
        )));
    }

    let mut out = Vec::with_capacity(prices.len() * GROUP_LEN);
    for (price, feed) in prices.iter().zip(feeds) {
        let group = match price {
            Some(price) => encode_one(*price, feed)?,
            None => 0,
        };
        out.extend_from_slice(&group.to_be_bytes());
    }

    // Strip trailing empty groups but keep at least one.
    while out.len() > GROUP_LEN && out[out.len() - GROUP_LEN..].iter().all(|b| *b == 0) {
        out.truncate(out.len() - GROUP_LEN);
    }
    Ok(out)
}

fn encode_one(price: f64, feed: &Feed) -> Result<u32> {
    let scaled = (price * 10f64.powi(i32::from(feed.decimals)) + 0.5).floor();
    let shifted = scaled + VALUE_OFFSET as f64;
    if !shifted.is_finite() || shifted < 1.0 || shifted > f64::from(u32::MAX) {
        return Err(CalcError::EncodingRange {
            feed: feed.id.name(),
            value: scaled,
        });
    }
    Ok(shifted as u32)
}

/// Pack prices into a lowercase hex string without prefix.
pub fn encode_values_hex(prices: &[Option<f64>], feeds: &[Feed]) -> Result<String> {
    encode_values(prices, feeds).map(hex::encode)
}

/// Unpack values for the given feeds.
///
/// The result always has `feeds.len()` entries; groups missing from the
/// tail decode as empty.
///
/// # Errors
///
/// - [`CalcError::MalformedInput`] if the length is not a multiple of 4 bytes
///   or there are more groups than feeds
pub fn decode_values(encoded: &[u8], feeds: &[Feed]) -> Result<Vec<ValueWithDecimals>> {
    if encoded.len() % GROUP_LEN != 0 {
        return Err(CalcError::MalformedInput(format!(
            "packed length {} is not a multiple of {GROUP_LEN}",
            encoded.len()
        )));
    }
    let groups = encoded.len() / GROUP_LEN;
    if groups > feeds.len() {
        return Err(CalcError::MalformedInput(format!(
            "{groups} groups for {} feeds",
            feeds.len()
        )));
    }

    let mut values = Vec::with_capacity(feeds.len());
    for (i, feed) in feeds.iter().enumerate() {
        let group = encoded
            .get(i * GROUP_LEN..(i + 1) * GROUP_LEN)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or(0);
        let value = if group == 0 {
            ValueWithDecimals::empty(feed.decimals)
        } else {
            ValueWithDecimals::new((i64::from(group) - VALUE_OFFSET) as i32, feed.decimals)
        };
        values.push(value);
    }
    Ok(values)
}

/// Unpack values from a hex string (optional `0x` prefix).
///
/// # Errors
///
/// - [`CalcError::MalformedInput`] for non-hex characters or a length that is
///   not a multiple of 8 characters, plus everything [`decode_values`] rejects
pub fn decode_values_hex(encoded: &str, feeds: &[Feed]) -> Result<Vec<ValueWithDecimals>> {
    let digits = ftso_types::strip_hex_prefix(encoded);
    if digits.len() % (2 * GROUP_LEN) != 0 {
        return Err(CalcError::MalformedInput(format!(
            "hex length {} is not a multiple of {}",
            digits.len(),
            2 * GROUP_LEN
        )));
    }
    let bytes = hex::decode(digits).map_err(|e| CalcError::MalformedInput(e.to_string()))?;
    decode_values(&bytes, feeds)
}
