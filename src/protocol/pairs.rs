//! Name/value pair codec.
//!
//! Used for the content of PARAMS, GET_VALUES and GET_VALUES_RESULT records.
//! Each pair is encoded as:
//!
//! ```text
//! nameLength valueLength nameData valueData
//! ```
//!
//! Lengths below 128 take a single byte. Longer lengths take four bytes,
//! big-endian, with the high bit of the first byte set.
//!
//! Names and values are UTF-8 in both directions. ASCII parameter names are
//! a subset of that, so encoding never has to reject input.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Marker bit for the four-byte length form.
const LONG_LENGTH: u32 = 0x8000_0000;

/// Largest length that still fits in the one-byte form.
const MAX_SHORT_LENGTH: usize = 0x7f;

/// Encode name/value pairs, appending to `buf`.
///
/// Pairs are written in iteration order.
pub fn encode_pairs<'a, I>(pairs: I, buf: &mut BytesMut)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (name, value) in pairs {
        put_length(buf, name.len());
        put_length(buf, value.len());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
}

/// Encode name/value pairs into a fresh buffer.
pub fn encode_pairs_to_vec<'a, I>(pairs: I) -> BytesMut
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut buf = BytesMut::new();
    encode_pairs(pairs, &mut buf);
    buf
}

fn put_length(buf: &mut BytesMut, len: usize) {
    if len <= MAX_SHORT_LENGTH {
        buf.put_u8(len as u8);
    } else {
        debug_assert!(len < LONG_LENGTH as usize, "name/value length overflows 31 bits");
        buf.put_u32(len as u32 | LONG_LENGTH);
    }
}

/// Decode a complete name/value pair list.
///
/// The whole buffer must be consumed. A buffer that ends part-way through a
/// pair is an error, never a partial result.
pub fn decode_pairs(buffer: &[u8]) -> Result<Vec<(String, String)>, ProtocolError> {
    let mut pairs = Vec::new();
    let mut rest = buffer;

    while !rest.is_empty() {
        let (name_len, after) = read_length(rest).ok_or(ProtocolError::NameLengthTruncated)?;
        let (value_len, after) = read_length(after).ok_or(ProtocolError::ValueLengthTruncated)?;

        if after.len() < name_len + value_len {
            return Err(ProtocolError::PairDataTruncated);
        }

        let (name, after) = after.split_at(name_len);
        let (value, after) = after.split_at(value_len);
        pairs.push((to_text(name)?, to_text(value)?));
        rest = after;
    }

    Ok(pairs)
}

/// Read one length prefix, returning the length and the remaining input.
fn read_length(input: &[u8]) -> Option<(usize, &[u8])> {
    let first = *input.first()?;
    if first & 0x80 == 0 {
        return Some((first as usize, &input[1..]));
    }

    let bytes: [u8; 4] = input.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(bytes) & !LONG_LENGTH;
    Some((len as usize, &input[4..]))
}

fn to_text(bytes: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidText)
}
