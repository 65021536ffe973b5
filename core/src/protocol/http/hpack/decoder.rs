/*
 * decoder.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HPACK decoder restricted to the static table (RFC 7541 §2.3.1, Appendix A).
//!
//! No dynamic table growth and no Huffman: the encoder on the other end of this
//! profile never produces literal-with-incremental-indexing entries that would
//! require tracking one, and never Huffman-codes a string. Decoding either is a
//! hard `HpackUnsupported` error rather than a silent fallback.

use bytes::Buf;

use crate::error::{HttpError, Result};

use super::static_table::{STATIC_TABLE, STATIC_TABLE_SIZE};

/// A single decoded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
    pub never_indexed: bool,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            never_indexed: false,
        }
    }
}

pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a full header block into an ordered list of header fields.
    pub fn decode(&self, block: &[u8]) -> Result<Vec<HeaderField>> {
        let mut buf = block;
        let mut out = Vec::new();
        while buf.has_remaining() {
            let b = buf[0];
            if (b & 0x80) != 0 {
                buf.advance(1);
                let index = decode_integer(&mut buf, b, 7)?;
                if index == 0 {
                    return Err(HttpError::HpackInvalid("indexed header index 0".into()));
                }
                let (name, value) = resolve_static(index)?;
                out.push(HeaderField::new(name, value));
            } else if (b & 0xe0) == 0x20 {
                // Dynamic table size update: parsed and ignored (no dynamic table in this profile).
                buf.advance(1);
                decode_integer(&mut buf, b, 5)?;
            } else if (b & 0xc0) == 0x40 {
                // Literal with incremental indexing: parse but do not index (profile restriction).
                buf.advance(1);
                let (name, value) = decode_literal_incremental(&mut buf, b, 6)?;
                out.push(HeaderField::new(name, value));
            } else if (b & 0xf0) == 0x10 {
                // Literal never indexed.
                buf.advance(1);
                let (name, value) = decode_literal(&mut buf, b, 4)?;
                let mut field = HeaderField::new(name, value);
                field.never_indexed = true;
                out.push(field);
            } else {
                // Literal without indexing (leading bits 0000).
                buf.advance(1);
                let (name, value) = decode_literal(&mut buf, b, 4)?;
                out.push(HeaderField::new(name, value));
            }
        }
        Ok(out)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_static(index: u64) -> Result<(String, String)> {
    if index == 0 || index as usize >= STATIC_TABLE_SIZE {
        return Err(HttpError::HpackInvalid(format!(
            "static table index {} out of range",
            index
        )));
    }
    let (name, value) = STATIC_TABLE[index as usize];
    Ok((name.to_string(), value.unwrap_or("").to_string()))
}

fn decode_literal(buf: &mut &[u8], opcode: u8, nbits: u8) -> Result<(String, String)> {
    let index = decode_integer(buf, opcode, nbits)?;
    let name = if index == 0 {
        decode_string(buf)?
    } else {
        resolve_static(index)?.0
    };
    let value = decode_string(buf)?;
    Ok((name, value))
}

/// Same shape as `decode_literal`, but for literal-with-incremental-indexing: a non-zero
/// name index this profile cannot resolve (i.e. it would fall in the dynamic table, which
/// this decoder never builds) is `HpackUnsupported`, not `HpackInvalid` (spec §4.B).
fn decode_literal_incremental(buf: &mut &[u8], opcode: u8, nbits: u8) -> Result<(String, String)> {
    let index = decode_integer(buf, opcode, nbits)?;
    let name = if index == 0 {
        decode_string(buf)?
    } else {
        match resolve_static(index) {
            Ok((name, _)) => name,
            Err(_) => {
                return Err(HttpError::HpackUnsupported(format!(
                    "literal with incremental indexing referencing unresolvable name index {}",
                    index
                )));
            }
        }
    };
    let value = decode_string(buf)?;
    Ok((name, value))
}

fn decode_integer(buf: &mut &[u8], opcode: u8, nbits: u8) -> Result<u64> {
    let nmask = (1u64 << nbits) - 1;
    let mut value = (opcode & (nmask as u8)) as u64;
    if value < nmask {
        return Ok(value);
    }
    let mut shift = 0u32;
    loop {
        if buf.is_empty() {
            return Err(HttpError::HpackInvalid("truncated integer".into()));
        }
        let b = buf[0];
        buf.advance(1);
        value += ((b & 0x7f) as u64) << shift;
        if (b & 0x80) == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(HttpError::HpackInvalid("integer too large".into()));
        }
    }
    Ok(value)
}

fn decode_string(buf: &mut &[u8]) -> Result<String> {
    if buf.is_empty() {
        return Err(HttpError::HpackInvalid("truncated string length".into()));
    }
    let b = buf[0];
    let huffman = (b & 0x80) != 0;
    if huffman {
        return Err(HttpError::HpackUnsupported("Huffman string literal".into()));
    }
    buf.advance(1);
    let len = decode_integer(buf, b, 7)? as usize;
    if buf.len() < len {
        return Err(HttpError::HpackInvalid("truncated string".into()));
    }
    let raw = &buf[..len];
    buf.advance(len);
    String::from_utf8(raw.to_vec()).map_err(|_| HttpError::HpackInvalid("string not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_indexed_static_method_get() {
        let decoded = Decoder::new().decode(&[0x82]).unwrap();
        assert_eq!(decoded, vec![HeaderField::new(":method", "GET")]);
    }

    #[test]
    fn decode_multiple_indexed_scenario5() {
        // :method GET (2), :path / (4), :scheme https (7)
        let decoded = Decoder::new().decode(&[0x82, 0x84, 0x87]).unwrap();
        assert_eq!(decoded[0], HeaderField::new(":method", "GET"));
        assert_eq!(decoded[1], HeaderField::new(":path", "/"));
        assert_eq!(decoded[2], HeaderField::new(":scheme", "https"));
    }

    #[test]
    fn decode_literal_without_indexing_new_name() {
        let data: &[u8] = &[0x00, 0x03, b'f', b'o', b'o', 0x03, b'b', b'a', b'r'];
        let decoded = Decoder::new().decode(data).unwrap();
        assert_eq!(decoded, vec![HeaderField::new("foo", "bar")]);
    }

    #[test]
    fn decode_literal_without_indexing_with_name_index() {
        // index 8 = :status (value normally "200"), literal value "x" overrides it
        let data: &[u8] = &[0x08, 0x01, b'x'];
        let decoded = Decoder::new().decode(data).unwrap();
        assert_eq!(decoded[0].name, ":status");
        assert_eq!(decoded[0].value, "x");
    }

    #[test]
    fn decode_index_zero_errors() {
        assert!(Decoder::new().decode(&[0x80]).is_err());
    }

    #[test]
    fn decode_huffman_flag_is_unsupported() {
        let data: &[u8] = &[0x00, 0x01, b'x', 0x81, 0xff];
        let err = Decoder::new().decode(data).unwrap_err();
        assert!(matches!(err, HttpError::HpackUnsupported(_)));
    }

    #[test]
    fn decode_dynamic_table_size_update_ignored() {
        // 0x20 = size update to 0, then indexed :method GET
        let decoded = Decoder::new().decode(&[0x20, 0x82]).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value, "GET");
    }

    #[test]
    fn decode_literal_with_incremental_indexing_not_tracked() {
        let data: &[u8] = &[0x40, 0x04, b't', b'e', b's', b't', 0x05, b'v', b'a', b'l', b'u', b'e'];
        let decoded = Decoder::new().decode(data).unwrap();
        assert_eq!(decoded[0], HeaderField::new("test", "value"));
        // A subsequent reference to dynamic index 62 must fail: no table was built.
        let follow_up: &[u8] = &[0xbe]; // indexed, index 62
        assert!(Decoder::new().decode(follow_up).is_err());
    }

    #[test]
    fn decode_literal_with_incremental_indexing_unresolvable_name_is_unsupported() {
        // 0x7e = literal with incremental indexing (01), name index 62 (would-be dynamic entry).
        let data: &[u8] = &[0x7e, 0x01, b'x'];
        let err = Decoder::new().decode(data).unwrap_err();
        assert!(matches!(err, HttpError::HpackUnsupported(_)));
    }
}
