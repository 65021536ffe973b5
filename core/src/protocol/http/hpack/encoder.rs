/*
 * encoder.rs
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

//! HPACK encoder restricted to indexed-static and literal-without-indexing
//! representations. No dynamic table, no Huffman — matches the decoder profile.

use bytes::{BufMut, BytesMut};

use super::static_table::STATIC_TABLE;

/// Encode a header list (pseudo-headers MUST come first; caller's responsibility)
/// into a single HPACK block.
pub fn encode(headers: &[(&str, &str)]) -> BytesMut {
    let mut out = BytesMut::new();
    for &(name, value) in headers {
        if let Some(idx) = find_exact(name, value) {
            encode_indexed(idx, &mut out);
        } else {
            encode_literal_without_indexing(name, value, &mut out);
        }
    }
    out
}

fn find_exact(name: &str, value: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, v)| n == name && v == Some(value))
}

fn find_name(name: &str) -> Option<usize> {
    STATIC_TABLE.iter().position(|&(n, _)| n == name)
}

fn encode_indexed(index: usize, out: &mut BytesMut) {
    encode_integer(index as u64, 7, 0x80, out);
}

fn encode_literal_without_indexing(name: &str, value: &str, out: &mut BytesMut) {
    match find_name(name) {
        Some(idx) => {
            encode_integer(idx as u64, 4, 0x00, out);
        }
        None => {
            out.put_u8(0x00);
            encode_string(name.as_bytes(), out);
        }
    }
    encode_string(value.as_bytes(), out);
}

fn encode_string(s: &[u8], out: &mut BytesMut) {
    // High bit clear: never Huffman-coded in this profile.
    encode_integer(s.len() as u64, 7, 0x00, out);
    out.put_slice(s);
}

fn encode_integer(mut value: u64, nbits: u8, prefix: u8, out: &mut BytesMut) {
    let max_prefix = (1u64 << nbits) - 1;
    if value < max_prefix {
        out.put_u8(prefix | value as u8);
        return;
    }
    out.put_u8(prefix | max_prefix as u8);
    value -= max_prefix;
    while value >= 128 {
        out.put_u8(0x80 | (value % 128) as u8);
        value /= 128;
    }
    out.put_u8(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::hpack::Decoder;

    #[test]
    fn status_200_uses_indexed_representation() {
        let out = encode(&[(":status", "200")]);
        assert_eq!(out[0], 0x88); // index 8
    }

    #[test]
    fn literal_without_indexing_for_novel_value() {
        let out = encode(&[(":status", "201")]);
        // name index 8, literal value "201"
        assert_eq!(out[0], 0x08);
    }

    #[test]
    fn roundtrips_through_decoder() {
        let headers: &[(&str, &str)] = &[(":status", "200"), ("content-type", "text/plain")];
        let block = encode(headers);
        let decoded = Decoder::new().decode(&block).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name, ":status");
        assert_eq!(decoded[0].value, "200");
        assert_eq!(decoded[1].name, "content-type");
        assert_eq!(decoded[1].value, "text/plain");
    }

    #[test]
    fn never_emits_huffman_flag() {
        let out = encode(&[("x-custom", "some literal value with spaces")]);
        // Walk the block: every string length byte must have its high bit clear.
        // First byte is the literal-without-indexing opcode (new name, index 0).
        assert_eq!(out[0] & 0xf0, 0x00);
    }
}
