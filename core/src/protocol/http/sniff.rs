/*
 * sniff.rs
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

//! Content-type sniffing and the small-body Content-Length heuristic shared by
//! the HTTP/1.1 and HTTP/2 response writers.

/// Bytes examined when sniffing a body for its content type.
pub const SNIFF_WINDOW: usize = 512;

/// Bodies smaller than this auto-get a `Content-Length` header instead of being
/// streamed without one. Arbitrary but named (see DESIGN.md open question #2).
pub const SMALL_BODY_CONTENT_LENGTH_THRESHOLD: usize = 5120;

/// A minimal content-type sniffer: enough to distinguish the handful of types a
/// demo/origin handler is likely to emit without pulling in a MIME-sniffing crate
/// dependency the rest of the stack doesn't otherwise need.
pub fn sniff_content_type(body: &[u8]) -> &'static str {
    let window = &body[..body.len().min(SNIFF_WINDOW)];
    if window.is_empty() {
        return "application/octet-stream";
    }
    if window.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if window.starts_with(b"\xff\xd8\xff") {
        return "image/jpeg";
    }
    if window.starts_with(b"GIF87a") || window.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if window.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    let trimmed = trim_ascii_whitespace(window);
    if trimmed.starts_with(b"<!DOCTYPE html") || trimmed.starts_with(b"<!doctype html") || trimmed.starts_with(b"<html") {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
        return "application/json";
    }
    if is_text(window) {
        return "text/plain; charset=utf-8";
    }
    "application/octet-stream"
}

fn trim_ascii_whitespace(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    &b[start..]
}

fn is_text(b: &[u8]) -> bool {
    b.iter().all(|&c| c == b'\n' || c == b'\r' || c == b'\t' || (0x20..=0x7e).contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_html() {
        assert_eq!(sniff_content_type(b"<!DOCTYPE html><html></html>"), "text/html; charset=utf-8");
    }

    #[test]
    fn sniffs_json() {
        assert_eq!(sniff_content_type(b"{\"a\":1}"), "application/json");
    }

    #[test]
    fn sniffs_plain_text() {
        assert_eq!(sniff_content_type(b"hello world"), "text/plain; charset=utf-8");
    }

    #[test]
    fn unknown_binary_is_octet_stream() {
        assert_eq!(sniff_content_type(&[0u8, 159, 255]), "application/octet-stream");
    }
}
