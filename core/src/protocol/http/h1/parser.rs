/*
 * parser.rs
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

//! HTTP/1.1 request parser: start-line, headers, chunked/content-length body, keep-alive.

use tokio::io::AsyncRead;

use crate::error::{HttpError, Result};
use crate::protocol::http::byte_reader::ByteReader;
use crate::protocol::http::request::{Method, Request};

/// Parse one request off `reader`. Returns the request and whether the connection
/// should expect another request afterward.
pub async fn parse<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<(Request, bool)> {
    let start_line = reader.read_line().await?;
    let line_str = std::str::from_utf8(&start_line)
        .map_err(|_| HttpError::BadRequest("start-line not UTF-8".into()))?;
    let parts: Vec<&str> = line_str.splitn(3, ' ').collect();
    if parts.len() != 3 {
        return Err(HttpError::BadRequest(format!(
            "expected method, target, version; got {:?}",
            line_str
        )));
    }
    let (method, method_raw) = Method::parse(parts[0]);
    let target = parts[1].to_string();
    let (major, minor) = parse_version(parts[2])?;

    let mut request = Request::new(method, method_raw.to_string(), target);
    request.version_major = major;
    request.version_minor = minor;

    read_headers(reader, &mut request.headers).await?;

    if let Some(host) = request.headers.remove("Host") {
        request.host = host;
    }

    if let Some(cl) = request.headers.get_first("Content-Length") {
        request.content_length = cl.trim().parse::<u64>().ok();
    }

    let transfer_encodings: Vec<String> = request
        .headers
        .get_all("Transfer-Encoding")
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    request.transfer_encoding = transfer_encodings.clone();

    let chunked = if transfer_encodings.is_empty() {
        false
    } else {
        let last_is_chunked = transfer_encodings
            .last()
            .map(|e| e.eq_ignore_ascii_case("chunked"))
            .unwrap_or(false);
        let any_chunked_before_last = transfer_encodings[..transfer_encodings.len() - 1]
            .iter()
            .any(|e| e.eq_ignore_ascii_case("chunked"));
        if any_chunked_before_last {
            return Err(HttpError::ChunkedEncodingError(
                "chunked transfer-coding must be last".into(),
            ));
        }
        last_is_chunked
    };

    if chunked {
        request.headers.remove("Content-Length");
        request.content_length = None;
        request.body = read_chunked_body(reader, &mut request.trailers).await?;
    } else {
        let len = request.content_length.unwrap_or(0) as usize;
        if len > 0 {
            request.body = reader.read_exact(len).await?.to_vec();
        }
    }

    let more_requests = decide_keep_alive(&request);
    Ok((request, more_requests))
}

fn parse_version(s: &str) -> Result<(u8, u8)> {
    let rest = s
        .strip_prefix("HTTP/")
        .ok_or_else(|| HttpError::BadRequest(format!("bad version token {:?}", s)))?;
    let mut it = rest.trim_end().splitn(2, '.');
    let major = it
        .next()
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| HttpError::BadRequest("bad version major".into()))?;
    let minor = it
        .next()
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| HttpError::BadRequest("bad version minor".into()))?;
    Ok((major, minor))
}

async fn read_headers<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    out: &mut crate::protocol::http::request::Headers,
) -> Result<()> {
    loop {
        let line = reader.read_line().await?;
        if line.is_empty() {
            return Ok(());
        }
        let line_str = std::str::from_utf8(&line)
            .map_err(|_| HttpError::BadRequest("header line not UTF-8".into()))?;
        let colon = line_str
            .find(':')
            .ok_or_else(|| HttpError::BadRequest(format!("header missing colon: {:?}", line_str)))?;
        let name = line_str[..colon].trim();
        let value = line_str[colon + 1..].trim();
        out.append_split(name, value);
    }
}

async fn read_chunked_body<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    trailers: &mut crate::protocol::http::request::Headers,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let size_line = reader.read_line().await?;
        let size_str = std::str::from_utf8(&size_line)
            .map_err(|_| HttpError::ChunkedEncodingError("chunk size not UTF-8".into()))?;
        let hex_part = size_str.split(';').next().unwrap_or(size_str).trim();
        let size = usize::from_str_radix(hex_part, 16)
            .map_err(|_| HttpError::ChunkedEncodingError(format!("bad chunk size {:?}", hex_part)))?;
        if size == 0 {
            read_headers(reader, trailers).await?;
            return Ok(body);
        }
        let chunk = reader.read_exact(size).await?;
        body.extend_from_slice(&chunk);
        let crlf = reader.read_exact(2).await?;
        if &crlf[..] != b"\r\n" {
            return Err(HttpError::ChunkedEncodingError(
                "missing chunk terminator".into(),
            ));
        }
    }
}

fn decide_keep_alive(request: &Request) -> bool {
    match request.headers.get_first("Connection") {
        Some(v) => v.eq_ignore_ascii_case("keep-alive"),
        None => request.version_minor == 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn parse_bytes(data: &[u8]) -> Result<(Request, bool)> {
        let mut r = ByteReader::new(Cursor::new(data.to_vec()));
        parse(&mut r).await
    }

    #[tokio::test]
    async fn scenario_1_simple_get() {
        let (req, more) = parse_bytes(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "/");
        assert_eq!(req.host, "x");
        assert!(req.body.is_empty());
        assert!(more);
    }

    #[tokio::test]
    async fn scenario_2_content_length_body() {
        let (req, more) = parse_bytes(
            b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await
        .unwrap();
        assert_eq!(req.body, b"hello");
        assert!(more);
    }

    #[tokio::test]
    async fn scenario_3_chunked_body() {
        let (req, _) = parse_bytes(
            b"POST /c HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(req.body, b"hello");
        assert!(req.content_length.is_none());
    }

    #[tokio::test]
    async fn scenario_3b_chunked_multi_chunk_boundaries() {
        let (req, _) = parse_bytes(
            b"POST /c HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhe\r\n3\r\nllo\r\n0\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn scenario_4_chunked_not_terminal_errors() {
        let err = parse_bytes(
            b"POST /bad HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked, gzip\r\n\r\n",
        )
        .await
        .unwrap_err();
        assert!(err.is_chunked_encoding_error());
    }

    #[tokio::test]
    async fn keep_alive_absent_minor_1_is_true() {
        let (_, more) = parse_bytes(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        assert!(more);
    }

    #[tokio::test]
    async fn keep_alive_close_header_is_false() {
        let (_, more) = parse_bytes(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        assert!(!more);
    }

    #[tokio::test]
    async fn comma_separated_header_values_split() {
        let (req, _) = parse_bytes(b"GET / HTTP/1.1\r\nHost: x\r\nAccept: text/html, text/plain\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.headers.get_all("Accept"), vec!["text/html", "text/plain"]);
    }
}
