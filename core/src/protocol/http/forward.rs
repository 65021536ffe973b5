/*
 * forward.rs
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

//! Outbound HTTP/1.1 client used by `ForwardHandler` to reach an upstream target. A fresh
//! plain-TCP connection per request, reusing this crate's own 1.1 parser against the
//! response instead of a response-specific codec.

use tokio::io::{AsyncWriteExt, BufReader};

use crate::error::{HttpError, Result};
use crate::net::connect_upstream;
use crate::protocol::http::byte_reader::ByteReader;
use crate::protocol::http::request::{Headers, Request};
use crate::protocol::http::response::Response;

/// Send `request` to `target` (`host:port`) over a fresh TCP connection and return the
/// parsed response. The request line is rebuilt from `request.method_raw`/`url`; the
/// `Host` header is forced to `target` since the original `Host` described this proxy,
/// not the upstream.
pub async fn forward(target: &str, request: &Request) -> Result<Response> {
    let stream = connect_upstream(target).await?;
    let (read_half, mut write_half) = tokio::io::split(stream);

    let mut head = format!("{} {} HTTP/1.1\r\n", request.method_raw, request.url);
    head.push_str(&format!("Host: {}\r\n", target));
    for (name, value) in request.headers.iter() {
        if name.eq_ignore_ascii_case("Host") {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if !request.headers.contains("Content-Length") && !request.body.is_empty() {
        head.push_str(&format!("Content-Length: {}\r\n", request.body.len()));
    }
    head.push_str("Connection: close\r\n\r\n");

    write_half.write_all(head.as_bytes()).await?;
    write_half.write_all(&request.body).await?;
    write_half.flush().await?;

    let mut reader = ByteReader::new(BufReader::new(read_half));
    read_response(&mut reader).await
}

async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<Response> {
    let start_line = reader.read_line().await?;
    let line_str = std::str::from_utf8(&start_line)
        .map_err(|_| HttpError::BadRequest("upstream status-line not UTF-8".into()))?;
    let parts: Vec<&str> = line_str.splitn(3, ' ').collect();
    if parts.len() < 2 {
        return Err(HttpError::BadRequest(format!(
            "malformed upstream status-line: {:?}",
            line_str
        )));
    }
    let status: u16 = parts[1]
        .parse()
        .map_err(|_| HttpError::BadRequest(format!("bad upstream status code: {:?}", parts[1])))?;

    let mut headers = Headers::new();
    loop {
        let line = reader.read_line().await?;
        if line.is_empty() {
            break;
        }
        let line_str = std::str::from_utf8(&line)
            .map_err(|_| HttpError::BadRequest("upstream header line not UTF-8".into()))?;
        let colon = line_str
            .find(':')
            .ok_or_else(|| HttpError::BadRequest(format!("upstream header missing colon: {:?}", line_str)))?;
        let name = line_str[..colon].trim();
        let value = line_str[colon + 1..].trim();
        headers.append_split(name, value);
    }

    let chunked = headers
        .get_first("Transfer-Encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    let body = if chunked {
        headers.remove("Content-Length");
        read_chunked_body(reader).await?
    } else if let Some(len) = headers
        .get_first("Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        if len > 0 {
            reader.read_exact(len).await?.to_vec()
        } else {
            Vec::new()
        }
    } else {
        read_to_eof(reader).await?
    };

    let mut response = Response::new(status);
    response.headers = headers;
    response.body = body;
    Ok(response)
}

async fn read_chunked_body<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let size_line = reader.read_line().await?;
        let size_str = std::str::from_utf8(&size_line)
            .map_err(|_| HttpError::ChunkedEncodingError("upstream chunk size not UTF-8".into()))?;
        let hex_part = size_str.split(';').next().unwrap_or(size_str).trim();
        let size = usize::from_str_radix(hex_part, 16)
            .map_err(|_| HttpError::ChunkedEncodingError(format!("bad upstream chunk size {:?}", hex_part)))?;
        if size == 0 {
            let mut trailers = Headers::new();
            loop {
                let line = reader.read_line().await?;
                if line.is_empty() {
                    break;
                }
                let line_str = std::str::from_utf8(&line).unwrap_or_default();
                if let Some(colon) = line_str.find(':') {
                    trailers.append_split(line_str[..colon].trim(), line_str[colon + 1..].trim());
                }
            }
            return Ok(body);
        }
        let chunk = reader.read_exact(size).await?;
        body.extend_from_slice(&chunk);
        let crlf = reader.read_exact(2).await?;
        if &crlf[..] != b"\r\n" {
            return Err(HttpError::ChunkedEncodingError(
                "missing upstream chunk terminator".into(),
            ));
        }
    }
}

/// No framing header at all: read until the upstream closes the connection.
async fn read_to_eof<R: tokio::io::AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> Result<Vec<u8>> {
    let mut body = reader.buffered().to_vec();
    reader.advance(body.len());
    loop {
        match reader.read_exact(1).await {
            Ok(byte) => body.extend_from_slice(&byte),
            Err(HttpError::IoEof) => return Ok(body),
            Err(other) => return Err(other),
        }
    }
}
