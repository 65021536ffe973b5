/*
 * writer.rs
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

//! HTTP/1.1 response writer: status line, headers, body.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::http::response::{reason_phrase, Response};
use crate::protocol::http::sniff::{sniff_content_type, SMALL_BODY_CONTENT_LENGTH_THRESHOLD};

/// Fill in Content-Type (sniffed) and Content-Length (small-body heuristic) if absent,
/// then serialize status line + headers + body to `out`.
pub async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, mut response: Response) -> Result<()> {
    if !response.headers.contains("Content-Type") && !response.body.is_empty() {
        response
            .headers
            .append("Content-Type", sniff_content_type(&response.body));
    }
    if !response.headers.contains("Content-Length")
        && response.body.len() < SMALL_BODY_CONTENT_LENGTH_THRESHOLD
    {
        response
            .headers
            .append("Content-Length", &response.body.len().to_string());
    }

    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason_phrase(response.status)
    );
    for (name, value) in merge_multivalue(&response.headers) {
        head.push_str(&name);
        head.push_str(": ");
        head.push_str(&value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    out.write_all(head.as_bytes()).await?;
    out.write_all(&response.body).await?;
    out.flush().await?;
    Ok(())
}

/// Group a header multimap into `Name: v1, v2` lines, preserving first-seen order.
fn merge_multivalue(headers: &crate::protocol::http::request::Headers) -> Vec<(String, String)> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    for (name, value) in headers.iter() {
        let key = name.to_string();
        if !merged.contains_key(&key) {
            order.push(key.clone());
        }
        merged.entry(key).or_default().push(value.to_string());
    }
    order
        .into_iter()
        .map(|name| {
            let values = merged.remove(&name).unwrap_or_default();
            (name, values.join(", "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_status_and_sniffed_content_type() {
        let mut resp = Response::new(200);
        resp.body = b"hello world".to_vec();
        let mut buf = Vec::new();
        write_response(&mut buf, resp).await.unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain"));
        assert!(s.contains("Content-Length: 11"));
        assert!(s.ends_with("hello world"));
    }

    #[tokio::test]
    async fn merges_multivalue_headers() {
        let mut resp = Response::new(200);
        resp.headers.append("X-Tag", "a");
        resp.headers.append("X-Tag", "b");
        let mut buf = Vec::new();
        write_response(&mut buf, resp).await.unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("X-Tag: a, b\r\n"));
    }
}
