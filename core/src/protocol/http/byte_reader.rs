/*
 * byte_reader.rs
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

//! Cooperative, line- and length-bounded reads over a buffered async stream.
//!
//! Both the HTTP/1.1 parser and the HTTP/2 frame codec need a mix of line-based
//! reads (start-line, headers, chunk-size lines) and length-bounded reads (bodies,
//! frame payloads). `ByteReader` wraps an `AsyncRead` with a growable buffer and
//! refills from the socket only when the requested data isn't already buffered.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{HttpError, Result};

pub struct ByteReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8192),
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        let mut tmp = [0u8; 8192];
        let n = self.inner.read(&mut tmp).await?;
        if n > 0 {
            self.buf.extend_from_slice(&tmp[..n]);
        }
        Ok(n)
    }

    /// Read exactly `n` bytes, refilling from the socket as needed.
    pub async fn read_exact(&mut self, n: usize) -> Result<BytesMut> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(HttpError::IoEof);
            }
        }
        Ok(self.buf.split_to(n))
    }

    /// Peek at the next `n` bytes without consuming them. Refills as needed.
    pub async fn peek_exact(&mut self, n: usize) -> Result<&[u8]> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(HttpError::IoEof);
            }
        }
        Ok(&self.buf[..n])
    }

    /// Read up to and including a CRLF, returning the content without the terminator.
    pub async fn read_line(&mut self) -> Result<BytesMut> {
        loop {
            if let Some(pos) = find_crlf(&self.buf) {
                let mut line = self.buf.split_to(pos + 2);
                line.truncate(pos);
                return Ok(line);
            }
            if self.fill().await? == 0 {
                return Err(HttpError::IoEof);
            }
        }
    }

    /// Bytes already buffered but not yet consumed (used to hand a leftover prefix
    /// back to a different parser, e.g. after an HTTP/2 preface check).
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n);
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    for i in 0..buf.len() - 1 {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some(i);
        }
    }
    None
}
