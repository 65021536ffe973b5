/*
 * error.rs
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

//! Error taxonomy for the wire protocol layer and its ambient collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed HTTP/1.1 request: {0}")]
    BadRequest(String),

    #[error("chunked transfer-coding not terminal: {0}")]
    ChunkedEncodingError(String),

    #[error("invalid HTTP/2 connection preface")]
    BadPreface,

    #[error("HTTP/2 protocol error: {0}")]
    Http2Protocol(String),

    #[error("unsupported HPACK representation: {0}")]
    HpackUnsupported(String),

    #[error("malformed HPACK block: {0}")]
    HpackInvalid(String),

    #[error("HTTP/2 frame truncated")]
    FrameTooShort,

    #[error("HTTP/2 frame exceeds max frame size ({length} > {max})")]
    OversizedFrame { length: usize, max: usize },

    #[error("connection closed")]
    IoEof,

    #[error(transparent)]
    IoOther(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl HttpError {
    /// True for errors that the HTTP/1.1 dispatcher answers with a 400 response before closing,
    /// as opposed to errors that close the connection silently.
    pub fn is_chunked_encoding_error(&self) -> bool {
        matches!(self, HttpError::ChunkedEncodingError(_))
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;
