/*
 * frame.rs
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

//! HTTP/2 frame type/flag constants (RFC 7540) and the 9-octet frame codec.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::error::{HttpError, Result};
use crate::protocol::http::byte_reader::ByteReader;

// Frame types
pub const TYPE_DATA: u8 = 0x0;
pub const TYPE_HEADERS: u8 = 0x1;
pub const TYPE_PRIORITY: u8 = 0x2;
pub const TYPE_RST_STREAM: u8 = 0x3;
pub const TYPE_SETTINGS: u8 = 0x4;
pub const TYPE_PUSH_PROMISE: u8 = 0x5;
pub const TYPE_PING: u8 = 0x6;
pub const TYPE_GOAWAY: u8 = 0x7;
pub const TYPE_WINDOW_UPDATE: u8 = 0x8;
pub const TYPE_CONTINUATION: u8 = 0x9;

// Flags
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

// Error codes
pub const ERROR_NO_ERROR: u32 = 0x0;
pub const ERROR_PROTOCOL_ERROR: u32 = 0x1;
#[allow(dead_code)]
pub const ERROR_INTERNAL_ERROR: u32 = 0x2;
#[allow(dead_code)]
pub const ERROR_FLOW_CONTROL_ERROR: u32 = 0x3;
#[allow(dead_code)]
pub const ERROR_SETTINGS_TIMEOUT: u32 = 0x4;
#[allow(dead_code)]
pub const ERROR_STREAM_CLOSED: u32 = 0x5;
pub const ERROR_FRAME_SIZE_ERROR: u32 = 0x6;
#[allow(dead_code)]
pub const ERROR_REFUSED_STREAM: u32 = 0x7;
#[allow(dead_code)]
pub const ERROR_CANCEL: u32 = 0x8;
#[allow(dead_code)]
pub const ERROR_COMPRESSION_ERROR: u32 = 0x9;

// SETTINGS identifiers
pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
#[allow(dead_code)]
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
#[allow(dead_code)]
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
#[allow(dead_code)]
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
#[allow(dead_code)]
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

pub const FRAME_HEADER_LENGTH: usize = 9;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16384;

/// A parsed HTTP/2 frame header plus its opaque payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn end_stream(&self) -> bool {
        (self.flags & FLAG_END_STREAM) != 0
    }

    pub fn end_headers(&self) -> bool {
        (self.flags & FLAG_END_HEADERS) != 0
    }

    pub fn padded(&self) -> bool {
        (self.flags & FLAG_PADDED) != 0
    }

    pub fn priority(&self) -> bool {
        (self.flags & FLAG_PRIORITY) != 0
    }

    pub fn ack(&self) -> bool {
        (self.flags & FLAG_ACK) != 0
    }
}

/// Read one frame off `reader`. Fails with `FrameTooShort` on truncation and
/// `OversizedFrame` if the declared length exceeds `max_frame_size`.
pub async fn parse_frame<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    max_frame_size: usize,
) -> Result<Frame> {
    let header = match reader.read_exact(FRAME_HEADER_LENGTH).await {
        Ok(h) => h,
        Err(HttpError::IoEof) => return Err(HttpError::FrameTooShort),
        Err(e) => return Err(e),
    };
    let length = (header[0] as usize) << 16 | (header[1] as usize) << 8 | (header[2] as usize);
    if length > max_frame_size {
        return Err(HttpError::OversizedFrame {
            length,
            max: max_frame_size,
        });
    }
    let frame_type = header[3];
    let flags = header[4];
    let stream_id = ((header[5] & 0x7f) as u32) << 24
        | (header[6] as u32) << 16
        | (header[7] as u32) << 8
        | (header[8] as u32);

    let payload = if length > 0 {
        match reader.read_exact(length).await {
            Ok(p) => p.freeze(),
            Err(HttpError::IoEof) => return Err(HttpError::FrameTooShort),
            Err(e) => return Err(e),
        }
    } else {
        Bytes::new()
    };

    Ok(Frame {
        frame_type,
        flags,
        stream_id,
        payload,
    })
}

/// Serialize a frame header + payload. `stream_id`'s reserved top bit is always cleared.
pub fn serialize_frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LENGTH + payload.len());
    let length = payload.len();
    buf.extend_from_slice(&[
        (length >> 16) as u8,
        (length >> 8) as u8,
        length as u8,
        frame_type,
        flags,
    ]);
    buf.extend_from_slice(&(stream_id & 0x7fff_ffff).to_be_bytes());
    buf.extend_from_slice(payload);
    buf.freeze()
}
