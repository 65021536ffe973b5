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

//! HTTP/2 frame writer: serializes frames into a buffer.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;

use super::frame::*;

/// Writes HTTP/2 frames into a BytesMut. Caller is responsible for sending the buffer to the stream.
pub struct H2Writer {
    buf: BytesMut,
}

impl H2Writer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(16384 + FRAME_HEADER_LENGTH),
        }
    }

    fn write_frame_header(&mut self, length: usize, frame_type: u8, flags: u8, stream_id: u32) {
        self.buf.put_u8((length >> 16) as u8);
        self.buf.put_u8((length >> 8) as u8);
        self.buf.put_u8(length as u8);
        self.buf.put_u8(frame_type);
        self.buf.put_u8(flags);
        self.buf.put_u32(stream_id);
    }

    /// Append a DATA frame. Returns the number of payload bytes written.
    pub fn write_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> io::Result<usize> {
        if stream_id == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "DATA frame stream_id must be non-zero",
            ));
        }
        let flags = if end_stream {
            FLAG_END_STREAM
        } else {
            0
        };
        let len = data.len();
        self.write_frame_header(len, TYPE_DATA, flags, stream_id);
        self.buf.extend_from_slice(data);
        Ok(len)
    }

    /// Append a HEADERS frame (no priority, no padding). Header block must be HPACK-encoded.
    pub fn write_headers(
        &mut self,
        stream_id: u32,
        header_block: &[u8],
        end_stream: bool,
        end_headers: bool,
    ) -> io::Result<()> {
        if stream_id == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "HEADERS frame stream_id must be non-zero",
            ));
        }
        let mut flags = 0u8;
        if end_stream {
            flags |= FLAG_END_STREAM;
        }
        if end_headers {
            flags |= FLAG_END_HEADERS;
        }
        self.write_frame_header(header_block.len(), TYPE_HEADERS, flags, stream_id);
        self.buf.extend_from_slice(header_block);
        Ok(())
    }

    /// Append a CONTINUATION frame carrying the next fragment of a header block.
    pub fn write_continuation(
        &mut self,
        stream_id: u32,
        fragment: &[u8],
        end_headers: bool,
    ) -> io::Result<()> {
        if stream_id == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "CONTINUATION frame stream_id must be non-zero",
            ));
        }
        let flags = if end_headers { FLAG_END_HEADERS } else { 0 };
        self.write_frame_header(fragment.len(), TYPE_CONTINUATION, flags, stream_id);
        self.buf.extend_from_slice(fragment);
        Ok(())
    }

    /// Take the accumulated buffer. Writer remains usable (buffer is replaced with new empty).
    pub fn take_buffer(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Default for H2Writer {
    fn default() -> Self {
        Self::new()
    }
}

use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::http::hpack;
use crate::protocol::http::request::Headers;
use crate::router::ResponseWriter;

/// The response side of one HTTP/2 stream: buffers what the handler writes, then on
/// `finish()` sniffs/fills headers, HPACK-encodes them, and fragments the body into
/// DATA frames onto the connection's outbound channel. See 4.H: buffering the whole
/// body (rather than emitting HEADERS on the handler's first `write()` call) keeps
/// the small-body Content-Length heuristic accurate and matches this crate's 1.1
/// writer, which does the same.
pub struct H2ResponseWriter {
    stream_id: u32,
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    outbound: mpsc::UnboundedSender<Bytes>,
    max_frame_size: usize,
}

impl H2ResponseWriter {
    pub fn new(stream_id: u32, outbound: mpsc::UnboundedSender<Bytes>, max_frame_size: usize) -> Self {
        Self {
            stream_id,
            status: 200,
            headers: Headers::new(),
            body: Vec::new(),
            outbound,
            max_frame_size,
        }
    }

    /// Flush the response: HEADERS frame (sniffed content-type, small-body content-length)
    /// followed by the body fragmented into DATA frames, the last carrying END_STREAM.
    pub async fn finish(self) -> Result<()> {
        let Self {
            stream_id,
            status,
            mut headers,
            body,
            outbound,
            max_frame_size,
        } = self;

        if !headers.contains("content-type") && !body.is_empty() {
            headers.append(
                "content-type",
                crate::protocol::http::sniff::sniff_content_type(&body),
            );
        }
        if !headers.contains("content-length")
            && body.len() < crate::protocol::http::sniff::SMALL_BODY_CONTENT_LENGTH_THRESHOLD
        {
            headers.append("content-length", &body.len().to_string());
        }

        let status_str = status.to_string();
        let mut fields: Vec<(&str, &str)> = vec![(":status", status_str.as_str())];
        for (name, value) in headers.iter() {
            fields.push((name, value));
        }
        let block = hpack::encode(&fields);

        // The encoder's output fits in one frame for nearly every response in this profile;
        // split into HEADERS + CONTINUATION only when it doesn't (see 4.H).
        if block.len() <= max_frame_size {
            let mut w = H2Writer::new();
            w.write_headers(stream_id, &block, false, true)
                .map_err(crate::error::HttpError::IoOther)?;
            let _ = outbound.send(w.take_buffer());
        } else {
            let mut chunks = block.chunks(max_frame_size);
            let first = chunks.next().unwrap_or(&[]);
            let mut w = H2Writer::new();
            w.write_headers(stream_id, first, false, false)
                .map_err(crate::error::HttpError::IoOther)?;
            let _ = outbound.send(w.take_buffer());
            let remaining: Vec<&[u8]> = chunks.collect();
            let last_index = remaining.len().saturating_sub(1);
            for (i, fragment) in remaining.iter().enumerate() {
                let end_headers = i == last_index;
                let mut w = H2Writer::new();
                w.write_continuation(stream_id, fragment, end_headers)
                    .map_err(crate::error::HttpError::IoOther)?;
                let _ = outbound.send(w.take_buffer());
            }
        }

        // Always terminate with a DATA frame carrying END_STREAM, even an empty one,
        // rather than folding END_STREAM onto HEADERS for a null body (see DESIGN.md).
        let mut offset = 0;
        loop {
            let end = (offset + max_frame_size).min(body.len());
            let is_last = end == body.len();
            let mut w = H2Writer::new();
            w.write_data(stream_id, &body[offset..end], is_last)
                .map_err(crate::error::HttpError::IoOther)?;
            let _ = outbound.send(w.take_buffer());
            offset = end;
            if is_last {
                break;
            }
        }
        Ok(())
    }
}

impl ResponseWriter for H2ResponseWriter {
    fn header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn write_header(&mut self, code: u16) {
        self.status = code;
    }

    fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }
}
