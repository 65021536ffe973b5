/*
 * handshake.rs
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

//! Connection preface and initial SETTINGS exchange (RFC 7540 §3.5, §6.5).

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{HttpError, Result};
use crate::protocol::http::byte_reader::ByteReader;

use super::frame::{self, parse_frame, serialize_frame, Frame};

pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Consume the 24-octet client preface. `BadPreface` on any mismatch.
pub async fn read_preface<R: AsyncRead + Unpin>(reader: &mut ByteReader<R>) -> Result<()> {
    let got = reader.read_exact(PREFACE.len()).await.map_err(|e| match e {
        HttpError::IoEof => HttpError::BadPreface,
        other => other,
    })?;
    if &got[..] != PREFACE {
        return Err(HttpError::BadPreface);
    }
    Ok(())
}

/// Consume the peer's initial SETTINGS frame: must be type SETTINGS, stream 0,
/// payload length a multiple of 6 octets.
pub async fn read_initial_settings<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
    max_frame_size: usize,
) -> Result<Frame> {
    let settings = parse_frame(reader, max_frame_size).await?;
    if settings.frame_type != frame::TYPE_SETTINGS || settings.stream_id != 0 {
        return Err(HttpError::Http2Protocol(
            "expected SETTINGS frame as first frame after preface".into(),
        ));
    }
    if settings.payload.len() % 6 != 0 {
        return Err(HttpError::Http2Protocol(
            "SETTINGS payload length not a multiple of 6".into(),
        ));
    }
    Ok(settings)
}

/// Send our own SETTINGS frame (advertising HEADER_TABLE_SIZE and MAX_FRAME_SIZE)
/// followed by a SETTINGS ACK for the peer's initial frame.
pub async fn send_server_settings<W: AsyncWrite + Unpin>(
    writer: &mut W,
    max_frame_size: u32,
) -> Result<()> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&frame::SETTINGS_HEADER_TABLE_SIZE.to_be_bytes());
    payload.extend_from_slice(&4096u32.to_be_bytes());
    payload.extend_from_slice(&frame::SETTINGS_MAX_FRAME_SIZE.to_be_bytes());
    payload.extend_from_slice(&max_frame_size.to_be_bytes());

    let settings = serialize_frame(frame::TYPE_SETTINGS, 0, 0, &payload);
    writer.write_all(&settings).await?;

    let ack = serialize_frame(frame::TYPE_SETTINGS, frame::FLAG_ACK, 0, &[]);
    writer.write_all(&ack).await?;
    writer.flush().await?;
    Ok(())
}
