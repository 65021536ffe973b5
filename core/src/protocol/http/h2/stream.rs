/*
 * stream.rs
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

//! HTTP/2 stream multiplexer: the reader-owned per-stream state machine and the
//! connection-level loop that drives it.
//!
//! The reader advances each stream's assembler in place as frames arrive and
//! spawns the handler task exactly once, the moment the assembler reaches
//! `HalfClosedRemote` — no channel-liveness probe, no handler polling a queue
//! for a request that may never fully arrive.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, Mutex};

use crate::error::{HttpError, Result};
use crate::protocol::http::byte_reader::ByteReader;
use crate::protocol::http::hpack::{self, HeaderField};
use crate::protocol::http::request::{Headers, Method, Request};
use crate::router::Router;

use super::frame::{self, parse_frame, serialize_frame, Frame};
use super::writer::H2ResponseWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    OpenContinuation,
    OpenData,
    HalfClosedRemote,
    Closed,
}

struct StreamAssembler {
    state: StreamState,
    header_block: BytesMut,
    end_stream_pending: bool,
    request: Option<Request>,
}

impl StreamAssembler {
    fn new() -> Self {
        Self {
            state: StreamState::Idle,
            header_block: BytesMut::new(),
            end_stream_pending: false,
            request: None,
        }
    }
}

/// Shared, per-connection collaborators every stream handler needs.
pub struct ConnectionContext {
    pub hpack: Arc<Mutex<hpack::Decoder>>,
    pub outbound: mpsc::UnboundedSender<Bytes>,
    pub router: Arc<dyn Router>,
    pub max_frame_size: usize,
    pub remote_addr: String,
}

/// Drive the multiplexer loop until the connection closes or a protocol error occurs.
pub async fn run<R: AsyncRead + Unpin + Send + 'static>(
    reader: &mut ByteReader<R>,
    ctx: Arc<ConnectionContext>,
) -> Result<()> {
    let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();
    loop {
        let frame = parse_frame(reader, ctx.max_frame_size).await?;
        if frame.stream_id == 0 {
            handle_connection_frame(&frame, &ctx)?;
            continue;
        }
        handle_stream_frame(&mut streams, frame, &ctx).await?;
    }
}

fn handle_connection_frame(frame: &Frame, ctx: &ConnectionContext) -> Result<()> {
    match frame.frame_type {
        frame::TYPE_SETTINGS => {
            if !frame.ack() {
                let ack = serialize_frame(frame::TYPE_SETTINGS, frame::FLAG_ACK, 0, &[]);
                let _ = ctx.outbound.send(ack);
            }
            Ok(())
        }
        frame::TYPE_PING => {
            if !frame.ack() {
                let ack = serialize_frame(frame::TYPE_PING, frame::FLAG_ACK, 0, &frame.payload);
                let _ = ctx.outbound.send(ack);
            }
            Ok(())
        }
        frame::TYPE_WINDOW_UPDATE | frame::TYPE_GOAWAY => Ok(()),
        _ => Ok(()),
    }
}

async fn handle_stream_frame(
    streams: &mut HashMap<u32, StreamAssembler>,
    frame: Frame,
    ctx: &Arc<ConnectionContext>,
) -> Result<()> {
    let stream_id = frame.stream_id;

    if matches!(streams.get(&stream_id), Some(a) if a.state == StreamState::Closed) {
        return Ok(());
    }

    // While any stream's header block is still open, only a CONTINUATION for that same
    // stream may follow — no other frame, on that stream or any other, is valid until
    // END_HEADERS (spec §4.G: no interleaving of header blocks).
    if let Some(open_id) = streams
        .iter()
        .find(|(_, a)| a.state == StreamState::OpenContinuation)
        .map(|(id, _)| *id)
    {
        let is_matching_continuation = frame.frame_type == frame::TYPE_CONTINUATION && stream_id == open_id;
        if !is_matching_continuation {
            return Err(HttpError::Http2Protocol(
                "frame interleaved with an open header block on another stream".into(),
            ));
        }
    }

    match frame.frame_type {
        frame::TYPE_HEADERS => {
            let assembler = streams.entry(stream_id).or_insert_with(StreamAssembler::new);
            let fragment = strip_headers_padding(&frame)?;
            assembler.header_block.extend_from_slice(&fragment);
            assembler.end_stream_pending = frame.end_stream();
            if frame.end_headers() {
                finish_headers(stream_id, assembler, ctx).await?;
            } else {
                assembler.state = StreamState::OpenContinuation;
            }
        }
        frame::TYPE_CONTINUATION => {
            if frame.end_stream() {
                return Err(HttpError::Http2Protocol(
                    "CONTINUATION frame must not carry END_STREAM".into(),
                ));
            }
            let assembler = streams.get_mut(&stream_id).ok_or_else(|| {
                HttpError::Http2Protocol("CONTINUATION for unknown stream".into())
            })?;
            if assembler.state != StreamState::OpenContinuation {
                return Err(HttpError::Http2Protocol(
                    "CONTINUATION received outside header block".into(),
                ));
            }
            assembler.header_block.extend_from_slice(&frame.payload);
            if frame.end_headers() {
                finish_headers(stream_id, assembler, ctx).await?;
            }
        }
        frame::TYPE_DATA => {
            let assembler = streams
                .get_mut(&stream_id)
                .ok_or_else(|| HttpError::Http2Protocol("DATA for unknown stream".into()))?;
            let chunk = strip_data_padding(&frame)?;
            if let Some(request) = assembler.request.as_mut() {
                request.body.extend_from_slice(&chunk);
            }
            if frame.end_stream() {
                assembler.state = StreamState::HalfClosedRemote;
                dispatch(stream_id, assembler, ctx);
            } else {
                assembler.state = StreamState::OpenData;
            }
        }
        frame::TYPE_PRIORITY | frame::TYPE_WINDOW_UPDATE | frame::TYPE_RST_STREAM => {}
        _ => {}
    }
    Ok(())
}

/// Strip the pad-length octet and trailing pad octets from a padded HEADERS frame,
/// and the priority octets when PRIORITY is set, leaving only the header block fragment.
fn strip_headers_padding(frame: &Frame) -> Result<Bytes> {
    let mut payload = frame.payload.clone();
    if frame.padded() {
        if payload.is_empty() {
            return Err(HttpError::Http2Protocol("PADDED frame missing pad length".into()));
        }
        let pad_len = payload[0] as usize;
        payload = payload.slice(1..);
        if pad_len >= payload.len() {
            return Err(HttpError::Http2Protocol(
                "padding length exceeds frame payload".into(),
            ));
        }
        let end = payload.len() - pad_len;
        payload = payload.slice(0..end);
    }
    if frame.priority() {
        if payload.len() < 5 {
            return Err(HttpError::Http2Protocol("HEADERS missing priority octets".into()));
        }
        payload = payload.slice(5..);
    }
    Ok(payload)
}

fn strip_data_padding(frame: &Frame) -> Result<Bytes> {
    let mut payload = frame.payload.clone();
    if frame.padded() {
        if payload.is_empty() {
            return Err(HttpError::Http2Protocol("PADDED frame missing pad length".into()));
        }
        let pad_len = payload[0] as usize;
        payload = payload.slice(1..);
        if pad_len >= payload.len() {
            return Err(HttpError::Http2Protocol(
                "padding length exceeds frame payload".into(),
            ));
        }
        let end = payload.len() - pad_len;
        payload = payload.slice(0..end);
    }
    Ok(payload)
}

async fn finish_headers(
    stream_id: u32,
    assembler: &mut StreamAssembler,
    ctx: &Arc<ConnectionContext>,
) -> Result<()> {
    let fields = {
        let decoder = ctx.hpack.lock().await;
        decoder.decode(&assembler.header_block)?
    };
    assembler.header_block.clear();
    assembler.request = Some(build_request(fields, &ctx.remote_addr)?);

    if assembler.end_stream_pending {
        assembler.state = StreamState::HalfClosedRemote;
        dispatch(stream_id, assembler, ctx);
    } else {
        assembler.state = StreamState::OpenData;
    }
    Ok(())
}

fn build_request(fields: Vec<HeaderField>, remote_addr: &str) -> Result<Request> {
    let mut method = Method::Other;
    let mut method_raw = String::new();
    let mut path = String::new();
    let mut scheme = "https".to_string();
    let mut authority = String::new();
    let mut headers = Headers::new();

    for field in fields {
        match field.name.as_str() {
            ":method" => {
                let (m, raw) = Method::parse(&field.value);
                method = m;
                method_raw = raw.to_string();
            }
            ":path" => path = field.value,
            ":scheme" => scheme = field.value,
            ":authority" => authority = field.value,
            name if name.starts_with(':') => {}
            name => headers.append_split(name, &field.value),
        }
    }

    if method_raw.is_empty() {
        return Err(HttpError::Http2Protocol("missing :method pseudo-header".into()));
    }

    let mut request = Request::new(method, method_raw, path);
    request.scheme = scheme;
    request.host = authority.clone();
    if let Some(h) = headers.get_first("content-length") {
        request.content_length = h.trim().parse::<u64>().ok();
    }
    request.headers = headers;
    request.remote_addr = remote_addr.to_string();
    Ok(request)
}

fn dispatch(stream_id: u32, assembler: &mut StreamAssembler, ctx: &Arc<ConnectionContext>) {
    assembler.state = StreamState::Closed;
    let request = match assembler.request.take() {
        Some(r) => r,
        None => return,
    };
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let mut writer = H2ResponseWriter::new(stream_id, ctx.outbound.clone(), ctx.max_frame_size);
        ctx.router.serve(&mut writer, &request);
        if let Err(error) = writer.finish().await {
            tracing::warn!(%error, stream_id, "failed to flush HTTP/2 response");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ResponseWriter;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EchoRouter {
        served: AtomicBool,
    }

    impl Router for EchoRouter {
        fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request) {
            self.served.store(true, Ordering::SeqCst);
            writer.write_header(200);
            writer.write(request.path().as_bytes());
        }
    }

    fn headers_frame(stream_id: u32, fields: &[(&str, &str)], end_stream: bool) -> Bytes {
        let block = hpack::encode(fields);
        let flags = frame::FLAG_END_HEADERS | if end_stream { frame::FLAG_END_STREAM } else { 0 };
        serialize_frame(frame::TYPE_HEADERS, flags, stream_id, &block)
    }

    #[tokio::test]
    async fn single_stream_get_dispatches_and_closes() {
        let wire = headers_frame(1, &[(":method", "GET"), (":path", "/hi"), (":scheme", "https")], true);
        let mut reader = ByteReader::new(Cursor::new(wire.to_vec()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(ConnectionContext {
            hpack: Arc::new(Mutex::new(hpack::Decoder::new())),
            outbound: tx,
            router: Arc::new(EchoRouter { served: AtomicBool::new(false) }),
            max_frame_size: frame::DEFAULT_MAX_FRAME_SIZE,
            remote_addr: "127.0.0.1:1".into(),
        });

        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();
        let frame = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, frame, &ctx).await.unwrap();
        assert_eq!(streams.get(&1).unwrap().state, StreamState::Closed);

        let headers_out = rx.recv().await.unwrap();
        assert_eq!(headers_out[3], frame::TYPE_HEADERS);
        let data_out = rx.recv().await.unwrap();
        assert_eq!(data_out[3], frame::TYPE_DATA);
    }

    #[tokio::test]
    async fn continuation_with_end_stream_is_protocol_error() {
        let block = hpack::encode(&[(":method", "GET")]);
        let headers = serialize_frame(frame::TYPE_HEADERS, 0, 3, &block);
        let cont = serialize_frame(
            frame::TYPE_CONTINUATION,
            frame::FLAG_END_HEADERS | frame::FLAG_END_STREAM,
            3,
            &[],
        );
        let mut data = headers.to_vec();
        data.extend_from_slice(&cont);
        let mut reader = ByteReader::new(Cursor::new(data));
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(ConnectionContext {
            hpack: Arc::new(Mutex::new(hpack::Decoder::new())),
            outbound: tx,
            router: Arc::new(EchoRouter { served: AtomicBool::new(false) }),
            max_frame_size: frame::DEFAULT_MAX_FRAME_SIZE,
            remote_addr: "127.0.0.1:1".into(),
        });
        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();
        let f1 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f1, &ctx).await.unwrap();
        let f2 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        let err = handle_stream_frame(&mut streams, f2, &ctx).await.unwrap_err();
        assert!(matches!(err, HttpError::Http2Protocol(_)));
    }

    #[test]
    fn oversized_padding_is_rejected() {
        let payload = Bytes::from_static(&[10, 1, 2]);
        let frame = Frame {
            frame_type: frame::TYPE_HEADERS,
            flags: frame::FLAG_PADDED,
            stream_id: 1,
            payload,
        };
        assert!(strip_headers_padding(&frame).is_err());
    }

    #[test]
    fn data_padding_boundary_matches_headers_padding_boundary() {
        // Pad length equal to the remaining payload (no room for any actual data) is
        // rejected the same way on both paths.
        let payload = Bytes::from_static(&[2, 1, 2]);
        let frame = Frame {
            frame_type: frame::TYPE_DATA,
            flags: frame::FLAG_PADDED,
            stream_id: 1,
            payload,
        };
        assert!(strip_data_padding(&frame).is_err());
    }

    fn test_ctx() -> (Arc<ConnectionContext>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(ConnectionContext {
            hpack: Arc::new(Mutex::new(hpack::Decoder::new())),
            outbound: tx,
            router: Arc::new(EchoRouter { served: AtomicBool::new(false) }),
            max_frame_size: frame::DEFAULT_MAX_FRAME_SIZE,
            remote_addr: "127.0.0.1:1".into(),
        });
        (ctx, rx)
    }

    #[tokio::test]
    async fn second_headers_on_same_stream_during_open_continuation_is_protocol_error() {
        let block = hpack::encode(&[(":method", "GET")]);
        let first = serialize_frame(frame::TYPE_HEADERS, 0, 3, &block);
        let second = serialize_frame(frame::TYPE_HEADERS, frame::FLAG_END_HEADERS, 3, &block);
        let (ctx, _rx) = test_ctx();
        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();

        let mut reader = ByteReader::new(Cursor::new(first.to_vec()));
        let f1 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f1, &ctx).await.unwrap();
        assert_eq!(streams.get(&3).unwrap().state, StreamState::OpenContinuation);

        let mut reader = ByteReader::new(Cursor::new(second.to_vec()));
        let f2 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        let err = handle_stream_frame(&mut streams, f2, &ctx).await.unwrap_err();
        assert!(matches!(err, HttpError::Http2Protocol(_)));
    }

    #[tokio::test]
    async fn headers_on_another_stream_during_open_continuation_is_protocol_error() {
        let block = hpack::encode(&[(":method", "GET")]);
        let first = serialize_frame(frame::TYPE_HEADERS, 0, 3, &block);
        let other = serialize_frame(frame::TYPE_HEADERS, frame::FLAG_END_HEADERS, 5, &block);
        let (ctx, _rx) = test_ctx();
        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();

        let mut reader = ByteReader::new(Cursor::new(first.to_vec()));
        let f1 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f1, &ctx).await.unwrap();

        let mut reader = ByteReader::new(Cursor::new(other.to_vec()));
        let f2 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        let err = handle_stream_frame(&mut streams, f2, &ctx).await.unwrap_err();
        assert!(matches!(err, HttpError::Http2Protocol(_)));
    }

    #[tokio::test]
    async fn data_while_header_block_is_open_is_protocol_error() {
        let block = hpack::encode(&[(":method", "GET")]);
        let headers = serialize_frame(frame::TYPE_HEADERS, 0, 3, &block);
        let data = serialize_frame(frame::TYPE_DATA, frame::FLAG_END_STREAM, 3, b"hi");
        let (ctx, _rx) = test_ctx();
        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();

        let mut reader = ByteReader::new(Cursor::new(headers.to_vec()));
        let f1 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f1, &ctx).await.unwrap();

        let mut reader = ByteReader::new(Cursor::new(data.to_vec()));
        let f2 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        let err = handle_stream_frame(&mut streams, f2, &ctx).await.unwrap_err();
        assert!(matches!(err, HttpError::Http2Protocol(_)));
    }

    #[tokio::test]
    async fn continuation_for_the_open_stream_still_proceeds_normally() {
        let block = hpack::encode(&[(":method", "GET"), (":path", "/x"), (":scheme", "https")]);
        let mid = (block.len() / 2).max(1).min(block.len());
        let (first_half, second_half) = block.split_at(mid);
        let headers = serialize_frame(frame::TYPE_HEADERS, frame::FLAG_END_STREAM, 3, first_half);
        let cont = serialize_frame(frame::TYPE_CONTINUATION, frame::FLAG_END_HEADERS, 3, second_half);
        let (ctx, mut rx) = test_ctx();
        let mut streams: HashMap<u32, StreamAssembler> = HashMap::new();

        let mut reader = ByteReader::new(Cursor::new(headers.to_vec()));
        let f1 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f1, &ctx).await.unwrap();
        assert_eq!(streams.get(&3).unwrap().state, StreamState::OpenContinuation);

        let mut reader = ByteReader::new(Cursor::new(cont.to_vec()));
        let f2 = parse_frame(&mut reader, ctx.max_frame_size).await.unwrap();
        handle_stream_frame(&mut streams, f2, &ctx).await.unwrap();
        assert_eq!(streams.get(&3).unwrap().state, StreamState::Closed);

        let headers_out = rx.recv().await.unwrap();
        assert_eq!(headers_out[3], frame::TYPE_HEADERS);
    }
}
