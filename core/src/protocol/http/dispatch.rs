/*
 * dispatch.rs
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

//! Connection dispatcher: picks the HTTP/1.1 keep-alive loop or the HTTP/2 handshake
//! and stream multiplexer based on the ALPN protocol the accept loop negotiated.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::protocol::http::byte_reader::ByteReader;
use crate::protocol::http::h1;
use crate::protocol::http::h2::{self, ConnectionContext};
use crate::protocol::http::hpack;
use crate::protocol::http::request::Headers;
use crate::protocol::http::response::Response;
use crate::router::{ResponseWriter, Router};

/// Buffers what a handler writes so the HTTP/1.1 writer can sniff content-type and
/// size the response before anything hits the wire, matching the HTTP/2 writer's
/// whole-body buffering in 4.H.
struct BufferingWriter {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl BufferingWriter {
    fn new() -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(self.status);
        response.headers = self.headers;
        response.body = self.body;
        response
    }
}

impl ResponseWriter for BufferingWriter {
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

/// Drive one accepted connection to completion: dispatch by negotiated ALPN, run the
/// matching protocol loop, and log (without propagating) whatever ends the connection.
pub async fn dispatch<S>(stream: S, alpn: Option<Vec<u8>>, remote_addr: String, router: Arc<dyn Router>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    if alpn.as_deref() == Some(b"h2") {
        if let Err(error) = run_http2(read_half, write_half, remote_addr, router).await {
            tracing::warn!(%error, "HTTP/2 connection terminated");
        }
    } else {
        run_http1(read_half, write_half, remote_addr, router).await;
    }
}

/// HTTP/1.1 keep-alive loop (4.E/4.I/4.J): parse a request, serve it, write the response,
/// repeat until the parser says not to, or a parse/write error ends the connection.
async fn run_http1<R, W>(read_half: R, mut write_half: W, remote_addr: String, router: Arc<dyn Router>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = ByteReader::new(read_half);
    loop {
        match h1::parse(&mut reader).await {
            Ok((mut request, more_requests)) => {
                request.remote_addr = remote_addr.clone();
                let mut writer = BufferingWriter::new();
                router.serve(&mut writer, &request);
                let response = writer.into_response();
                if let Err(error) = h1::write_response(&mut write_half, response).await {
                    tracing::warn!(%error, "failed writing HTTP/1.1 response");
                    return;
                }
                if !more_requests {
                    return;
                }
            }
            Err(error) => {
                if error.is_chunked_encoding_error() {
                    let mut response = Response::new(400);
                    response.body = b"Bad Request".to_vec();
                    let _ = h1::write_response(&mut write_half, response).await;
                }
                return;
            }
        }
    }
}

/// HTTP/2 handshake (4.F) followed by the stream multiplexer (4.G/4.H): one writer task
/// drains the outbound frame channel while the reader drives `h2::run` on the caller's task.
async fn run_http2<R, W>(
    read_half: R,
    mut write_half: W,
    remote_addr: String,
    router: Arc<dyn Router>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = ByteReader::new(read_half);
    h2::read_preface(&mut reader).await?;
    h2::read_initial_settings(&mut reader, h2::DEFAULT_MAX_FRAME_SIZE).await?;
    h2::send_server_settings(&mut write_half, h2::DEFAULT_MAX_FRAME_SIZE as u32).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_half.write_all(&frame).await.is_err() {
                break;
            }
            if write_half.flush().await.is_err() {
                break;
            }
        }
    });

    let ctx = Arc::new(ConnectionContext {
        hpack: Arc::new(Mutex::new(hpack::Decoder::new())),
        outbound: tx,
        router,
        max_frame_size: h2::DEFAULT_MAX_FRAME_SIZE,
        remote_addr,
    });

    let result = h2::run(&mut reader, ctx).await;
    writer_task.abort();
    result
}
