/*
 * dispatch_integration.rs
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

//! End-to-end dispatcher coverage over an in-process duplex stream: no TLS, no real
//! network, exercising the same `dispatch()` entry point the accept loop hands a
//! negotiated connection to.

use std::sync::Arc;

use tagliacarte::config::RouteConfig;
use tagliacarte::protocol::http::dispatch;
use tagliacarte::router::PrefixRouter;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

fn notes_router() -> Arc<PrefixRouter> {
    Arc::new(PrefixRouter::from_config(
        &[RouteConfig {
            path: "/notes".to_string(),
            target: "local".to_string(),
        }],
        None,
    ))
}

#[tokio::test]
async fn http1_post_then_get_round_trips_through_the_notes_handler() {
    let (mut client, server) = duplex(8192);
    let router = notes_router();
    let task = tokio::spawn(dispatch::dispatch(server, None, "127.0.0.1:1".into(), router));

    client
        .write_all(b"POST /notes HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello")
        .await
        .unwrap();
    let mut buf = [0u8; 512];
    let n = client.read(&mut buf).await.unwrap();
    let created = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(created.starts_with("HTTP/1.1 201"));
    let id = created.rsplit("\r\n\r\n").next().unwrap().trim().to_string();

    client
        .write_all(format!("GET /notes/{} HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n", id).as_bytes())
        .await
        .unwrap();
    let n = client.read(&mut buf).await.unwrap();
    let fetched = String::from_utf8_lossy(&buf[..n]);
    assert!(fetched.starts_with("HTTP/1.1 200"));
    assert!(fetched.ends_with("hello"));

    drop(client);
    let _ = task.await;
}

#[tokio::test]
async fn http2_headers_and_data_round_trip_through_the_notes_handler() {
    use tagliacarte::protocol::http::h2::handshake::PREFACE;
    use tagliacarte::protocol::http::hpack;

    let (mut client, server) = duplex(8192);
    let router = notes_router();
    let task = tokio::spawn(dispatch::dispatch(
        server,
        Some(b"h2".to_vec()),
        "127.0.0.1:1".into(),
        router,
    ));

    client.write_all(PREFACE).await.unwrap();
    // Client's initial SETTINGS frame, empty (no parameters), stream 0.
    client
        .write_all(&[0, 0, 0, 0x4, 0, 0, 0, 0, 0])
        .await
        .unwrap();

    let block = hpack::encode(&[
        (":method", "POST"),
        (":path", "/notes"),
        (":scheme", "https"),
    ]);
    let mut headers_frame = Vec::new();
    let len = block.len();
    headers_frame.push((len >> 16) as u8);
    headers_frame.push((len >> 8) as u8);
    headers_frame.push(len as u8);
    headers_frame.push(0x1); // TYPE_HEADERS
    headers_frame.push(0x4); // END_HEADERS, not END_STREAM: body follows in DATA
    headers_frame.extend_from_slice(&1u32.to_be_bytes());
    headers_frame.extend_from_slice(&block);
    client.write_all(&headers_frame).await.unwrap();

    let mut data_frame = Vec::new();
    let body = b"hi there";
    data_frame.push(0);
    data_frame.push(0);
    data_frame.push(body.len() as u8);
    data_frame.push(0x0); // TYPE_DATA
    data_frame.push(0x1); // END_STREAM
    data_frame.extend_from_slice(&1u32.to_be_bytes());
    data_frame.extend_from_slice(body);
    client.write_all(&data_frame).await.unwrap();

    // Server's own SETTINGS + SETTINGS ACK.
    let mut discard = [0u8; 9 + 12 + 9];
    client.read_exact(&mut discard).await.unwrap();

    // Response HEADERS frame.
    let mut header = [0u8; 9];
    client.read_exact(&mut header).await.unwrap();
    let payload_len = ((header[0] as usize) << 16) | ((header[1] as usize) << 8) | header[2] as usize;
    assert_eq!(header[3], 0x1); // TYPE_HEADERS
    let mut payload = vec![0u8; payload_len];
    client.read_exact(&mut payload).await.unwrap();
    let decoder = hpack::Decoder::new();
    let fields = decoder.decode(&payload).unwrap();
    assert!(fields.iter().any(|f| f.name == ":status" && f.value == "201"));

    // Response DATA frame carrying the created note's id.
    let mut header = [0u8; 9];
    client.read_exact(&mut header).await.unwrap();
    assert_eq!(header[3], 0x0); // TYPE_DATA
    assert_eq!(header[4] & 0x1, 0x1); // END_STREAM
    let len = ((header[0] as usize) << 16) | ((header[1] as usize) << 8) | header[2] as usize;
    let mut body = vec![0u8; len];
    client.read_exact(&mut body).await.unwrap();
    assert!(!body.is_empty());

    drop(client);
    task.abort();
}
