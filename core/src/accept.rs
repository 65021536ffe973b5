/*
 * accept.rs
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

//! Accept loop (4.L): blacklist check ahead of the TLS handshake, then hand the
//! negotiated ALPN protocol and stream off to the connection dispatcher.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{HttpError, Result};
use crate::net;
use crate::protocol::http::dispatch;
use crate::router::Router;

/// Parse the configured blacklist entries into `IpAddr`s up front, so a malformed
/// entry fails fast at startup rather than on the first connection from that peer.
pub fn parse_blacklist(entries: &[String]) -> Result<Vec<IpAddr>> {
    entries
        .iter()
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .map_err(|_| HttpError::Config(format!("invalid blacklist entry: {:?}", entry)))
        })
        .collect()
}

/// Bind `port`, then loop accepting connections until an unrecoverable socket error.
/// Each connection is checked against `blacklist` before any TLS work begins (mirroring
/// the source's `closeIfBlacklisted`, which runs prior to the handshake), then the TLS
/// handshake runs and the negotiated ALPN protocol is read back before dispatch.
pub async fn run(
    port: u16,
    tls_config: Arc<rustls::ServerConfig>,
    blacklist: Vec<IpAddr>,
    router: Arc<dyn Router>,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let acceptor = net::acceptor(tls_config);

    loop {
        let (socket, peer_addr) = listener.accept().await?;

        if blacklist.contains(&peer_addr.ip()) {
            tracing::warn!(peer = %peer_addr, "rejecting connection from blacklisted peer");
            continue;
        }

        let acceptor = acceptor.clone();
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(socket).await {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(%error, peer = %peer_addr, "TLS handshake failed");
                    return;
                }
            };
            let alpn = tls_stream
                .get_ref()
                .1
                .alpn_protocol()
                .map(|protocol| protocol.to_vec());
            dispatch::dispatch(tls_stream, alpn, peer_addr.to_string(), router).await;
        });
    }
}
