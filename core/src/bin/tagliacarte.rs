/*
 * tagliacarte.rs
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

//! CLI entry point (4.P): load and validate config, init logging, load TLS material,
//! build the router and cache, then run the accept loop until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use tagliacarte::{accept, cache::Cache, config::Config, logging, net, router::PrefixRouter};

#[derive(Parser, Debug)]
#[command(name = "tagliacarte", about = "TLS-terminating HTTP/1.1 and HTTP/2 reverse proxy")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;
    config.validate().context("validating configuration")?;

    let _logging_guard = logging::init(&config.logger).context("initializing logging")?;

    let tls_config = net::load_server_config(&config.server.cert_path, &config.server.key_path)
        .context("loading TLS material")?;

    let cache = if config.caching.enabled {
        let cache = Cache::new(Duration::from_secs(config.caching.ttl));
        tokio::spawn({
            let cache = cache.clone();
            async move { cache.run_sweep().await }
        });
        Some(cache)
    } else {
        None
    };

    let router = Arc::new(PrefixRouter::from_config(&config.server.routes, cache));
    let blacklist = accept::parse_blacklist(&config.blacklist).context("parsing blacklist")?;

    tracing::info!(port = config.server.port, "starting tagliacarte");

    tokio::select! {
        result = accept::run(config.server.port, tls_config, blacklist, router) => {
            result.context("accept loop terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}
