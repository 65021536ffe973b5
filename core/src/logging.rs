/*
 * logging.rs
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

//! Tracing subscriber init: level from `LoggerConfig`, falling back to `RUST_LOG`,
//! fanned out to stderr and (if configured) a log file.

use tracing_subscriber::EnvFilter;

use crate::config::LoggerConfig;
use crate::error::{HttpError, Result};

/// Keeps the non-blocking file appender's worker guard alive for the process lifetime.
pub struct LoggingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

pub fn init(config: &LoggerConfig) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(LoggingGuard(None));
    }

    let path = std::path::Path::new(&config.file);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| HttpError::Config(format!("invalid logger file path {:?}", config.file)))?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .init();

    Ok(LoggingGuard(Some(guard)))
}
