/*
 * mod.rs
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

//! HTTP/2: frame codec, preface/settings handshake, stream multiplexer, response writer.

pub mod frame;
pub mod handshake;
pub mod stream;
pub mod writer;

pub use frame::{Frame, DEFAULT_MAX_FRAME_SIZE};
pub use handshake::{read_initial_settings, read_preface, send_server_settings, PREFACE};
pub use stream::{run, ConnectionContext};
pub use writer::H2ResponseWriter;
