/*
 * router.rs
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

//! Route dispatch: longest-prefix-match router over a small set of route targets,
//! a local in-memory demo handler, and a caching reverse-proxy forwarder.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::cache::{is_cacheable, Cache, CacheEntry, Fingerprint, MethodKey};
use crate::config::RouteConfig;
use crate::protocol::http::forward;
use crate::protocol::http::request::Request;

/// Handler-facing response sink. HTTP/1.1 and HTTP/2 each provide their own implementation
/// that serializes onto the wire in their own framing.
pub trait ResponseWriter {
    fn header(&mut self, name: &str, value: &str);
    fn write_header(&mut self, code: u16);
    fn write(&mut self, data: &[u8]);
}

pub trait Router: Send + Sync {
    fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request);
}

enum RouteTarget {
    Local(NotesHandler),
    Proxy(ForwardHandler),
}

pub struct PrefixRouter {
    routes: Vec<(String, RouteTarget)>,
}

impl PrefixRouter {
    pub fn from_config(routes: &[RouteConfig], cache: Option<Cache>) -> Self {
        let mut built: Vec<(String, RouteTarget)> = routes
            .iter()
            .map(|route| {
                let target = if route.target.eq_ignore_ascii_case("local") {
                    RouteTarget::Local(NotesHandler::new())
                } else {
                    RouteTarget::Proxy(ForwardHandler::new(route.target.clone(), cache.clone()))
                };
                (route.path.clone(), target)
            })
            .collect();
        // Longest-prefix-first: match the most specific route before a shorter shared prefix.
        built.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { routes: built }
    }

    fn find(&self, path: &str) -> Option<&RouteTarget> {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, target)| target)
    }
}

impl Router for PrefixRouter {
    fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request) {
        match self.find(request.path()) {
            Some(RouteTarget::Local(handler)) => handler.serve(writer, request),
            Some(RouteTarget::Proxy(handler)) => handler.serve(writer, request),
            None => {
                writer.write_header(404);
                writer.write(b"Not Found");
            }
        }
    }
}

/// Minimal demo consumer of the router interface: an in-memory note store keyed by id.
/// GET `/notes` lists ids, GET `/notes/<id>` fetches one, POST `/notes` creates one from
/// the request body and returns its id.
pub struct NotesHandler {
    notes: Mutex<HashMap<String, String>>,
    next_id: Mutex<u64>,
}

impl NotesHandler {
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request) {
        use crate::protocol::http::request::Method;

        let path = request.path();
        match request.method {
            Method::Get if path == "/notes" => {
                let notes = self.notes.lock().unwrap();
                let mut ids: Vec<&String> = notes.keys().collect();
                ids.sort();
                let body = ids
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                writer.write_header(200);
                writer.write(body.as_bytes());
            }
            Method::Get => {
                let id = path.trim_start_matches("/notes/");
                let notes = self.notes.lock().unwrap();
                match notes.get(id) {
                    Some(body) => {
                        writer.write_header(200);
                        writer.write(body.as_bytes());
                    }
                    None => {
                        writer.write_header(404);
                        writer.write(b"no such note");
                    }
                }
            }
            Method::Post if path == "/notes" => {
                let mut next_id = self.next_id.lock().unwrap();
                let id = next_id.to_string();
                *next_id += 1;
                let body = String::from_utf8_lossy(&request.body).into_owned();
                self.notes.lock().unwrap().insert(id.clone(), body);
                writer.header("Location", &format!("/notes/{}", id));
                writer.write_header(201);
                writer.write(id.as_bytes());
            }
            _ => {
                writer.write_header(405);
                writer.write(b"Method Not Allowed");
            }
        }
    }
}

impl Default for NotesHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards requests to an upstream `host:port` target, consulting the response cache
/// first for cache-eligible methods.
pub struct ForwardHandler {
    target: String,
    cache: Option<Cache>,
}

impl ForwardHandler {
    pub fn new(target: String, cache: Option<Cache>) -> Self {
        Self { target, cache }
    }

    fn serve(&self, writer: &mut dyn ResponseWriter, request: &Request) {
        let fingerprint = Fingerprint {
            method: MethodKey::from(request.method),
            url: request.url.clone(),
            request_uri: request.url.clone(),
        };
        let cacheable = is_cacheable(request.method) && self.cache.is_some();

        if cacheable {
            if let Some(cache) = &self.cache {
                if let Some(entry) = block_on(cache.lookup(&fingerprint)) {
                    write_cached(writer, &entry);
                    return;
                }
            }
        }

        match block_on(forward::forward(&self.target, request)) {
            Ok(response) => {
                if cacheable {
                    if let Some(cache) = &self.cache {
                        let entry = CacheEntry::new(
                            response.status,
                            response.headers.clone(),
                            response.body.clone(),
                        );
                        block_on(cache.insert(fingerprint, entry));
                    }
                }
                writer.write_header(response.status);
                for (name, value) in &response.headers {
                    writer.header(name, value);
                }
                writer.write(&response.body);
            }
            Err(error) => {
                tracing::warn!(%error, target = %self.target, "upstream forward failed");
                writer.write_header(502);
                writer.write(b"Bad Gateway");
            }
        }
    }
}

fn write_cached(writer: &mut dyn ResponseWriter, entry: &CacheEntry) {
    writer.write_header(entry.status);
    for (name, value) in &entry.headers {
        writer.header(name, value);
    }
    writer.write(&entry.body);
}

/// `Router::serve` is synchronous (the trait is shared across the 1.1 and /2 writer paths, neither
/// of which wants to thread an executor handle through `dyn Router`); forwarding and cache access
/// are async, so the demo `ForwardHandler` blocks the current worker thread on them via a fresh
/// single-threaded runtime. A production router would take an async `serve`; matching the
/// synchronous trait shape the spec names was the deliberate tradeoff here (see DESIGN.md).
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}
