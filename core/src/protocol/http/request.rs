/*
 * request.rs
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

//! Request: method, URL, headers, body — assembled by the 1.1 parser or the /2 stream multiplexer.

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> (Self, &str) {
        match s {
            "GET" => (Method::Get, s),
            "POST" => (Method::Post, s),
            "PUT" => (Method::Put, s),
            "DELETE" => (Method::Delete, s),
            "HEAD" => (Method::Head, s),
            "OPTIONS" => (Method::Options, s),
            "PATCH" => (Method::Patch, s),
            _ => (Method::Other, s),
        }
    }
}

/// Case-insensitive header multimap preserving insertion order of values per name.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a value. Comma-separated input is split into separate entries, matching
    /// the HTTP/1.1 header multimap rule.
    pub fn append_split(&mut self, name: &str, value: &str) {
        for part in value.split(',') {
            let v = part.trim();
            if !v.is_empty() || value.is_empty() {
                self.entries.push((name.to_string(), v.to_string()));
            }
        }
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(self.entries.remove(pos).1)
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assembled HTTP request (from either the 1.1 parser or the /2 stream multiplexer).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub method_raw: String,
    /// The request target as it appeared on the wire (request-URI for HTTP/1.1, `:path` for /2).
    pub url: String,
    pub version_major: u8,
    pub version_minor: u8,
    pub host: String,
    pub scheme: String,
    pub headers: Headers,
    pub trailers: Headers,
    pub content_length: Option<u64>,
    pub transfer_encoding: Vec<String>,
    pub body: Vec<u8>,
    pub remote_addr: String,
}

impl Request {
    pub fn new(method: Method, method_raw: String, url: String) -> Self {
        Self {
            method,
            method_raw,
            url,
            version_major: 1,
            version_minor: 1,
            host: String::new(),
            scheme: "https".to_string(),
            headers: Headers::new(),
            trailers: Headers::new(),
            content_length: None,
            transfer_encoding: Vec::new(),
            body: Vec::new(),
            remote_addr: String::new(),
        }
    }

    /// Path component of `url` (everything before `?`).
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}
