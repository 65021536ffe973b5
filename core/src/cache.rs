/*
 * cache.rs
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

//! Fingerprint-keyed response cache with a background TTL sweep.
//!
//! Lookup takes a read lock and insert takes a write lock on the same map —
//! unlike the source this was distilled from, which locked for both halves of a
//! lookup-then-insert round trip under its read path, defeating the point of an
//! `RwLock`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::protocol::http::request::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub method: MethodKey,
    pub url: String,
    pub request_uri: String,
}

/// `Method` doesn't derive `Hash`/`Eq` (it wraps a free-form `Other` variant with no payload,
/// so the derive would be trivial, but keeping a dedicated cache key avoids coupling the
/// wire-protocol `Method` type to caching concerns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKey {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Other,
}

impl From<Method> for MethodKey {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => MethodKey::Get,
            Method::Post => MethodKey::Post,
            Method::Put => MethodKey::Put,
            Method::Delete => MethodKey::Delete,
            Method::Head => MethodKey::Head,
            Method::Options => MethodKey::Options,
            Method::Patch => MethodKey::Patch,
            Method::Other => MethodKey::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    cached_at: Instant,
}

impl CacheEntry {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            cached_at: Instant::now(),
        }
    }
}

/// GET/HEAD are the only cache-eligible methods (4.N).
pub fn is_cacheable(method: Method) -> bool {
    matches!(method, Method::Get | Method::Head)
}

struct Inner {
    map: RwLock<HashMap<Fingerprint, CacheEntry>>,
    ttl: Duration,
}

#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                map: RwLock::new(HashMap::new()),
                ttl,
            }),
        }
    }

    pub async fn lookup(&self, fp: &Fingerprint) -> Option<CacheEntry> {
        let map = self.inner.map.read().await;
        map.get(fp).cloned()
    }

    pub async fn insert(&self, fp: Fingerprint, entry: CacheEntry) {
        let mut map = self.inner.map.write().await;
        map.insert(fp, entry);
    }

    /// Runs until the process exits; intended to be spawned once per `Cache` instance.
    pub async fn run_sweep(&self) {
        let mut interval = tokio::time::interval(self.inner.ttl / 2);
        loop {
            interval.tick().await;
            let ttl = self.inner.ttl;
            let mut map = self.inner.map.write().await;
            map.retain(|_, entry| entry.cached_at.elapsed() <= ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(uri: &str) -> Fingerprint {
        Fingerprint {
            method: MethodKey::Get,
            url: uri.to_string(),
            request_uri: uri.to_string(),
        }
    }

    #[tokio::test]
    async fn miss_then_insert_then_hit() {
        let cache = Cache::new(Duration::from_secs(60));
        assert!(cache.lookup(&fp("/a")).await.is_none());
        cache
            .insert(fp("/a"), CacheEntry::new(200, vec![], b"hi".to_vec()))
            .await;
        let hit = cache.lookup(&fp("/a")).await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, b"hi");
    }

    #[test]
    fn only_get_and_head_are_cacheable() {
        assert!(is_cacheable(Method::Get));
        assert!(is_cacheable(Method::Head));
        assert!(!is_cacheable(Method::Post));
        assert!(!is_cacheable(Method::Delete));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_expired_entries() {
        let cache = Cache::new(Duration::from_millis(20));
        cache
            .insert(fp("/a"), CacheEntry::new(200, vec![], b"hi".to_vec()))
            .await;
        let sweeper = cache.clone();
        tokio::spawn(async move { sweeper.run_sweep().await });
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(cache.lookup(&fp("/a")).await.is_none());
    }
}
