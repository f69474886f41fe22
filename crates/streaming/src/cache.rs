use std::collections::BTreeMap;
use std::fmt;

use storage::KeyValueStore;

/// Prefix of the per-URL session mirror entries.
pub const SESSION_KEY_PREFIX: &str = "spotsData-";

pub fn session_key(url: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{url}")
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryBudget {
    pub max_bytes: usize,
}

impl MemoryBudget {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    last_used_tick: u64,
}

/// Response bodies keyed by request URL, bounded by a byte budget.
///
/// Notes on determinism:
/// - Entries are keyed in a `BTreeMap` for stable traversal order.
/// - Eviction is LRU by `last_used_tick`, with a tie-break by key ordering.
///
/// An optional mirror (the browser's session storage) survives page reloads;
/// memory misses fall through to it and successful reads are promoted back.
/// Mirror failures are logged and otherwise ignored.
pub struct ResponseCache {
    budget: MemoryBudget,
    used_bytes: usize,
    tick: u64,
    entries: BTreeMap<String, CacheEntry>,
    mirror: Option<Box<dyn KeyValueStore>>,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("budget", &self.budget)
            .field("used_bytes", &self.used_bytes)
            .field("entries", &self.entries.len())
            .field("mirrored", &self.mirror.is_some())
            .finish()
    }
}

impl ResponseCache {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget,
            used_bytes: 0,
            tick: 0,
            entries: BTreeMap::new(),
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Box<dyn KeyValueStore>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn get(&mut self, url: &str) -> Option<String> {
        self.tick += 1;
        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_used_tick = self.tick;
            return Some(entry.body.clone());
        }

        let mirror = self.mirror.as_ref()?;
        match mirror.get(&session_key(url)) {
            Ok(Some(body)) if !body.is_empty() => {
                self.insert_memory(url, body.clone());
                Some(body)
            }
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("session cache read failed: {err}");
                None
            }
        }
    }

    pub fn insert(&mut self, url: &str, body: String) {
        if let Some(mirror) = self.mirror.as_mut() {
            if let Err(err) = mirror.set(&session_key(url), &body) {
                tracing::warn!("session cache write failed: {err}");
            }
        }
        self.insert_memory(url, body);
    }

    fn insert_memory(&mut self, url: &str, body: String) {
        let bytes = body.len();
        if bytes > self.budget.max_bytes {
            tracing::debug!(
                "response for {url} exceeds cache budget: bytes={bytes} max={}",
                self.budget.max_bytes
            );
            return;
        }

        self.tick += 1;
        let entry = CacheEntry {
            body,
            last_used_tick: self.tick,
        };
        if let Some(old) = self.entries.insert(url.to_string(), entry) {
            self.used_bytes = self.used_bytes.saturating_sub(old.body.len());
        }
        self.used_bytes += bytes;
        self.evict_as_needed(url);
    }

    fn evict_as_needed(&mut self, protected: &str) {
        while self.used_bytes > self.budget.max_bytes {
            let candidate = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != protected)
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used_tick
                        .cmp(&eb.last_used_tick)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());

            let Some(key) = candidate else {
                return;
            };
            if let Some(old) = self.entries.remove(&key) {
                self.used_bytes = self.used_bytes.saturating_sub(old.body.len());
            }
        }
    }
}
