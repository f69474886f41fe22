//! Permissive coordinate parsing and axis-order repair.
//!
//! Upstream records are untrusted: coordinates arrive as numbers, as strings with
//! either decimal separator, blank, or missing, and some sources emit `lat,lng`
//! instead of `lng,lat`. Nothing here fails loudly; an unusable pair is `None`.

use std::collections::HashMap;

use crate::geo::{LngLat, looks_like_lat, looks_like_lng};

/// Default cap on memoized pairs before the cache is flushed.
pub const DEFAULT_NORMALIZER_CAPACITY: usize = 16_384;

/// A single coordinate value as it appeared on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCoord {
    Missing,
    Number(f64),
    Text(String),
}

impl RawCoord {
    fn key(&self) -> KeyPart {
        match self {
            RawCoord::Missing => KeyPart::Missing,
            RawCoord::Number(n) => KeyPart::Number(n.to_bits()),
            RawCoord::Text(s) => KeyPart::Text(s.clone()),
        }
    }
}

impl From<f64> for RawCoord {
    fn from(n: f64) -> Self {
        RawCoord::Number(n)
    }
}

impl From<&str> for RawCoord {
    fn from(s: &str) -> Self {
        RawCoord::Text(s.to_string())
    }
}

/// Parses one coordinate, treating the first comma as a decimal separator.
pub fn parse_coord(raw: &RawCoord) -> Option<f64> {
    let n = match raw {
        RawCoord::Missing => return None,
        RawCoord::Number(n) => *n,
        RawCoord::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.replacen(',', ".", 1).trim().parse::<f64>().ok()?
        }
    };
    n.is_finite().then_some(n)
}

/// Turns a raw `(lng, lat)` pair into a plausible position.
///
/// If the pair as given is implausible but the swapped pair is plausible, the
/// axes are swapped. If neither orientation is plausible the pair is rejected.
pub fn normalize_pair(lng: &RawCoord, lat: &RawCoord) -> Option<LngLat> {
    let p = LngLat::new(parse_coord(lng)?, parse_coord(lat)?);
    if p.is_plausible() {
        return Some(p);
    }
    let swapped = p.swapped();
    if looks_like_lng(swapped.lng) && looks_like_lat(swapped.lat) {
        return Some(swapped);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Missing,
    Number(u64),
    Text(String),
}

/// Memoizing wrapper around [`normalize_pair`].
///
/// The same records are renormalized on every refetch, so results are cached by
/// the raw input pair. The cache is flushed wholesale once it reaches capacity.
#[derive(Debug)]
pub struct CoordinateNormalizer {
    cache: HashMap<(KeyPart, KeyPart), Option<LngLat>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for CoordinateNormalizer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NORMALIZER_CAPACITY)
    }
}

impl CoordinateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn normalize(&mut self, lng: &RawCoord, lat: &RawCoord) -> Option<LngLat> {
        let key = (lng.key(), lat.key());
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return *cached;
        }
        self.misses += 1;
        let result = normalize_pair(lng, lat);
        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        self.cache.insert(key, result);
        result
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
