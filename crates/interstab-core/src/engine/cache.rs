use super::profile::MixPoint;
use std::collections::HashMap;

/// Hull samples of one mixing line, keyed by ratio.
///
/// Only valid for a single (oracle, entry pair) combination; a new search starts a new cache.
#[derive(Debug, Default, Clone)]
pub struct SampleCache {
    data: HashMap<u64, MixPoint>,
    hits: usize,
}

fn key(ratio: f64) -> u64 {
    (0.0 + ratio).to_bits()
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, ratio: f64) -> Option<&MixPoint> {
        let found = self.data.get(&key(ratio));
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn insert(&mut self, point: MixPoint) {
        self.data.insert(key(point.ratio), point);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
