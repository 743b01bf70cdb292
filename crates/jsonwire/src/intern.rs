//! A small, bounded intern cache for repeated short object names.
//!
//! Decoding a large document whose objects repeat the same member names
//! (UUID keys, column names) would otherwise allocate one owned string per
//! occurrence for duplicate detection and pointer rendering. The cache is
//! direct-mapped with 256 slots, keyed by a hash of the name's length and
//! its first and last eight bytes; collisions simply evict.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fxhash::FxHasher;

const SLOTS: usize = 256;
const MAX_LEN: usize = 128;

pub(crate) struct InternCache {
    slots: Vec<Option<Arc<str>>>,
}

impl Default for InternCache {
    fn default() -> Self {
        InternCache { slots: vec![None; SLOTS] }
    }
}

impl InternCache {
    /// Returns a shared copy of `name`, reusing a cached allocation when
    /// the same name was seen recently.
    pub(crate) fn intern(&mut self, name: &str) -> Arc<str> {
        if name.len() > MAX_LEN {
            return Arc::from(name);
        }
        let idx = slot_of(name.as_bytes());
        if let Some(cached) = &self.slots[idx] {
            if cached.as_ref() == name {
                return Arc::clone(cached);
            }
        }
        let fresh: Arc<str> = Arc::from(name);
        self.slots[idx] = Some(Arc::clone(&fresh));
        fresh
    }
}

fn slot_of(b: &[u8]) -> usize {
    let mut first = [0u8; 8];
    let mut last = [0u8; 8];
    let head = b.len().min(8);
    first[..head].copy_from_slice(&b[..head]);
    let tail = b.len().saturating_sub(8);
    last[..b.len() - tail].copy_from_slice(&b[tail..]);
    let mut h = FxHasher::default();
    b.len().hash(&mut h);
    first.hash(&mut h);
    last.hash(&mut h);
    (h.finish() as usize) % SLOTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_share_an_allocation() {
        let mut cache = InternCache::default();
        let a = cache.intern("id");
        let b = cache.intern("id");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn long_names_bypass_the_cache() {
        let mut cache = InternCache::default();
        let long = "x".repeat(MAX_LEN + 1);
        let a = cache.intern(&long);
        let b = cache.intern(&long);
        assert_eq!(a, b);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn collisions_evict() {
        let mut cache = InternCache::default();
        let a = cache.intern("alpha");
        for i in 0..10_000 {
            cache.intern(&format!("key{i}"));
        }
        let b = cache.intern("alpha");
        assert_eq!(a, b);
    }
}
