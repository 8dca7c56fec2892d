//! Write-once caches for the values derived from an immutable packet or header.

use core::fmt;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use once_cell::sync::OnceCell;

/// Memoized derived values of an immutable packet or header.
///
/// Each value is computed on first read and published once. A packet never
/// changes after construction, so a cached value never goes stale. Racing
/// first reads from several threads are serialized by the cell and all
/// observe the same result.
#[derive(Clone, Default)]
pub struct Memo {
    length: OnceCell<usize>,
    raw: OnceCell<Box<[u8]>>,
    hex: OnceCell<String>,
    hash: OnceCell<u64>,
}

impl Memo {
    /// Create an empty cache.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached length, computing it with `f` on first use.
    #[inline]
    pub fn length<F: FnOnce() -> usize>(&self, f: F) -> usize {
        *self.length.get_or_init(f)
    }

    /// Return the cached wire bytes, computing them with `f` on first use.
    #[inline]
    pub fn raw<F: FnOnce() -> Vec<u8>>(&self, f: F) -> &[u8] {
        self.raw.get_or_init(|| f().into_boxed_slice())
    }

    /// Return the cached lowercase hex rendering of `raw`.
    #[inline]
    pub fn hex(&self, raw: &[u8]) -> &str {
        self.hex.get_or_init(|| hex::encode(raw))
    }

    /// Return the cached hash code of `raw`.
    #[inline]
    pub fn hash_code(&self, raw: &[u8]) -> u64 {
        *self.hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            raw.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Memo { .. }")
    }
}
