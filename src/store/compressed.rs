//! In-memory cache of compressed variants.
//!
//! A fixed array of slots plus a write cursor that advances modulo the
//! capacity. Insertion order alone determines eviction order; access
//! recency never matters. Lookup is a linear scan, which is fine at the
//! capacities this cache runs at (tens of entries).
//!
//! # Cache Key
//!
//! Variants are keyed by the original's content digest together with all
//! three compression parameters. Entries are immutable once created and
//! are destroyed only by capacity-driven overwrite - a cached variant can
//! outlive the original bytes that produced it.

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::digest::Digest;
use crate::params::CompressionParams;

/// Default number of compressed variants kept resident.
pub const DEFAULT_VARIANT_CACHE_CAPACITY: usize = 10;

// =============================================================================
// Variant Key
// =============================================================================

/// Cache key for a compressed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    /// Content digest of the original image
    pub digest: Digest,

    /// Compression parameters the variant was produced with
    pub params: CompressionParams,
}

impl VariantKey {
    pub fn new(digest: Digest, params: CompressionParams) -> Self {
        Self { digest, params }
    }
}

// =============================================================================
// Compressed Cache
// =============================================================================

struct Slot {
    key: VariantKey,
    data: Bytes,
}

struct Ring {
    slots: Vec<Option<Slot>>,
    cursor: usize,
}

/// Fixed-capacity FIFO cache of compressed variants.
///
/// Thread-safe; all operations serialize on one internal mutex, which is
/// never held across engine invocation or any other slow work.
pub struct CompressedCache {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl CompressedCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_VARIANT_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` variants.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            ring: Mutex::new(Ring { slots, cursor: 0 }),
            capacity,
        }
    }

    /// Maximum number of resident variants.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub async fn len(&self) -> usize {
        let ring = self.ring.lock().await;
        ring.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return the cached bytes for an exact key match, if resident.
    ///
    /// No side effects: a hit does not refresh the entry's position.
    pub async fn lookup(&self, key: &VariantKey) -> Option<Bytes> {
        let ring = self.ring.lock().await;
        ring.slots
            .iter()
            .flatten()
            .find(|slot| slot.key == *key)
            .map(|slot| slot.data.clone())
    }

    /// Insert a variant at the cursor, overwriting whatever was there,
    /// and advance the cursor.
    ///
    /// Unconditional: no check for an existing identical key, so a hot
    /// key can be resident twice until eviction catches up. Harmless,
    /// since entries for the same key hold identical bytes.
    pub async fn insert(&self, key: VariantKey, data: Bytes) {
        let mut ring = self.ring.lock().await;
        let cursor = ring.cursor;
        ring.slots[cursor] = Some(Slot { key, data });
        ring.cursor = (cursor + 1) % self.capacity;
    }
}

impl Default for CompressedCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
