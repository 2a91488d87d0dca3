//! Bounded stores for originals and compressed variants.
//!
//! - [`originals`] - disk-backed, shard-indexed persistence for uploaded
//!   source images.
//! - [`compressed`] - fixed-capacity in-memory FIFO cache of compressed
//!   results keyed by (digest, parameters).

pub mod compressed;
pub mod originals;

pub use compressed::{CompressedCache, VariantKey, DEFAULT_VARIANT_CACHE_CAPACITY};
pub use originals::{OriginalStore, DEFAULT_MAX_ORIGINAL_BYTES};
