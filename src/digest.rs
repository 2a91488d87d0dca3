//! Content-addressed digests and shard addressing.
//!
//! Every original image is identified by the SHA-256/224 digest of its
//! bytes. On disk, originals live in a small fixed address space: the
//! digest, read as a big unsigned integer, is reduced modulo the shard
//! count (36² = 1296) and the resulting index names a two-character file.
//! Many digests map onto each shard; collisions overwrite and are handled
//! by the store, not avoided here.
//!
//! # Wire Encoding
//!
//! Digests travel as base64url text with padding: 28 bytes encode to
//! exactly 40 characters, which is also the field-size ceiling for digest
//! text on the upload surface.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest as _, Sha224};

/// Digest length in bytes (SHA-256/224).
pub const DIGEST_SIZE: usize = 28;

/// Alphabet used for shard file names.
pub const SHARD_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of storage shards (two alphabet characters).
pub const SHARD_COUNT: usize = SHARD_ALPHABET.len() * SHARD_ALPHABET.len();

/// File extension for shard files.
pub const SHARD_EXTENSION: &str = "png";

// =============================================================================
// Digest
// =============================================================================

/// A SHA-256/224 content digest identifying an original image.
///
/// Computed once when content first enters the system and never
/// recomputed except for lazy on-disk verification in the original store.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Compute the digest of raw content bytes. Total, deterministic.
    pub fn of(bytes: &[u8]) -> Self {
        let sum = Sha224::digest(bytes);
        Self(sum.into())
    }

    /// Construct from raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Decode the base64url wire form. Returns `None` when the text is not
    /// valid base64url or does not decode to exactly [`DIGEST_SIZE`] bytes.
    pub fn from_base64(text: &str) -> Option<Self> {
        let decoded = URL_SAFE.decode(text).ok()?;
        let bytes: [u8; DIGEST_SIZE] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Encode to the base64url wire form (40 characters).
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.0)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Shard index in `[0, SHARD_COUNT)`.
    ///
    /// Treats the digest as a big-endian unsigned integer and reduces it
    /// modulo the shard count, one byte at a time.
    pub fn shard(&self) -> usize {
        self.0
            .iter()
            .fold(0usize, |acc, &b| (acc * 256 + b as usize) % SHARD_COUNT)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// =============================================================================
// Shard Paths
// =============================================================================

/// Render the two-character file name for a shard index, e.g. `AA.png`.
///
/// # Panics
///
/// Panics if `shard >= SHARD_COUNT`.
pub fn shard_file_name(shard: usize) -> String {
    assert!(shard < SHARD_COUNT, "shard index out of range: {}", shard);
    let hi = SHARD_ALPHABET[shard / SHARD_ALPHABET.len()] as char;
    let lo = SHARD_ALPHABET[shard % SHARD_ALPHABET.len()] as char;
    format!("{}{}.{}", hi, lo, SHARD_EXTENSION)
}

/// Full path of a shard file under the storage root. Side-effect-free.
pub fn shard_path(root: &Path, shard: usize) -> PathBuf {
    root.join(shard_file_name(shard))
}

// =============================================================================
// Tests
// =============================================================================
