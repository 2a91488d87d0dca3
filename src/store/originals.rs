//! Disk-backed store for original uploaded images.
//!
//! Originals are persisted one file per shard under a fixed root
//! directory; the shard index is derived from the content digest (see
//! [`crate::digest`]). At most one original occupies a shard at a time,
//! and a later upload whose digest reduces to the same shard silently
//! overwrites the previous occupant.
//!
//! # Digest Hints
//!
//! The store keeps an in-memory "last known digest per shard" table. It
//! is a hint, not a source of truth: it starts empty on process start and
//! goes stale when a shard is overwritten. Its only job is to reject an
//! obvious digest mismatch before paying for a file read. When the hint
//! is absent, the file on disk is ground truth and is verified lazily.
//!
//! # Concurrency
//!
//! A single mutex serializes all reads and writes across all shards.
//! Contention is rare in the target workload and the shard space is
//! small, so correctness wins over throughput here.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::digest::{shard_path, Digest, SHARD_COUNT};
use crate::error::StoreError;

/// Default maximum size of a stored original: 5 MiB.
pub const DEFAULT_MAX_ORIGINAL_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// Original Store
// =============================================================================

/// Shard-indexed disk store for original images.
pub struct OriginalStore {
    /// Directory holding the shard files
    root: PathBuf,

    /// Maximum accepted size of one original in bytes
    max_bytes: usize,

    /// Last known digest per shard; `None` means unknown, not empty
    hints: Mutex<Box<[Option<Digest>]>>,
}

impl OriginalStore {
    /// Create a store rooted at `root` with the default size ceiling.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_max_bytes(root, DEFAULT_MAX_ORIGINAL_BYTES)
    }

    /// Create a store with an explicit per-original size ceiling.
    pub fn with_max_bytes(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            hints: Mutex::new(vec![None; SHARD_COUNT].into_boxed_slice()),
        }
    }

    /// Maximum accepted original size in bytes.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Persist `data` under its digest's shard.
    ///
    /// The hint table is updated only after the write succeeds. On a write
    /// failure the partial file is removed and the table is left
    /// untouched, so a failed save can never poison a later load.
    pub async fn save(&self, data: &[u8], digest: Digest) -> Result<(), StoreError> {
        let shard = digest.shard();
        let path = shard_path(&self.root, shard);

        let mut hints = self.hints.lock().await;

        if let Err(err) = fs::write(&path, data).await {
            // Remove whatever partial file the failed write left behind.
            let _ = fs::remove_file(&path).await;
            return Err(StoreError::Io(err.to_string()));
        }

        hints[shard] = Some(digest);
        debug!(shard, digest = %digest, bytes = data.len(), "original saved");
        Ok(())
    }

    /// Load the original identified by `digest`.
    ///
    /// Fails fast with [`StoreError::WrongDigest`] when the shard's hint
    /// names a different digest. On a cold shard (no hint) the bytes read
    /// are hashed; the hint is populated with the *computed* digest, and a
    /// mismatch with the requested digest is a hard
    /// [`StoreError::DigestMismatch`] - the bytes are never served.
    pub async fn load(&self, digest: Digest) -> Result<Bytes, StoreError> {
        let shard = digest.shard();
        let path = shard_path(&self.root, shard);

        let mut hints = self.hints.lock().await;

        let had_hint = match hints[shard] {
            Some(known) if known != digest => return Err(StoreError::WrongDigest),
            Some(_) => true,
            None => false,
        };

        let file = fs::File::open(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound
            } else {
                StoreError::Io(err.to_string())
            }
        })?;

        // Read one byte past the ceiling: exactly filling the probe means
        // the file is over the limit, any shorter read is the normal case.
        let mut buffer = Vec::new();
        file.take(self.max_bytes as u64 + 1)
            .read_to_end(&mut buffer)
            .await
            .map_err(|err| StoreError::Io(err.to_string()))?;

        if buffer.len() > self.max_bytes {
            return Err(StoreError::TooLarge {
                max: self.max_bytes,
            });
        }

        if !had_hint {
            let file_digest = Digest::of(&buffer);
            hints[shard] = Some(file_digest);
            if file_digest != digest {
                debug!(shard, requested = %digest, found = %file_digest, "cold-start digest mismatch");
                return Err(StoreError::DigestMismatch);
            }
        }

        Ok(Bytes::from(buffer))
    }
}

// =============================================================================
// Tests
// =============================================================================
