//! Compression pipeline.
//!
//! [`CompressService`] is the entry point for compression requests. It
//! orchestrates:
//! - Input resolution (raw upload, stored digest, or remote URL)
//! - The declared-dimension size guard
//! - Compressed-cache lookups
//! - External engine invocation on a miss
//! - Cache and original-store population
//!
//! # Request Flow
//!
//! ```text
//! Admitted -> Validating -> ResolvingInput -> SizeGuard -> CacheLookup
//!     -> hit:  Done
//!     -> miss: Invoking -> CachePopulate -> Done
//! ```
//!
//! No state is revisited and no request retries itself. Neither store
//! lock is held across the engine subprocess call or network I/O.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};

use crate::digest::Digest;
use crate::engine::CompressionEngine;
use crate::error::CompressError;
use crate::fetch::RemoteFetcher;
use crate::params::CompressionParams;
use crate::store::{CompressedCache, OriginalStore, VariantKey};

/// Default bound on declared image width and height.
///
/// Checked against the PNG header alone, before any decode or engine
/// work, to shield the engine from decompression-bomb inputs.
pub const DEFAULT_MAX_DIMENSION: u32 = 3000;

// =============================================================================
// Request & Outcome
// =============================================================================

/// Where the original bytes for a request come from.
///
/// Exactly one source per request; the request surface picks the variant.
pub enum ImageInput {
    /// Raw bytes uploaded with the request
    Upload(Bytes),

    /// Reference to an original persisted on a previous upload
    Stored(Digest),

    /// Remote URL to fetch the original from
    Remote(String),
}

/// A validated compression request.
pub struct CompressRequest {
    pub input: ImageInput,
    pub params: CompressionParams,
}

/// Result of a compression request: the bytes plus computed metadata for
/// the caller to present. Metadata is computed per request, never cached.
#[derive(Debug)]
pub struct CompressOutcome {
    /// The compressed image
    pub data: Bytes,

    /// Content digest of the original
    pub digest: Digest,

    /// Parameters the variant was produced with
    pub params: CompressionParams,

    /// Whether the variant was served from the compressed cache
    pub cache_hit: bool,

    /// Size of the original in bytes
    pub original_size: usize,

    /// Declared width from the PNG header
    pub width: u32,

    /// Declared height from the PNG header
    pub height: u32,
}

impl CompressOutcome {
    /// Size of the compressed variant in bytes.
    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }

    /// Compressed size as a percentage of the original size.
    pub fn percent_of_original(&self) -> f32 {
        if self.original_size == 0 {
            return 0.0;
        }
        100.0 * self.data.len() as f32 / self.original_size as f32
    }
}

// =============================================================================
// Compress Service
// =============================================================================

/// Service turning a (content, parameters) pair into a compressed byte
/// stream, invoking the external engine at most once per unique pair
/// while the variant stays resident.
///
/// # Type Parameters
///
/// * `E` - The engine implementation (subprocess in production, a mock
///   in tests)
pub struct CompressService<E> {
    /// Disk store for uploaded originals
    originals: Arc<OriginalStore>,

    /// In-memory FIFO cache of compressed variants
    cache: CompressedCache,

    /// The external compression engine
    engine: E,

    /// Fetcher for URL-sourced requests
    fetcher: RemoteFetcher,

    /// Declared-dimension ceiling
    max_dimension: u32,
}

impl<E: CompressionEngine> CompressService<E> {
    /// Create a service with the default variant cache and dimension bound.
    pub fn new(originals: Arc<OriginalStore>, engine: E, fetcher: RemoteFetcher) -> Self {
        Self {
            originals,
            cache: CompressedCache::new(),
            engine,
            fetcher,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a service with an explicit variant cache capacity.
    pub fn with_cache_capacity(
        originals: Arc<OriginalStore>,
        engine: E,
        fetcher: RemoteFetcher,
        capacity: usize,
    ) -> Self {
        Self {
            originals,
            cache: CompressedCache::with_capacity(capacity),
            engine,
            fetcher,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Override the declared-dimension ceiling.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// The original store backing this service.
    pub fn originals(&self) -> &OriginalStore {
        &self.originals
    }

    /// The variant cache backing this service.
    pub fn cache(&self) -> &CompressedCache {
        &self.cache
    }

    /// Run the full pipeline for one request.
    ///
    /// New content (uploads and fetched bodies) is persisted to the
    /// original store best-effort: a persistence failure is logged and
    /// the request proceeds, since the bytes to compress are in hand.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be resolved, is not a PNG,
    /// exceeds the size or dimension ceilings, or the engine fails.
    pub async fn compress(&self, request: CompressRequest) -> Result<CompressOutcome, CompressError> {
        let params = request.params;

        // Resolve input bytes. `known_digest` is set only for the stored
        // path, where the digest is the lookup key rather than derived.
        let (original, known_digest) = match request.input {
            ImageInput::Upload(bytes) => {
                let max = self.originals.max_bytes();
                if bytes.len() > max {
                    return Err(CompressError::InputTooLarge { max });
                }
                (bytes, None)
            }
            ImageInput::Remote(url) => (self.fetcher.fetch(&url).await?, None),
            ImageInput::Stored(digest) => (self.originals.load(digest).await?, Some(digest)),
        };

        // Reject oversized declared dimensions before any expensive work.
        let (width, height) = self.guard_dimensions(&original)?;

        let digest = match known_digest {
            Some(digest) => digest,
            None => {
                let digest = Digest::of(&original);
                if let Err(err) = self.originals.save(&original, digest).await {
                    warn!(digest = %digest, error = %err, "best-effort original save failed");
                }
                digest
            }
        };

        let key = VariantKey::new(digest, params);
        let (data, cache_hit) = self.cached_or_compressed(key, original.clone()).await?;

        debug!(
            digest = %digest,
            cache_hit,
            original = original.len(),
            compressed = data.len(),
            "compression request complete"
        );

        Ok(CompressOutcome {
            data,
            digest,
            params,
            cache_hit,
            original_size: original.len(),
            width,
            height,
        })
    }

    /// Serve a compressed variant by digest, for the retrieval surface.
    ///
    /// Checks the variant cache first and touches the original store
    /// only on a miss. Returns the bytes and whether they came from cache.
    pub async fn variant(
        &self,
        digest: Digest,
        params: CompressionParams,
    ) -> Result<(Bytes, bool), CompressError> {
        let key = VariantKey::new(digest, params);
        if let Some(data) = self.cache.lookup(&key).await {
            return Ok((data, true));
        }

        let original = self.originals.load(digest).await?;
        let data = self.engine.compress(original, &params).await?;
        self.cache.insert(key, data.clone()).await;
        Ok((data, false))
    }

    /// Cache lookup, falling back to one engine invocation plus cache
    /// population. The cache lock is released before the engine runs and
    /// re-acquired only to commit the result.
    async fn cached_or_compressed(
        &self,
        key: VariantKey,
        original: Bytes,
    ) -> Result<(Bytes, bool), CompressError> {
        if let Some(data) = self.cache.lookup(&key).await {
            return Ok((data, true));
        }

        let data = self.engine.compress(original, &key.params).await?;
        self.cache.insert(key, data.clone()).await;
        Ok((data, false))
    }

    /// Decode only the PNG header and reject declared dimensions over the
    /// configured bound.
    fn guard_dimensions(&self, bytes: &[u8]) -> Result<(u32, u32), CompressError> {
        let reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png);
        let (width, height) = reader
            .into_dimensions()
            .map_err(|err| CompressError::BadImage(err.to_string()))?;

        if width > self.max_dimension || height > self.max_dimension {
            return Err(CompressError::DimensionsTooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        Ok((width, height))
    }
}

// =============================================================================
// Tests
// =============================================================================
