//! Configuration management.
//!
//! Supports command-line arguments via clap, environment variables with
//! a `PNGPRESS_` prefix, and defaults for every optional setting.
//!
//! # Environment Variables
//!
//! - `PNGPRESS_HOST` - Server bind address (default: 0.0.0.0)
//! - `PNGPRESS_PORT` - Server port (default: 3000)
//! - `PNGPRESS_ORIGINALS_DIR` - Directory for stored originals
//! - `PNGPRESS_ENGINE` - Compression engine binary (default: pngloss)
//! - `PNGPRESS_ENGINE_TIMEOUT` - Engine timeout in seconds (default: 30)
//! - `PNGPRESS_CACHE_VARIANTS` - Compressed cache capacity (default: 10)
//! - `PNGPRESS_MAX_UPLOAD` - Max original size in bytes (default: 5 MiB)
//! - `PNGPRESS_MAX_DIMENSION` - Max declared width/height (default: 3000)
//! - `PNGPRESS_FETCH_TIMEOUT_MS` - Remote fetch timeout (default: 1000)
//! - `PNGPRESS_PAGE_CONCURRENCY` - Submit endpoint ceiling (default: 2)
//! - `PNGPRESS_IMAGE_CONCURRENCY` - Retrieval endpoint ceiling (default: 2)

use clap::Parser;

use crate::engine::{DEFAULT_ENGINE_PROGRAM, DEFAULT_ENGINE_TIMEOUT_SECS};
use crate::server::routes::{DEFAULT_IMAGE_CONCURRENCY, DEFAULT_PAGE_CONCURRENCY};
use crate::service::DEFAULT_MAX_DIMENSION;
use crate::store::{DEFAULT_MAX_ORIGINAL_BYTES, DEFAULT_VARIANT_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default directory for stored originals.
pub const DEFAULT_ORIGINALS_DIR: &str = "originals";

/// Default remote fetch timeout in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pngpress - a caching front end for lossy PNG compression.
///
/// Accepts PNG uploads (or remote URLs, or digests of previously stored
/// originals), invokes the external compression engine at most once per
/// unique (content, parameters) pair, and serves the compressed results.
#[derive(Parser, Debug, Clone)]
#[command(name = "pngpress")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PNGPRESS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PNGPRESS_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding the shard files for stored originals.
    ///
    /// Created at startup if it does not exist.
    #[arg(long, default_value = DEFAULT_ORIGINALS_DIR, env = "PNGPRESS_ORIGINALS_DIR")]
    pub originals_dir: String,

    /// Maximum size of one original image in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_ORIGINAL_BYTES, env = "PNGPRESS_MAX_UPLOAD")]
    pub max_upload_bytes: usize,

    /// Maximum number of compressed variants kept in memory.
    #[arg(long, default_value_t = DEFAULT_VARIANT_CACHE_CAPACITY, env = "PNGPRESS_CACHE_VARIANTS")]
    pub cache_variants: usize,

    // =========================================================================
    // Engine Configuration
    // =========================================================================
    /// Compression engine binary, resolved through PATH if not absolute.
    #[arg(long, default_value = DEFAULT_ENGINE_PROGRAM, env = "PNGPRESS_ENGINE")]
    pub engine: String,

    /// Timeout for one engine invocation in seconds.
    #[arg(long, default_value_t = DEFAULT_ENGINE_TIMEOUT_SECS, env = "PNGPRESS_ENGINE_TIMEOUT")]
    pub engine_timeout_secs: u64,

    // =========================================================================
    // Pipeline Configuration
    // =========================================================================
    /// Maximum declared image width/height accepted for compression.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "PNGPRESS_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Timeout for one remote URL fetch in milliseconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS, env = "PNGPRESS_FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,

    // =========================================================================
    // Admission Configuration
    // =========================================================================
    /// Maximum concurrent requests on the submit endpoint.
    #[arg(long, default_value_t = DEFAULT_PAGE_CONCURRENCY, env = "PNGPRESS_PAGE_CONCURRENCY")]
    pub page_concurrency: u32,

    /// Maximum concurrent requests on the retrieval endpoint.
    #[arg(long, default_value_t = DEFAULT_IMAGE_CONCURRENCY, env = "PNGPRESS_IMAGE_CONCURRENCY")]
    pub image_concurrency: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Unset allows any origin.
    #[arg(long, env = "PNGPRESS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.originals_dir.is_empty() {
            return Err("originals_dir must not be empty".to_string());
        }
        if self.engine.is_empty() {
            return Err("engine must not be empty".to_string());
        }
        if self.cache_variants == 0 {
            return Err("cache_variants must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }
        if self.engine_timeout_secs == 0 {
            return Err("engine_timeout_secs must be greater than 0".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be greater than 0".to_string());
        }
        if self.page_concurrency == 0 {
            return Err("page_concurrency must be greater than 0".to_string());
        }
        if self.image_concurrency == 0 {
            return Err("image_concurrency must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
