//! Error types, one enum per failure taxonomy class.
//!
//! Component errors ([`ParamError`], [`StoreError`], [`FetchError`],
//! [`EngineError`]) are resolved where they are detected and converge
//! into [`CompressError`] at the pipeline boundary. The HTTP layer owns
//! the mapping from these variants to status codes.

use thiserror::Error;

/// Errors from parsing and validating compression parameters.
#[derive(Debug, Clone, Error)]
pub enum ParamError {
    /// A required field was absent from the request
    #[error("missing field: {name}")]
    Missing { name: &'static str },

    /// A field was present but not parseable as a decimal integer
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    /// A field parsed but exceeds its declared domain
    #[error("{name} out of range: {value} (max {max})")]
    OutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },
}

/// Errors from the on-disk original store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The shard is occupied by content with a different digest
    #[error("shard holds a different digest")]
    WrongDigest,

    /// No file exists for the digest's shard
    #[error("no original stored for digest")]
    NotFound,

    /// The shard file exceeds the maximum original size
    #[error("stored original exceeds {max} bytes")]
    TooLarge { max: usize },

    /// The file on disk does not hash to the requested digest
    #[error("stored file digest does not match requested digest")]
    DigestMismatch,

    /// Filesystem read/write failure
    #[error("storage I/O error: {0}")]
    Io(String),
}

/// Errors from fetching a remote URL.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure
    #[error("fetch failed: {0}")]
    Request(String),

    /// The remote host answered with a redirect, which is never followed
    #[error("redirect refused")]
    RedirectRefused,

    /// Non-success HTTP status from the remote host
    #[error("remote returned status {0}")]
    Status(u16),

    /// The remote body exceeds the maximum original size
    #[error("remote body exceeds {max} bytes")]
    TooLarge { max: usize },
}

/// Errors from invoking the external compression engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine binary could not be started
    #[error("failed to spawn engine: {0}")]
    Spawn(String),

    /// I/O failure while feeding input or collecting output
    #[error("engine I/O error: {0}")]
    Io(String),

    /// The engine exited with a non-zero status
    #[error("engine exited with {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    /// The engine did not finish within the configured timeout
    #[error("engine timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

/// Errors from the compression pipeline.
///
/// Every failure a request can hit is resolved into one of these variants
/// before it reaches the HTTP layer, which maps them to status codes.
#[derive(Debug, Clone, Error)]
pub enum CompressError {
    /// Parameter validation failure
    #[error(transparent)]
    Param(#[from] ParamError),

    /// None of file, digest reference, or URL resolved to input bytes
    #[error("missing input: supply a file, a sum224, or a url")]
    MissingInput,

    /// The digest reference was not valid base64url text of the right length
    #[error("bad digest encoding")]
    BadDigest,

    /// The input is not a decodable PNG
    #[error("bad png: {0}")]
    BadImage(String),

    /// Declared dimensions exceed the configured bound
    #[error("png too large: {width}x{height} exceeds {max}x{max}")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },

    /// The upload body exceeds the maximum original size
    #[error("upload exceeds {max} bytes")]
    InputTooLarge { max: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
