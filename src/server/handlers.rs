//! HTTP request handlers for the compression API.
//!
//! # Endpoints
//!
//! - `POST /compress` - Submit an image (upload, stored digest, or URL)
//!   with parameters; responds with JSON metadata about the result
//! - `GET /compressed` - Retrieve the compressed bytes for a digest and
//!   parameter tuple
//! - `GET /health` - Health check
//!
//! Each compression endpoint sits behind its own admission controller:
//! when the in-flight ceiling is reached the request is rejected with
//! 503 before any parsing, storage access, or engine work.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::admission::AdmissionController;
use crate::digest::Digest;
use crate::engine::CompressionEngine;
use crate::error::{CompressError, EngineError, FetchError, ParamError, StoreError};
use crate::params::CompressionParams;
use crate::service::{CompressOutcome, CompressRequest, CompressService, ImageInput};

// =============================================================================
// Field Ceilings
// =============================================================================

/// Maximum accepted size of the `file` field (5 MiB).
pub const MAX_FILE_FIELD: usize = 5 * 1024 * 1024;

/// Maximum accepted length of the `url` field.
pub const MAX_URL_FIELD: usize = 4 * 1024;

/// Maximum accepted length of the `sum224` digest text field.
pub const MAX_DIGEST_FIELD: usize = 40;

/// Maximum accepted length of each numeric text field.
pub const MAX_NUMERIC_FIELD: usize = 8;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers.
pub struct AppState<E> {
    /// The compression pipeline
    pub service: Arc<CompressService<E>>,

    /// Admission controller for the page (submit) endpoint
    pub pages: Arc<AdmissionController>,

    /// Admission controller for the image (retrieval) endpoint
    pub images: Arc<AdmissionController>,
}

impl<E> AppState<E> {
    /// Create application state with per-endpoint admission ceilings.
    pub fn new(service: CompressService<E>, page_limit: u32, image_limit: u32) -> Self {
        Self {
            service: Arc::new(service),
            pages: Arc::new(AdmissionController::new(page_limit)),
            images: Arc::new(AdmissionController::new(image_limit)),
        }
    }
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            pages: Arc::clone(&self.pages),
            images: Arc::clone(&self.images),
        }
    }
}

// =============================================================================
// Request & Response Types
// =============================================================================

/// Query parameters for the retrieval endpoint.
///
/// All fields arrive as text and are validated by the handler so that a
/// missing or malformed field maps to the right client error.
#[derive(Debug, Deserialize)]
pub struct VariantQueryParams {
    #[serde(default)]
    pub sum224: Option<String>,

    #[serde(default)]
    pub strength: Option<String>,

    #[serde(default)]
    pub bleed: Option<String>,

    #[serde(default)]
    pub strip: Option<String>,
}

/// JSON body returned by the submit endpoint.
#[derive(Debug, Serialize)]
pub struct CompressResponse {
    /// base64url digest text to use with the retrieval endpoint
    pub sum224: String,

    pub strength: u8,
    pub bleed: u16,
    pub strip: bool,

    /// Size of the original in bytes
    pub original_size: usize,

    /// Size of the compressed variant in bytes
    pub compressed_size: usize,

    /// Compressed size as a percentage of the original
    pub percent: f32,

    /// Declared dimensions from the PNG header
    pub width: u32,
    pub height: u32,

    /// Whether the variant came from the compressed cache
    pub cache_hit: bool,
}

impl CompressResponse {
    fn from_outcome(outcome: &CompressOutcome) -> Self {
        Self {
            sum224: outcome.digest.to_base64(),
            strength: outcome.params.strength(),
            bleed: outcome.params.bleed(),
            strip: outcome.params.strip(),
            original_size: outcome.original_size,
            compressed_size: outcome.compressed_size(),
            percent: outcome.percent_of_original(),
            width: outcome.width,
            height: outcome.height,
            cache_hit: outcome.cache_hit,
        }
    }
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_parameters", "server_busy")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Failures a handler can produce: load shedding, form decoding, or a
/// pipeline error.
#[derive(Debug)]
pub enum RequestError {
    /// The endpoint's admission ceiling was reached
    Overloaded,

    /// The multipart body could not be decoded, or a field broke its
    /// size ceiling
    BadForm(String),

    /// Pipeline failure
    Compress(CompressError),
}

impl From<CompressError> for RequestError {
    fn from(err: CompressError) -> Self {
        RequestError::Compress(err)
    }
}

impl From<ParamError> for RequestError {
    fn from(err: ParamError) -> Self {
        RequestError::Compress(CompressError::Param(err))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            RequestError::Overloaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_busy",
                "server busy, try again later".to_string(),
            ),

            RequestError::BadForm(reason) => (
                StatusCode::BAD_REQUEST,
                "bad_form",
                format!("bad form: {}", reason),
            ),

            RequestError::Compress(err) => match err {
                CompressError::Param(param_err) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_parameters",
                    param_err.to_string(),
                ),

                CompressError::MissingInput => {
                    (StatusCode::BAD_REQUEST, "missing_input", err.to_string())
                }

                CompressError::BadDigest => {
                    (StatusCode::BAD_REQUEST, "bad_digest", err.to_string())
                }

                CompressError::BadImage(_) => {
                    (StatusCode::BAD_REQUEST, "bad_png", err.to_string())
                }

                CompressError::DimensionsTooLarge { .. } => (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "png_too_large",
                    err.to_string(),
                ),

                CompressError::InputTooLarge { .. } => (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "upload_too_large",
                    err.to_string(),
                ),

                CompressError::Store(store_err) => match store_err {
                    StoreError::WrongDigest | StoreError::NotFound => {
                        (StatusCode::NOT_FOUND, "unknown_sum", store_err.to_string())
                    }
                    StoreError::DigestMismatch | StoreError::TooLarge { .. } | StoreError::Io(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        store_err.to_string(),
                    ),
                },

                CompressError::Fetch(fetch_err) => (
                    StatusCode::BAD_GATEWAY,
                    fetch_error_type(fetch_err),
                    fetch_err.to_string(),
                ),

                CompressError::Engine(engine_err) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    engine_error_type(engine_err),
                    engine_err.to_string(),
                ),
            },
        };

        // Log based on severity: 5xx at error, load shedding at debug
        // (expected under load), everything else at warn.
        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "server error: {}", message);
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            debug!(error_type, status = status.as_u16(), "request shed: {}", message);
        } else {
            warn!(error_type, status = status.as_u16(), "client error: {}", message);
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

fn fetch_error_type(err: &FetchError) -> &'static str {
    match err {
        FetchError::RedirectRefused => "redirect_refused",
        FetchError::TooLarge { .. } => "remote_too_large",
        FetchError::Status(_) => "remote_status",
        FetchError::Request(_) => "fetch_failed",
    }
}

fn engine_error_type(err: &EngineError) -> &'static str {
    match err {
        EngineError::TimedOut { .. } => "engine_timeout",
        _ => "compression_failed",
    }
}

// =============================================================================
// Form Decoding
// =============================================================================

/// Recognized multipart fields, each read at most once.
#[derive(Default)]
struct FormFields {
    file: Option<Bytes>,
    url: Option<String>,
    sum224: Option<String>,
    strength: Option<String>,
    bleed: Option<String>,
    strip: Option<String>,
}

/// Ceiling for a recognized field name, `None` for fields to skip.
fn field_ceiling(name: &str) -> Option<usize> {
    match name {
        "file" => Some(MAX_FILE_FIELD),
        "url" => Some(MAX_URL_FIELD),
        "sum224" => Some(MAX_DIGEST_FIELD),
        "strength" | "bleed" | "strip" => Some(MAX_NUMERIC_FIELD),
        _ => None,
    }
}

/// Drain the multipart body into recognized fields, enforcing per-field
/// size ceilings. Unknown fields and repeats of an already-seen field are
/// ignored.
async fn read_form(mut multipart: Multipart) -> Result<FormFields, RequestError> {
    let mut fields = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RequestError::BadForm(err.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let Some(ceiling) = field_ceiling(&name) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|err| RequestError::BadForm(err.to_string()))?;
        if data.len() > ceiling {
            return Err(RequestError::BadForm(format!(
                "field {} exceeds {} bytes",
                name, ceiling
            )));
        }

        if name == "file" {
            if fields.file.is_none() {
                fields.file = Some(data);
            }
            continue;
        }

        let text = String::from_utf8_lossy(&data).into_owned();
        let slot = match name.as_str() {
            "url" => &mut fields.url,
            "sum224" => &mut fields.sum224,
            "strength" => &mut fields.strength,
            "bleed" => &mut fields.bleed,
            "strip" => &mut fields.strip,
            _ => unreachable!("field_ceiling filtered unknown names"),
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    Ok(fields)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle compression submissions.
///
/// # Endpoint
///
/// `POST /compress` (multipart form)
///
/// # Fields
///
/// Exactly one input source, in precedence order:
/// - `file`: raw PNG bytes (≤ 5 MiB)
/// - `sum224`: base64url digest of a previously stored original
/// - `url`: remote URL to fetch the PNG from (≤ 4 KiB of text)
///
/// Plus the mandatory parameters as decimal text: `strength` (0-85),
/// `bleed` (0-32767, 32767 = no dithering), `strip` (0 or 1).
///
/// # Response
///
/// - `200 OK`: JSON metadata ([`CompressResponse`]); fetch the bytes via
///   `GET /compressed`
/// - `400 Bad Request`: missing/invalid parameters or input
/// - `404 Not Found`: unknown digest reference
/// - `413 Payload Too Large`: oversized upload or declared dimensions
/// - `502 Bad Gateway`: remote URL fetch failed
/// - `503 Service Unavailable`: admission ceiling reached
pub async fn compress_handler<E>(
    State(state): State<AppState<E>>,
    multipart: Multipart,
) -> Result<Json<CompressResponse>, RequestError>
where
    E: CompressionEngine + 'static,
{
    // Load-shed before touching the body.
    let _permit = state.pages.try_acquire().ok_or(RequestError::Overloaded)?;

    let fields = read_form(multipart).await?;

    // Parameters are validated before the input is resolved, so a bad
    // request never triggers a fetch, a store read, or a cache lookup.
    let params = CompressionParams::parse_fields(
        fields.strength.as_deref(),
        fields.bleed.as_deref(),
        fields.strip.as_deref(),
    )?;

    let input = if let Some(file) = fields.file {
        ImageInput::Upload(file)
    } else if let Some(sum224) = fields.sum224 {
        let digest = Digest::from_base64(sum224.trim()).ok_or(CompressError::BadDigest)?;
        ImageInput::Stored(digest)
    } else if let Some(url) = fields.url {
        ImageInput::Remote(url)
    } else {
        return Err(CompressError::MissingInput.into());
    };

    let outcome = state.service.compress(CompressRequest { input, params }).await?;
    Ok(Json(CompressResponse::from_outcome(&outcome)))
}

/// Handle compressed-variant retrieval.
///
/// # Endpoint
///
/// `GET /compressed?sum224=&strength=&bleed=&strip=`
///
/// # Response
///
/// - `200 OK`: `image/png` body, with `X-Cache-Hit: true|false`
/// - `400 Bad Request`: missing/invalid parameters or digest text
/// - `404 Not Found`: no original stored for the digest
/// - `500 Internal Server Error`: engine failure
/// - `503 Service Unavailable`: admission ceiling reached
pub async fn compressed_handler<E>(
    State(state): State<AppState<E>>,
    Query(query): Query<VariantQueryParams>,
) -> Result<Response, RequestError>
where
    E: CompressionEngine + 'static,
{
    let _permit = state.images.try_acquire().ok_or(RequestError::Overloaded)?;

    let sum224 = query.sum224.as_deref().ok_or(ParamError::Missing {
        name: "sum224",
    })?;
    let digest = Digest::from_base64(sum224.trim()).ok_or(CompressError::BadDigest)?;

    let params = CompressionParams::parse_fields(
        query.strength.as_deref(),
        query.bleed.as_deref(),
        query.strip.as_deref(),
    )?;

    let (data, cache_hit) = state.service.variant(digest, params).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header("X-Cache-Hit", cache_hit.to_string())
        .body(axum::body::Body::from(data))
        .unwrap();

    Ok(response)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
