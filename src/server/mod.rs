//! Axum-based HTTP server.
//!
//! Organized as:
//!
//! - [`handlers`] - Request handlers, form decoding, and error mapping
//! - [`routes`] - Router construction and middleware

pub mod handlers;
pub mod routes;

pub use handlers::{
    compress_handler, compressed_handler, health_handler, AppState, CompressResponse,
    ErrorResponse, HealthResponse, VariantQueryParams,
};
pub use routes::{create_router, RouterConfig};
