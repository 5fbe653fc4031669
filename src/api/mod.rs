//! HTTP API
//!
//! - GET  /                  - front-end page
//! - GET  /health            - liveness probe
//! - GET  /metrics           - Prometheus metrics
//! - POST /api/extract-text  - stream the model's reasoning and answer
//! - POST /api/upload-image  - normalize an upload into a JPEG data URL
//! - POST /api/process-url   - pass an image URL through

pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use models::{ExtractTextRequest, ImageDataResponse, ProcessUrlRequest, DEFAULT_QUESTION};
pub use routes::build_router;
pub use state::AppState;
