//! Streaming relay between a web front-end and a hosted vision-language model.
//!
//! The front-end posts an image (data URL or remote URL) and a question; the
//! service forwards both to an OpenAI-compatible completions endpoint and relays
//! the model's reasoning and answer back as a live event stream.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod imaging;
pub mod metrics;
pub mod observability;
pub mod relay;

pub use crate::config::Config;
pub use crate::error::{AppError, Result};
