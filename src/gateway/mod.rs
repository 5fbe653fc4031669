//! Model gateway: streaming chat completions against the hosted vision model
//!
//! The provider's server-sent chunks are decoded here, once, into
//! [`ModelChunk`] so nothing downstream probes JSON shapes.

pub mod client;
pub mod models;
pub mod sse;

pub use client::{decode_chunks, ChunkStream, GatewayError, ModelGateway, OpenAiCompatClient};
pub use models::{ChatRequest, ModelChunk, TokenUsage};
pub use sse::SseDecoder;
