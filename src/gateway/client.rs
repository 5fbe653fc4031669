//! OpenAI-compatible streaming client for the hosted vision model

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use std::pin::Pin;
use tracing::{debug, error, info};

use super::models::{ChatRequest, ModelChunk};
use super::sse::{SseDecoder, DONE_MARKER};
use crate::config::GatewayConfig;
use crate::metrics::METRICS;

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout(e.to_string())
        } else {
            GatewayError::RequestFailed(e.to_string())
        }
    }
}

/// Chunks in arrival order; ends when the provider closes the stream
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, GatewayError>> + Send>>;

/// Source of streamed model output
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Open a streaming completion. Errors before the first chunk are
    /// returned here; later ones arrive inside the stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, GatewayError>;
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI streaming
/// protocol (DashScope compatible mode by default)
pub struct OpenAiCompatClient {
    http: Client,
    config: GatewayConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        // No overall timeout: the response body stays open for the whole answer.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, GatewayError> {
        let url = self.config.completions_url();
        let body = request.to_payload(self.config.thinking_budget, self.config.include_usage);

        debug!(
            "Calling completions API: url={}, model={}, thinking={}",
            url, request.model, request.enable_thinking
        );

        let mut req = self
            .http
            .post(&url)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let sent = match self.config.response_timeout() {
            Some(limit) => tokio::time::timeout(limit, req.send()).await.map_err(|_| {
                METRICS.record_gateway_request(false);
                error!("No response headers from {} within {:?}", url, limit);
                GatewayError::Timeout(format!("no response from model within {}ms", limit.as_millis()))
            })?,
            None => req.send().await,
        };

        let response = sent.map_err(|e| {
            METRICS.record_gateway_request(false);
            GatewayError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            METRICS.record_gateway_request(false);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Completions API returned {}", status);
            return Err(GatewayError::Upstream(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        METRICS.record_gateway_request(true);
        info!("Completion stream opened: model={}", request.model);

        Ok(Box::pin(decode_chunks(response.bytes_stream())))
    }
}

/// Turn a raw SSE byte stream into decoded chunks, stopping at `[DONE]`.
pub fn decode_chunks<S, E>(body: S) -> impl Stream<Item = Result<ModelChunk, GatewayError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();
        let mut done = false;

        while !done {
            let Some(bytes) = body.next().await else {
                break;
            };
            let bytes = bytes.map_err(|e| GatewayError::Stream(e.to_string()))?;

            for data in decoder.push(&bytes) {
                if data.trim() == DONE_MARKER {
                    done = true;
                    break;
                }
                yield ModelChunk::decode(&data)?;
            }
        }

        if !done {
            if let Some(data) = decoder.finish() {
                if data.trim() != DONE_MARKER {
                    yield ModelChunk::decode(&data)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::models::TokenUsage;
    use futures::stream;

    fn byte_stream(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<ModelChunk, GatewayError>> {
        decode_chunks(byte_stream(parts)).collect().await
    }

    #[tokio::test]
    async fn test_decode_chunks_in_order() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"let me \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"see\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\"Done\"}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":4,\"total_tokens\":7}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let chunks: Vec<ModelChunk> = chunks.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            chunks,
            vec![
                ModelChunk::ReasoningDelta("let me ".to_string()),
                ModelChunk::ReasoningDelta("see".to_string()),
                ModelChunk::AnswerDelta("Done".to_string()),
                ModelChunk::Usage(TokenUsage { prompt_tokens: 3, completion_tokens: 4, total_tokens: 7 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_after_done_marker() {
        let chunks = collect(vec![
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ])
        .await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_stream_without_trailing_blank_line() {
        let chunks = collect(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &ModelChunk::AnswerDelta("x".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_chunk_ends_stream_with_error() {
        let chunks = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: garbage\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
        ])
        .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(matches!(chunks[1], Err(GatewayError::InvalidChunk(_))));
    }

    #[tokio::test]
    async fn test_transport_error_is_stream_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let chunks: Vec<_> = decode_chunks(body).collect().await;

        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], Err(GatewayError::Stream(_))));
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiCompatClient::new(GatewayConfig::default()).unwrap();
        assert_eq!(client.model(), "qwen3-vl-plus");
    }
}
