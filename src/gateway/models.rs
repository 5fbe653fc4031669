//! Data models for the model gateway

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::GatewayError;

/// One streaming completion request: a single user turn with one image and
/// one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    /// Remote URL or `data:` URL
    pub image_url: String,
    pub question: String,
    pub enable_thinking: bool,
}

impl ChatRequest {
    pub fn new(
        model: impl Into<String>,
        image_url: impl Into<String>,
        question: impl Into<String>,
        enable_thinking: bool,
    ) -> Self {
        Self {
            model: model.into(),
            image_url: image_url.into(),
            question: question.into(),
            enable_thinking,
        }
    }

    /// OpenAI-compatible request body
    pub fn to_payload(&self, thinking_budget: u32, include_usage: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "stream": true,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": self.image_url } },
                    { "type": "text", "text": self.question },
                ],
            }],
            "enable_thinking": self.enable_thinking,
            "thinking_budget": thinking_budget,
        });

        if include_usage {
            body["stream_options"] = json!({ "include_usage": true });
        }

        body
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One incremental unit of model output, decoded once at the gateway boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChunk {
    ReasoningDelta(String),
    AnswerDelta(String),
    Usage(TokenUsage),
    /// Role announcements, empty deltas, finish markers
    Other,
}

impl ModelChunk {
    /// Decode the JSON payload of one `data:` line.
    pub fn decode(data: &str) -> Result<Self, GatewayError> {
        let chunk: CompletionChunk =
            serde_json::from_str(data).map_err(|e| GatewayError::InvalidChunk(e.to_string()))?;

        if let Some(error) = chunk.error {
            return Err(GatewayError::Upstream(upstream_message(&error)));
        }

        Ok(chunk.into())
    }
}

impl From<CompletionChunk> for ModelChunk {
    fn from(chunk: CompletionChunk) -> Self {
        let Some(choice) = chunk.choices.and_then(|choices| choices.into_iter().next()) else {
            return match chunk.usage {
                Some(usage) => Self::Usage(usage),
                None => Self::Other,
            };
        };

        let delta = choice.delta.unwrap_or_default();
        let content = delta.content.filter(|c| !c.is_empty());

        match (delta.reasoning_content, content) {
            // An empty reasoning field next to real content is just the provider
            // echoing the field after thinking has finished.
            (Some(reasoning), Some(content)) if reasoning.is_empty() => Self::AnswerDelta(content),
            (Some(reasoning), _) => Self::ReasoningDelta(reasoning),
            (None, Some(content)) => Self::AnswerDelta(content),
            (None, None) => Self::Other,
        }
    }
}

fn upstream_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Wire shape of a `chat.completion.chunk`
#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChunk {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}
