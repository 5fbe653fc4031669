//! Wire events emitted to the caller

use bytes::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::gateway::TokenUsage;

/// One event of the extract-text response stream.
///
/// Text-carrying events hold the full accumulated text, not the delta, so the
/// latest event alone is enough to render the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Thinking { reasoning_content: String },
    Answering { answer_content: String },
    Usage(TokenUsage),
    Completed { reasoning_content: String, answer_content: String },
    Error { error: String },
}

impl RelayEvent {
    /// Value of the `status` field on the wire
    pub fn status(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Answering { .. } => "answering",
            Self::Usage(_) | Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// Metric label; unlike `status`, tells usage and completion apart
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            other => other.status(),
        }
    }

    /// Whether the stream ends with this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }

    /// `data: <json>` followed by a blank line
    pub fn to_frame(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"error":"event serialization failed: {}","status":"error"}}"#, e)
        });
        Bytes::from(format!("data: {}\n\n", json))
    }
}

impl Serialize for RelayEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(match self {
            Self::Completed { .. } => 3,
            _ => 2,
        }))?;

        match self {
            Self::Thinking { reasoning_content } => {
                map.serialize_entry("reasoning_content", reasoning_content)?;
                map.serialize_entry("status", self.status())?;
            }
            Self::Answering { answer_content } => {
                map.serialize_entry("answer_content", answer_content)?;
                map.serialize_entry("status", self.status())?;
            }
            Self::Usage(usage) => {
                map.serialize_entry("usage", usage)?;
                map.serialize_entry("status", self.status())?;
            }
            Self::Completed { reasoning_content, answer_content } => {
                map.serialize_entry("status", self.status())?;
                map.serialize_entry("reasoning_content", reasoning_content)?;
                map.serialize_entry("answer_content", answer_content)?;
            }
            Self::Error { error } => {
                map.serialize_entry("error", error)?;
                map.serialize_entry("status", self.status())?;
            }
        }

        map.end()
    }
}
