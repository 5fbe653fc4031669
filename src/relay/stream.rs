//! Async driver turning a gateway chunk stream into relay events

use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::events::RelayEvent;
use super::state::RelayState;
use crate::config::RelayConfig;
use crate::error::AppError;
use crate::gateway::ChunkStream;
use crate::metrics::METRICS;

/// Relay tuning
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayOptions {
    /// Longest wait for the next chunk; `None` waits forever
    pub idle_timeout: Option<Duration>,
}

impl From<RelayConfig> for RelayOptions {
    fn from(config: RelayConfig) -> Self {
        Self {
            idle_timeout: (config.idle_timeout_secs > 0).then(|| config.idle_timeout()),
        }
    }
}

/// Relay `chunks` as events. Always ends with exactly one terminal event:
/// `completed` when the upstream is exhausted, `error` when it fails or stalls.
///
/// Dropping the returned stream drops `chunks`, which closes the upstream
/// connection.
pub fn relay(mut chunks: ChunkStream, options: RelayOptions) -> impl Stream<Item = RelayEvent> + Send {
    async_stream::stream! {
        let mut state = RelayState::new();

        let terminal = loop {
            let next = match options.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, chunks.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("No chunk from model for {:?}, abandoning stream", limit);
                        break state.fail(AppError::StreamInterrupted(format!(
                            "no data from model for {}s",
                            limit.as_secs()
                        )));
                    }
                },
                None => chunks.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Some(event) = state.apply(chunk) {
                        record(&event);
                        yield event;
                    }
                }
                Some(Err(e)) => {
                    warn!("Model stream failed mid-response: {}", e);
                    break state.fail(AppError::StreamInterrupted(e.to_string()));
                }
                None => {
                    debug!("Model stream exhausted");
                    break state.finish();
                }
            }
        };

        info!(
            "Relay finished: status={}, reasoning_chars={}, answer_chars={}",
            terminal.status(),
            state.reasoning().chars().count(),
            state.answer().chars().count()
        );
        record(&terminal);
        yield terminal;
    }
}

fn record(event: &RelayEvent) {
    METRICS.record_relay_event(event.kind());
    if let RelayEvent::Usage(usage) = event {
        METRICS.record_token_usage(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, ModelChunk, TokenUsage};
    use crate::relay::Phase;
    use futures::stream;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    fn chunks(items: Vec<Result<ModelChunk, GatewayError>>) -> ChunkStream {
        Box::pin(stream::iter(items))
    }

    async fn run(items: Vec<Result<ModelChunk, GatewayError>>) -> Vec<RelayEvent> {
        relay(chunks(items), RelayOptions::default()).collect().await
    }

    #[tokio::test]
    async fn test_empty_upstream_yields_single_completion() {
        let events = run(vec![]).await;
        assert_eq!(
            events,
            vec![RelayEvent::Completed {
                reasoning_content: String::new(),
                answer_content: String::new(),
            }]
        );
    }

    #[tokio::test]
    async fn test_full_sequence() {
        let usage = TokenUsage { prompt_tokens: 100, completion_tokens: 20, total_tokens: 120 };
        let events = run(vec![
            Ok(ModelChunk::Other),
            Ok(ModelChunk::ReasoningDelta("Look".to_string())),
            Ok(ModelChunk::ReasoningDelta("ing".to_string())),
            Ok(ModelChunk::AnswerDelta("Hel".to_string())),
            Ok(ModelChunk::AnswerDelta("lo".to_string())),
            Ok(ModelChunk::Usage(usage)),
        ])
        .await;

        assert_eq!(
            events,
            vec![
                RelayEvent::Thinking { reasoning_content: "Look".to_string() },
                RelayEvent::Thinking { reasoning_content: "Looking".to_string() },
                RelayEvent::Answering { answer_content: "Hel".to_string() },
                RelayEvent::Answering { answer_content: "Hello".to_string() },
                RelayEvent::Usage(usage),
                RelayEvent::Completed {
                    reasoning_content: "Looking".to_string(),
                    answer_content: "Hello".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_usage_before_content_is_tolerated() {
        let usage = TokenUsage::default();
        let events = run(vec![
            Ok(ModelChunk::Usage(usage)),
            Ok(ModelChunk::AnswerDelta("a".to_string())),
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], RelayEvent::Usage(usage));
        assert!(events[2].is_terminal());
    }

    #[tokio::test]
    async fn test_accumulators_equal_concatenated_deltas() {
        let reasoning = ["a", "", "bc", "d"];
        let answers = ["x", "", "yz"];
        let mut items = Vec::new();
        for r in reasoning {
            items.push(Ok(ModelChunk::ReasoningDelta(r.to_string())));
        }
        for a in answers {
            items.push(Ok(ModelChunk::AnswerDelta(a.to_string())));
        }
        items.push(Ok(ModelChunk::ReasoningDelta("late".to_string())));

        let events = run(items).await;

        let last = events.last().unwrap();
        assert_eq!(
            last,
            &RelayEvent::Completed {
                reasoning_content: "abcdlate".to_string(),
                answer_content: "xyz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_no_thinking_after_answering() {
        let events = run(vec![
            Ok(ModelChunk::ReasoningDelta("r1".to_string())),
            Ok(ModelChunk::AnswerDelta("a1".to_string())),
            Ok(ModelChunk::ReasoningDelta("r2".to_string())),
            Ok(ModelChunk::AnswerDelta("a2".to_string())),
        ])
        .await;

        let first_answer = events.iter().position(|e| e.status() == "answering").unwrap();
        assert!(events[first_answer..].iter().all(|e| e.status() != "thinking"));
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_and_it_is_last() {
        let events = run(vec![
            Ok(ModelChunk::AnswerDelta("a".to_string())),
            Ok(ModelChunk::Usage(TokenUsage::default())),
        ])
        .await;

        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_upstream_error_ends_with_error_event() {
        let events = run(vec![
            Ok(ModelChunk::AnswerDelta("partial".to_string())),
            Err(GatewayError::Stream("connection reset".to_string())),
            Ok(ModelChunk::AnswerDelta("never".to_string())),
        ])
        .await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            RelayEvent::Error { error } => assert!(error.contains("connection reset")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_stalled_stream() {
        let stalled: ChunkStream = Box::pin(
            stream::iter(vec![Ok(ModelChunk::AnswerDelta("a".to_string()))]).chain(stream::pending()),
        );
        let options = RelayOptions { idle_timeout: Some(Duration::from_secs(5)) };

        let events: Vec<_> = relay(stalled, options).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status(), "error");
    }

    /// Upstream that records when it is dropped
    struct TrackedUpstream {
        inner: ChunkStream,
        dropped: Arc<AtomicBool>,
    }

    impl Stream for TrackedUpstream {
        type Item = Result<ModelChunk, GatewayError>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.inner.as_mut().poll_next(cx)
        }
    }

    impl Drop for TrackedUpstream {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_client_disconnect_drops_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let upstream: ChunkStream = Box::pin(TrackedUpstream {
            inner: Box::pin(
                stream::iter(vec![Ok(ModelChunk::AnswerDelta("a".to_string()))]).chain(stream::pending()),
            ),
            dropped: dropped.clone(),
        });

        let mut events = Box::pin(relay(upstream, RelayOptions::default()));
        assert_eq!(
            events.next().await,
            Some(RelayEvent::Answering { answer_content: "a".to_string() })
        );
        assert!(!dropped.load(Ordering::SeqCst));

        drop(events);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_options_from_config() {
        let options = RelayOptions::from(RelayConfig { idle_timeout_secs: 30 });
        assert_eq!(options.idle_timeout, Some(Duration::from_secs(30)));

        let options = RelayOptions::from(RelayConfig { idle_timeout_secs: 0 });
        assert_eq!(options.idle_timeout, None);
    }

    #[test]
    fn test_phase_ordering_is_monotonic() {
        assert!(Phase::Thinking < Phase::Answering);
        assert!(Phase::Answering < Phase::Completed);
    }
}
