//! Per-request accumulation state

use std::fmt;

use super::events::RelayEvent;
use crate::gateway::ModelChunk;

/// Relay phase. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Thinking,
    Answering,
    Completed,
}

/// Text accumulated so far for one relay invocation
#[derive(Debug)]
pub struct RelayState {
    reasoning: String,
    answer: String,
    phase: Phase,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            reasoning: String::new(),
            answer: String::new(),
            phase: Phase::Thinking,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Fold one chunk into the state and return the event it produces, if any.
    pub fn apply(&mut self, chunk: ModelChunk) -> Option<RelayEvent> {
        if self.phase == Phase::Completed {
            return None;
        }

        match chunk {
            ModelChunk::Usage(usage) => Some(RelayEvent::Usage(usage)),
            ModelChunk::ReasoningDelta(delta) => {
                self.reasoning.push_str(&delta);
                // Late reasoning still counts toward the total but must not
                // move the caller back to the thinking view.
                if self.phase == Phase::Answering {
                    return None;
                }
                Some(RelayEvent::Thinking {
                    reasoning_content: self.reasoning.clone(),
                })
            }
            ModelChunk::AnswerDelta(delta) if !delta.is_empty() => {
                self.phase = Phase::Answering;
                self.answer.push_str(&delta);
                Some(RelayEvent::Answering {
                    answer_content: self.answer.clone(),
                })
            }
            ModelChunk::AnswerDelta(_) | ModelChunk::Other => None,
        }
    }

    /// Close the relay after the upstream is exhausted.
    pub fn finish(&mut self) -> RelayEvent {
        self.phase = Phase::Completed;
        RelayEvent::Completed {
            reasoning_content: self.reasoning.clone(),
            answer_content: self.answer.clone(),
        }
    }

    /// Close the relay after an upstream failure.
    pub fn fail(&mut self, error: impl fmt::Display) -> RelayEvent {
        self.phase = Phase::Completed;
        RelayEvent::Error {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TokenUsage;

    fn reasoning(s: &str) -> ModelChunk {
        ModelChunk::ReasoningDelta(s.to_string())
    }

    fn answer(s: &str) -> ModelChunk {
        ModelChunk::AnswerDelta(s.to_string())
    }

    #[test]
    fn test_initial_state() {
        let state = RelayState::new();
        assert_eq!(state.phase(), Phase::Thinking);
        assert!(state.reasoning().is_empty());
        assert!(state.answer().is_empty());
    }

    #[test]
    fn test_events_carry_cumulative_text() {
        let mut state = RelayState::new();
        assert_eq!(
            state.apply(reasoning("one ")),
            Some(RelayEvent::Thinking { reasoning_content: "one ".to_string() })
        );
        assert_eq!(
            state.apply(reasoning("two")),
            Some(RelayEvent::Thinking { reasoning_content: "one two".to_string() })
        );
        assert_eq!(
            state.apply(answer("A")),
            Some(RelayEvent::Answering { answer_content: "A".to_string() })
        );
        assert_eq!(
            state.apply(answer("B")),
            Some(RelayEvent::Answering { answer_content: "AB".to_string() })
        );
    }

    #[test]
    fn test_first_answer_moves_phase() {
        let mut state = RelayState::new();
        state.apply(reasoning("r"));
        assert_eq!(state.phase(), Phase::Thinking);
        state.apply(answer("a"));
        assert_eq!(state.phase(), Phase::Answering);
    }

    #[test]
    fn test_thinking_can_be_skipped() {
        let mut state = RelayState::new();
        state.apply(answer("direct"));
        assert_eq!(state.phase(), Phase::Answering);
        assert!(state.reasoning().is_empty());
    }

    #[test]
    fn test_late_reasoning_is_accumulated_silently() {
        let mut state = RelayState::new();
        state.apply(answer("a"));
        assert_eq!(state.apply(reasoning("late")), None);
        assert_eq!(state.phase(), Phase::Answering);
        assert_eq!(state.reasoning(), "late");
    }

    #[test]
    fn test_empty_reasoning_still_emits() {
        let mut state = RelayState::new();
        assert_eq!(
            state.apply(reasoning("")),
            Some(RelayEvent::Thinking { reasoning_content: String::new() })
        );
    }

    #[test]
    fn test_empty_answer_and_other_are_skipped() {
        let mut state = RelayState::new();
        assert_eq!(state.apply(answer("")), None);
        assert_eq!(state.apply(ModelChunk::Other), None);
        assert_eq!(state.phase(), Phase::Thinking);
    }

    #[test]
    fn test_usage_passes_through_in_any_phase() {
        let usage = TokenUsage { prompt_tokens: 9, completion_tokens: 1, total_tokens: 10 };
        let mut state = RelayState::new();
        assert_eq!(state.apply(ModelChunk::Usage(usage)), Some(RelayEvent::Usage(usage)));
        state.apply(answer("x"));
        assert_eq!(state.apply(ModelChunk::Usage(usage)), Some(RelayEvent::Usage(usage)));
        assert_eq!(state.phase(), Phase::Answering);
    }

    #[test]
    fn test_finish_reports_both_accumulators() {
        let mut state = RelayState::new();
        state.apply(reasoning("why"));
        state.apply(answer("because"));
        assert_eq!(
            state.finish(),
            RelayEvent::Completed {
                reasoning_content: "why".to_string(),
                answer_content: "because".to_string(),
            }
        );
        assert_eq!(state.phase(), Phase::Completed);
    }

    #[test]
    fn test_nothing_applies_after_completion() {
        let mut state = RelayState::new();
        state.finish();
        assert_eq!(state.apply(answer("x")), None);
        assert!(state.answer().is_empty());
    }

    #[test]
    fn test_fail_is_terminal_error() {
        let mut state = RelayState::new();
        let event = state.fail("connection reset");
        assert_eq!(event, RelayEvent::Error { error: "connection reset".to_string() });
        assert!(event.is_terminal());
        assert_eq!(state.phase(), Phase::Completed);
    }
}
