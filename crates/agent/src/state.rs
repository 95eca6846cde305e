//! Per-request orchestration state.
//!
//! One [`OrchestrationState`] is owned by exactly one in-flight chat request.
//! It tracks the phase, round counters, the budget spent so far, the turns
//! hydrated and admitted this request (the citation set), and the histogram
//! from the most recent peek.

use hindsight_core::{Histogram, HydratedTurn, TurnId};
use hindsight_retrieval::token::turn_cost;

/// Where a request currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A chat-completion round is in flight.
    AwaitingModel,
    /// The model asked for tools; they are being executed.
    ToolCallPending,
    /// The final answer is streaming out.
    StreamingAnswer,
    /// Terminal: answer complete, exchange persisted.
    Done,
    /// Terminal: the request failed; nothing was persisted.
    Failed,
}

/// Mutable state for one orchestration.
#[derive(Debug)]
pub struct OrchestrationState {
    pub phase: Phase,
    /// Completed model rounds.
    pub round: u32,
    /// Malformed tool calls fed back for self-repair so far.
    pub correction_rounds: u32,
    /// Turn ids hydrated and admitted to the context, in admission order.
    /// This is the citation set.
    pub cited_turn_ids: Vec<TurnId>,
    /// Hydrated turns admitted this request, counted against the caps.
    pub admitted_turns: usize,
    /// Estimated tokens spent on admitted turns.
    pub spent_tokens: usize,
    /// Histogram from the most recent peek, if any peek ran.
    pub last_histogram: Option<Histogram>,
}

impl OrchestrationState {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingModel,
            round: 0,
            correction_rounds: 0,
            cited_turn_ids: Vec::new(),
            admitted_turns: 0,
            spent_tokens: 0,
            last_histogram: None,
        }
    }

    /// Record one admitted hydrated turn: charge the budget and cite it.
    /// The same turn hydrated twice is charged twice but cited once.
    pub fn admit(&mut self, turn: &HydratedTurn) {
        self.admitted_turns += 1;
        self.spent_tokens += turn_cost(turn);
        if !self.cited_turn_ids.contains(&turn.turn_id) {
            self.cited_turn_ids.push(turn.turn_id);
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Failed)
    }
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hindsight_core::{ConversationId, MessageId};

    fn turn(chars: usize) -> HydratedTurn {
        HydratedTurn {
            turn_id: TurnId::new(),
            provider: "hindsight".into(),
            model: "test-embed".into(),
            conversation_id: ConversationId::new(),
            user_message_id: MessageId::new(),
            assistant_message_id: None,
            create_time: None,
            user_content: Some("x".repeat(chars)),
            assistant_content: None,
            used_summary: false,
            truncated: false,
            embedding_created_at: Utc::now(),
        }
    }

    #[test]
    fn admission_charges_budget_and_cites() {
        let mut state = OrchestrationState::new();
        let t = turn(40);
        state.admit(&t);
        assert_eq!(state.admitted_turns, 1);
        assert!(state.spent_tokens > 0);
        assert_eq!(state.cited_turn_ids, vec![t.turn_id]);
    }

    #[test]
    fn repeat_hydration_cites_once() {
        let mut state = OrchestrationState::new();
        let t = turn(40);
        state.admit(&t);
        state.admit(&t);
        assert_eq!(state.admitted_turns, 2);
        assert_eq!(state.cited_turn_ids.len(), 1);
    }

    #[test]
    fn terminal_phases() {
        let mut state = OrchestrationState::new();
        assert!(!state.is_terminal());
        state.phase = Phase::Failed;
        assert!(state.is_terminal());
    }
}
