//! Context budgeting for hydrated turns.
//!
//! Before each model round the orchestrator runs the round's hydrated turns
//! through [`BudgetCaps::select`], which keeps a prefix of the requested
//! turns (in request order) and reports exactly which turns were dropped and
//! why. The selection is greedy and order-preserving: no reordering, no
//! knapsack packing.

use crate::token::turn_cost;
use hindsight_core::{HydratedTurn, TurnId};
use serde::Serialize;

/// The two hard caps applied to a round's hydrated context.
#[derive(Debug, Clone, Copy)]
pub struct BudgetCaps {
    /// Maximum number of hydrated turns injected per round.
    pub max_turns: usize,
    /// Maximum estimated tokens across all injected turns.
    pub max_tokens: usize,
}

impl BudgetCaps {
    pub fn new(max_turns: usize, max_tokens: usize) -> Self {
        Self {
            max_turns,
            max_tokens,
        }
    }

    /// Select which turns fit under the caps, preserving request order.
    ///
    /// Turns are considered one at a time. A turn past the count cap is
    /// excluded for `over_turn_cap`; a turn whose estimated cost would push
    /// the running total past the token cap is excluded for
    /// `over_token_cap`, and later turns are still considered (a smaller
    /// turn may still fit).
    pub fn select(&self, turns: Vec<HydratedTurn>) -> BudgetOutcome {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut spent = 0usize;

        for turn in turns {
            if included.len() >= self.max_turns {
                excluded.push(ExcludedTurn {
                    turn_id: turn.turn_id,
                    reason: ExclusionReason::OverTurnCap,
                });
                continue;
            }
            let cost = turn_cost(&turn);
            if spent + cost > self.max_tokens {
                excluded.push(ExcludedTurn {
                    turn_id: turn.turn_id,
                    reason: ExclusionReason::OverTokenCap,
                });
                continue;
            }
            spent += cost;
            included.push(turn);
        }

        BudgetOutcome {
            included,
            excluded,
            estimated_tokens: spent,
        }
    }
}

/// The result of one budget pass.
#[derive(Debug)]
pub struct BudgetOutcome {
    /// Turns that fit, in the order they were requested.
    pub included: Vec<HydratedTurn>,
    /// Turns that were dropped, with the cap that dropped them.
    pub excluded: Vec<ExcludedTurn>,
    /// Total estimated token cost of the included turns.
    pub estimated_tokens: usize,
}

/// One dropped turn and why it was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ExcludedTurn {
    pub turn_id: TurnId,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The per-round hydrated-turn count cap was already full.
    OverTurnCap,
    /// Including this turn would exceed the token cap.
    OverTokenCap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hindsight_core::{ConversationId, MessageId};

    fn turn_with_chars(user_chars: usize) -> HydratedTurn {
        HydratedTurn {
            turn_id: TurnId::new(),
            provider: "hindsight".into(),
            model: "text-embedding-3-large".into(),
            conversation_id: ConversationId::new(),
            user_message_id: MessageId::new(),
            assistant_message_id: None,
            create_time: None,
            user_content: Some("x".repeat(user_chars)),
            assistant_content: None,
            used_summary: false,
            truncated: false,
            embedding_created_at: Utc::now(),
        }
    }

    #[test]
    fn under_caps_everything_included() {
        let caps = BudgetCaps::new(10, 10_000);
        let out = caps.select((0..3).map(|_| turn_with_chars(40)).collect());
        assert_eq!(out.included.len(), 3);
        assert!(out.excluded.is_empty());
    }

    #[test]
    fn count_cap_drops_exactly_the_overflow() {
        // 25 requested against a cap of 20: exactly 5 excluded, all for the
        // count cap, and the included set is the first 20 in request order.
        let caps = BudgetCaps::new(20, 1_000_000);
        let turns: Vec<_> = (0..25).map(|_| turn_with_chars(100)).collect();
        let ids: Vec<_> = turns.iter().map(|t| t.turn_id).collect();

        let out = caps.select(turns);
        assert_eq!(out.included.len(), 20);
        assert_eq!(out.excluded.len(), 5);
        assert!(out
            .excluded
            .iter()
            .all(|e| e.reason == ExclusionReason::OverTurnCap));
        let included_ids: Vec<_> = out.included.iter().map(|t| t.turn_id).collect();
        assert_eq!(included_ids, ids[..20]);
    }

    #[test]
    fn token_cap_skips_but_keeps_scanning() {
        // cap 60: first turn costs 8+40=48, second would cost 48 (over),
        // third costs 8+4=12 and still fits.
        let caps = BudgetCaps::new(10, 60);
        let turns = vec![
            turn_with_chars(160),
            turn_with_chars(160),
            turn_with_chars(16),
        ];
        let skipped = turns[1].turn_id;

        let out = caps.select(turns);
        assert_eq!(out.included.len(), 2);
        assert_eq!(out.excluded.len(), 1);
        assert_eq!(out.excluded[0].turn_id, skipped);
        assert_eq!(out.excluded[0].reason, ExclusionReason::OverTokenCap);
        assert_eq!(out.estimated_tokens, 60);
    }

    #[test]
    fn order_is_preserved() {
        let caps = BudgetCaps::new(10, 10_000);
        let turns: Vec<_> = (0..5).map(|_| turn_with_chars(8)).collect();
        let ids: Vec<_> = turns.iter().map(|t| t.turn_id).collect();
        let out = caps.select(turns);
        let got: Vec<_> = out.included.iter().map(|t| t.turn_id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn rerun_yields_identical_partition() {
        // Costs: 18, 48, 12, 18. Caps (2, 40) admit the first and third,
        // drop the second for tokens and the fourth for count.
        let caps = BudgetCaps::new(2, 40);
        let turns = vec![
            turn_with_chars(40),
            turn_with_chars(160),
            turn_with_chars(16),
            turn_with_chars(40),
        ];

        let first = caps.select(turns.clone());
        let second = caps.select(turns);

        let included = |out: &BudgetOutcome| -> Vec<TurnId> {
            out.included.iter().map(|t| t.turn_id).collect()
        };
        let excluded = |out: &BudgetOutcome| -> Vec<(TurnId, ExclusionReason)> {
            out.excluded.iter().map(|e| (e.turn_id, e.reason)).collect()
        };
        assert_eq!(included(&first), included(&second));
        assert_eq!(excluded(&first), excluded(&second));
        assert_eq!(first.estimated_tokens, second.estimated_tokens);
        assert_eq!(
            excluded(&first).iter().map(|(_, r)| *r).collect::<Vec<_>>(),
            vec![ExclusionReason::OverTokenCap, ExclusionReason::OverTurnCap]
        );
    }

    #[test]
    fn exclusion_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExclusionReason::OverTokenCap).unwrap();
        assert_eq!(json, r#""over_token_cap""#);
    }
}
