//! Token estimation for context budgeting.
//!
//! A cheap chars/4 heuristic, applied uniformly so budget decisions are
//! deterministic. Accuracy against any real tokenizer is not a goal; the
//! budgeter only needs a consistent yardstick.

use hindsight_core::HydratedTurn;

/// Fixed per-turn framing overhead (role labels, separators) in estimated
/// tokens, charged on top of the content itself.
pub const TURN_OVERHEAD_TOKENS: usize = 8;

/// Estimate the token count of a text: one token per four characters,
/// rounded up. Empty text estimates to zero.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    chars.div_ceil(4)
}

/// Estimated cost of injecting one hydrated turn into the model context.
pub fn turn_cost(turn: &HydratedTurn) -> usize {
    let user = turn.user_content.as_deref().map_or(0, estimate_tokens);
    let assistant = turn.assistant_content.as_deref().map_or(0, estimate_tokens);
    user + assistant + TURN_OVERHEAD_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hindsight_core::{ConversationId, MessageId, TurnId};

    fn turn(user: Option<&str>, assistant: Option<&str>) -> HydratedTurn {
        HydratedTurn {
            turn_id: TurnId::new(),
            provider: "hindsight".into(),
            model: "text-embedding-3-large".into(),
            conversation_id: ConversationId::new(),
            user_message_id: MessageId::new(),
            assistant_message_id: None,
            create_time: None,
            user_content: user.map(Into::into),
            assistant_content: assistant.map(Into::into),
            used_summary: false,
            truncated: false,
            embedding_created_at: Utc::now(),
        }
    }

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // Four multibyte chars estimate the same as four ASCII ones.
        assert_eq!(estimate_tokens("日本語だ"), 1);
    }

    #[test]
    fn turn_cost_includes_overhead() {
        let t = turn(Some("abcdefgh"), Some("abcd"));
        assert_eq!(turn_cost(&t), 2 + 1 + TURN_OVERHEAD_TOKENS);
    }

    #[test]
    fn missing_sides_cost_only_overhead() {
        assert_eq!(turn_cost(&turn(None, None)), TURN_OVERHEAD_TOKENS);
    }
}
