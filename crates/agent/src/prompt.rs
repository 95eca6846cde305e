//! System prompt and model-facing message assembly.

use hindsight_core::message::Message;
use hindsight_core::session::SessionMessage;

/// The orchestrator system prompt. The model is told to probe with `peek`,
/// hydrate before quoting, and cite only hydrated turns.
pub const SYSTEM_PROMPT: &str = "\
You are Hindsight, an assistant that answers questions about the user's own \
archived conversation history.

You have two tools:
- `peek`: semantic search over the archive. Returns a time histogram over \
all matches plus short snippet previews of the best ones. Snippets are \
previews only and must never be quoted.
- `hydrate_turn`: fetch the full content of one turn found via peek. Only \
hydrated turns are quotable evidence.

Work in passes: start with one or more peeks to find when and where the \
relevant conversations happened, then hydrate the specific turns you need. \
Prefer several narrow peeks over one broad one. Ground every claim in \
hydrated turns; when the archive does not contain an answer, say so rather \
than guessing. Mention dates when the histogram makes the timeline relevant.";

/// Fold persisted session history into model-facing messages.
///
/// Only user and assistant rows are replayed; tool traffic from prior
/// requests is never persisted, so there is nothing to filter out.
pub fn history_messages(history: &[SessionMessage]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|m| match m.role.as_str() {
            "user" => Some(Message::user(&m.content)),
            "assistant" => Some(Message::assistant(&m.content)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hindsight_core::{ConversationId, MessageId};

    fn row(role: &str, content: &str, idx: i64) -> SessionMessage {
        SessionMessage {
            id: MessageId::new(),
            idx,
            role: role.into(),
            content: content.into(),
            create_time: None,
            conversation_id: ConversationId::new(),
        }
    }

    #[test]
    fn history_preserves_order_and_roles() {
        let history = vec![
            row("user", "first question", 0),
            row("assistant", "first answer", 1),
            row("user", "second question", 2),
        ];
        let messages = history_messages(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "first question");
        assert_eq!(messages[1].content, "first answer");
        assert_eq!(
            messages[2].role,
            hindsight_core::message::Role::User
        );
    }

    #[test]
    fn unknown_roles_skipped() {
        let history = vec![row("system", "noise", 0), row("user", "q", 1)];
        assert_eq!(history_messages(&history).len(), 1);
    }
}
