//! Chat stream events.
//!
//! `ChatEvent` is the unit of the outbound stream a chat request produces:
//! an ordered, single-consumer sequence of token deltas terminated by a
//! `done` sentinel, with one `metadata` event carrying the finalize payload.

use crate::id::{ConversationId, MessageId, SessionId, TurnId};
use crate::turn::Histogram;
use serde::{Deserialize, Serialize};

/// Events emitted by an orchestration, in emission order.
///
/// - `token`    — partial answer content from the model
/// - `metadata` — finalize payload (citations, histogram, persisted ids)
/// - `error`    — the request failed; no persistence happened
/// - `done`     — stream sentinel, always last on success
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Partial answer text from the model.
    Token { content: String },

    /// Finalize metadata, emitted once after the answer completes.
    Metadata {
        /// Turns hydrated and admitted to the context this request, in
        /// admission order. Budget-excluded hydrations are not cited.
        cited_turn_ids: Vec<TurnId>,
        /// The histogram from the most recent peek, if any peek ran.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        histogram: Option<Histogram>,
        session_id: SessionId,
        conversation_id: ConversationId,
        user_message_id: MessageId,
        assistant_message_id: MessageId,
    },

    /// The request failed mid-stream.
    Error { message: String },

    /// Stream complete.
    Done,
}

impl ChatEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Metadata { .. } => "metadata",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}
