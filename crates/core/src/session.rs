//! Session value objects.
//!
//! A session is an ordered, append-only thread of finalized user/assistant
//! exchanges. Partial exchanges are never persisted: the ledger append
//! happens only after an orchestration reaches its terminal `Done` state.

use crate::id::{ConversationId, MessageId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary row for session listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub pinned: bool,
    pub archived: bool,
    pub message_count: usize,
}

/// Full session record with its ordered message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pinned: bool,
    pub archived: bool,
    pub conversation_id: ConversationId,
    pub messages: Vec<SessionMessage>,
}

/// One finalized message within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: MessageId,
    /// Position within the session (0-based, append order).
    pub idx: i64,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    pub conversation_id: ConversationId,
}

/// Partial update for a session. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.pinned.is_none() && self.archived.is_none()
    }
}

/// Ids minted by a successful user+assistant append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedExchange {
    pub session_id: SessionId,
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch() {
        assert!(SessionPatch::default().is_empty());
        let patch = SessionPatch {
            pinned: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_skips_absent_fields() {
        let patch = SessionPatch {
            title: Some("renamed".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains("renamed"));
        assert!(!json.contains("pinned"));
    }
}
