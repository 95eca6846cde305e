//! Storage traits — the vector store and the session ledger.
//!
//! Both are read-mostly collaborators with a stable contract: vectors have a
//! fixed dimension, uniqueness is per (anchor message, provider, model), and
//! all timestamps are UTC. Peek and hydration never mutate; the only write
//! path is the ledger append, performed once per finalized exchange.

use crate::error::{LedgerError, StoreError};
use crate::id::{ConversationId, MessageId, SessionId, TurnId};
use crate::session::{
    PersistedExchange, SessionDetail, SessionMessage, SessionPatch, SessionSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Optional restrictions on a nearest-neighbor query.
#[derive(Debug, Clone, Default)]
pub struct TurnFilter {
    /// Inclusive lower bound on the anchoring user message time.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the anchoring user message time.
    pub end_time: Option<DateTime<Utc>>,
    /// Restrict to a single archived conversation.
    pub conversation_id: Option<ConversationId>,
}

/// One nearest-neighbor hit with its joined message content.
///
/// Carries everything the peek engine needs so that ranking, binning, and
/// snippet extraction require no further round-trips.
#[derive(Debug, Clone)]
pub struct NeighborHit {
    pub turn_id: TurnId,
    pub user_message_id: MessageId,
    pub assistant_message_id: Option<MessageId>,
    pub used_summary: bool,
    pub conversation_id: ConversationId,
    pub create_time: Option<DateTime<Utc>>,
    pub user_text: Option<String>,
    pub assistant_text: Option<String>,
    pub assistant_summary: Option<String>,
    /// Raw vector distance (smaller is closer).
    pub distance: f32,
}

/// Full stored record for one turn, fetched by id for hydration.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub turn_id: TurnId,
    pub provider: String,
    pub model: String,
    pub user_message_id: MessageId,
    pub assistant_message_id: Option<MessageId>,
    pub used_summary: bool,
    pub embedding_created_at: DateTime<Utc>,
    pub conversation_id: ConversationId,
    pub create_time: Option<DateTime<Utc>>,
    pub user_text: Option<String>,
    pub assistant_text: Option<String>,
    pub assistant_summary: Option<String>,
}

/// The vector store trait.
///
/// Implementations: PostgreSQL + pgvector, in-memory (for testing).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "postgres", "in-memory").
    fn name(&self) -> &str;

    /// Return up to `top_k` nearest turns to `embedding`, ordered by
    /// ascending distance, restricted to the given provider/model pair and
    /// optional filters.
    async fn nearest(
        &self,
        embedding: &[f32],
        provider: &str,
        model: &str,
        top_k: usize,
        filter: &TurnFilter,
    ) -> std::result::Result<Vec<NeighborHit>, StoreError>;

    /// Fetch one turn by id, or `None` when the id is unknown.
    async fn fetch_turn(
        &self,
        turn_id: TurnId,
    ) -> std::result::Result<Option<TurnRecord>, StoreError>;
}

/// The session ledger trait — append-only persistence of finalized turns.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Create a new session (and its backing conversation).
    async fn create_session(
        &self,
        title: Option<String>,
    ) -> std::result::Result<(SessionId, ConversationId), LedgerError>;

    /// List sessions, pinned first then most recently updated.
    async fn list_sessions(
        &self,
        include_archived: bool,
    ) -> std::result::Result<Vec<SessionSummary>, LedgerError>;

    /// Fetch a session with its ordered message history.
    async fn get_session(
        &self,
        session_id: SessionId,
        include_archived: bool,
    ) -> std::result::Result<SessionDetail, LedgerError>;

    /// Apply a partial update (title / pinned / archived).
    async fn patch_session(
        &self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> std::result::Result<SessionDetail, LedgerError>;

    /// Ordered history of finalized messages for a session.
    async fn history(
        &self,
        session_id: SessionId,
    ) -> std::result::Result<Vec<SessionMessage>, LedgerError>;

    /// Append one finalized user+assistant exchange atomically.
    ///
    /// Rejects archived sessions and empty content. Callers must serialize
    /// appends per session; the ledger itself only guarantees that the two
    /// messages of one exchange land adjacently and in order.
    async fn append_exchange(
        &self,
        session_id: SessionId,
        user_content: &str,
        assistant_content: &str,
    ) -> std::result::Result<PersistedExchange, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_unrestricted() {
        let f = TurnFilter::default();
        assert!(f.start_time.is_none());
        assert!(f.end_time.is_none());
        assert!(f.conversation_id.is_none());
    }
}
