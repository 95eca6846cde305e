//! In-memory storage backend.
//!
//! Brute-force L2 scan over stored turns plus a HashMap-backed session
//! ledger. Used as a test fixture throughout the workspace; behavior matches
//! the Postgres backend for everything the traits promise.

use async_trait::async_trait;
use chrono::Utc;
use hindsight_core::error::{LedgerError, StoreError};
use hindsight_core::session::{
    PersistedExchange, SessionDetail, SessionMessage, SessionPatch, SessionSummary,
};
use hindsight_core::store::{NeighborHit, TurnFilter, TurnRecord, VectorStore};
use hindsight_core::{ConversationId, MessageId, SessionId, SessionLedger, TurnId};
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredTurn {
    record: TurnRecord,
    embedding: Vec<f32>,
}

struct SessionRow {
    id: SessionId,
    conversation_id: ConversationId,
    title: Option<String>,
    pinned: bool,
    archived: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    turns: Vec<StoredTurn>,
    sessions: Vec<SessionRow>,
    // Finalized session messages, keyed by backing conversation.
    messages: HashMap<ConversationId, Vec<SessionMessage>>,
}

/// An in-memory [`VectorStore`] + [`SessionLedger`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one embedded turn. Test fixture entry point.
    pub fn insert_turn(&self, record: TurnRecord, embedding: Vec<f32>) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.turns.push(StoredTurn { record, embedding });
    }

    pub fn turn_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").turns.len()
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        provider: &str,
        model: &str,
        top_k: usize,
        filter: &TurnFilter,
    ) -> Result<Vec<NeighborHit>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");

        let mut hits: Vec<NeighborHit> = inner
            .turns
            .iter()
            .filter(|t| t.record.provider == provider && t.record.model == model)
            .filter(|t| {
                if t.embedding.len() != embedding.len() {
                    return false;
                }
                let time_ok = match (filter.start_time, filter.end_time, t.record.create_time) {
                    (None, None, _) => true,
                    (start, end, Some(ts)) => {
                        start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
                    }
                    // Untimestamped turns never match a time filter.
                    (_, _, None) => false,
                };
                let conversation_ok = filter
                    .conversation_id
                    .map_or(true, |c| c == t.record.conversation_id);
                time_ok && conversation_ok
            })
            .map(|t| NeighborHit {
                turn_id: t.record.turn_id,
                user_message_id: t.record.user_message_id,
                assistant_message_id: t.record.assistant_message_id,
                used_summary: t.record.used_summary,
                conversation_id: t.record.conversation_id,
                create_time: t.record.create_time,
                user_text: t.record.user_text.clone(),
                assistant_text: t.record.assistant_text.clone(),
                assistant_summary: t.record.assistant_summary.clone(),
                distance: l2_distance(&t.embedding, embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn fetch_turn(&self, turn_id: TurnId) -> Result<Option<TurnRecord>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .turns
            .iter()
            .find(|t| t.record.turn_id == turn_id)
            .map(|t| t.record.clone()))
    }
}

#[async_trait]
impl SessionLedger for InMemoryStore {
    async fn create_session(
        &self,
        title: Option<String>,
    ) -> Result<(SessionId, ConversationId), LedgerError> {
        let session_id = SessionId::new();
        let conversation_id = ConversationId::new();
        let now = Utc::now();

        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.sessions.push(SessionRow {
            id: session_id,
            conversation_id,
            title,
            pinned: false,
            archived: false,
            created_at: now,
            updated_at: now,
        });
        inner.messages.entry(conversation_id).or_default();
        Ok((session_id, conversation_id))
    }

    async fn list_sessions(
        &self,
        include_archived: bool,
    ) -> Result<Vec<SessionSummary>, LedgerError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut summaries: Vec<SessionSummary> = inner
            .sessions
            .iter()
            .filter(|s| include_archived || !s.archived)
            .map(|s| SessionSummary {
                id: s.id,
                title: s.title.clone(),
                updated_at: s.updated_at,
                pinned: s.pinned,
                archived: s.archived,
                message_count: inner
                    .messages
                    .get(&s.conversation_id)
                    .map_or(0, Vec::len),
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(summaries)
    }

    async fn get_session(
        &self,
        session_id: SessionId,
        include_archived: bool,
    ) -> Result<SessionDetail, LedgerError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let session = inner
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        if session.archived && !include_archived {
            return Err(LedgerError::SessionNotFound(session_id.to_string()));
        }

        Ok(SessionDetail {
            id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            pinned: session.pinned,
            archived: session.archived,
            conversation_id: session.conversation_id,
            messages: inner
                .messages
                .get(&session.conversation_id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn patch_session(
        &self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<SessionDetail, LedgerError> {
        {
            let mut inner = self.inner.write().expect("store lock poisoned");
            let session = inner
                .sessions
                .iter_mut()
                .find(|s| s.id == session_id)
                .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

            if let Some(title) = patch.title {
                session.title = Some(title);
            }
            if let Some(pinned) = patch.pinned {
                session.pinned = pinned;
            }
            if let Some(archived) = patch.archived {
                session.archived = archived;
            }
            session.updated_at = Utc::now();
        }
        self.get_session(session_id, true).await
    }

    async fn history(&self, session_id: SessionId) -> Result<Vec<SessionMessage>, LedgerError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let session = inner
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        Ok(inner
            .messages
            .get(&session.conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_exchange(
        &self,
        session_id: SessionId,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<PersistedExchange, LedgerError> {
        if user_content.trim().is_empty() {
            return Err(LedgerError::EmptyContent("user"));
        }
        if assistant_content.trim().is_empty() {
            return Err(LedgerError::EmptyContent("assistant"));
        }

        let mut inner = self.inner.write().expect("store lock poisoned");
        let (conversation_id, archived) = inner
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| (s.conversation_id, s.archived))
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        if archived {
            return Err(LedgerError::SessionArchived(session_id.to_string()));
        }

        let now = Utc::now();
        let messages = inner.messages.entry(conversation_id).or_default();
        let next_idx = messages.last().map_or(0, |m| m.idx + 1);

        let user_message_id = MessageId::new();
        let assistant_message_id = MessageId::new();

        messages.push(SessionMessage {
            id: user_message_id,
            idx: next_idx,
            role: "user".into(),
            content: user_content.into(),
            create_time: Some(now),
            conversation_id,
        });
        messages.push(SessionMessage {
            id: assistant_message_id,
            idx: next_idx + 1,
            role: "assistant".into(),
            content: assistant_content.into(),
            create_time: Some(now),
            conversation_id,
        });

        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.updated_at = now;
        }

        Ok(PersistedExchange {
            session_id,
            conversation_id,
            user_message_id,
            assistant_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(embedding_day: u32) -> TurnRecord {
        TurnRecord {
            turn_id: TurnId::new(),
            provider: "hindsight".into(),
            model: "test-embed".into(),
            user_message_id: MessageId::new(),
            assistant_message_id: Some(MessageId::new()),
            used_summary: false,
            embedding_created_at: Utc::now(),
            conversation_id: ConversationId::new(),
            create_time: Some(
                Utc.with_ymd_and_hms(2024, 3, embedding_day, 12, 0, 0).unwrap(),
            ),
            user_text: Some("question".into()),
            assistant_text: Some("answer".into()),
            assistant_summary: None,
        }
    }

    #[tokio::test]
    async fn nearest_orders_by_distance() {
        let store = InMemoryStore::new();
        let far = record(1);
        let near = record(2);
        let near_id = near.turn_id;
        store.insert_turn(far, vec![10.0, 0.0]);
        store.insert_turn(near, vec![1.0, 0.0]);

        let hits = store
            .nearest(&[0.0, 0.0], "hindsight", "test-embed", 10, &TurnFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].turn_id, near_id);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn nearest_respects_provider_model_pair() {
        let store = InMemoryStore::new();
        let mut other = record(1);
        other.model = "other-model".into();
        store.insert_turn(other, vec![0.0, 0.0]);
        store.insert_turn(record(2), vec![0.0, 0.0]);

        let hits = store
            .nearest(&[0.0, 0.0], "hindsight", "test-embed", 10, &TurnFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn time_filter_bounds_are_inclusive() {
        let store = InMemoryStore::new();
        store.insert_turn(record(1), vec![0.0]);
        store.insert_turn(record(5), vec![0.0]);
        store.insert_turn(record(9), vec![0.0]);

        let filter = TurnFilter {
            start_time: Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()),
            end_time: Some(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()),
            conversation_id: None,
        };
        let hits = store
            .nearest(&[0.0], "hindsight", "test-embed", 10, &filter)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn fetch_turn_roundtrip() {
        let store = InMemoryStore::new();
        let r = record(1);
        let id = r.turn_id;
        store.insert_turn(r, vec![0.0]);

        assert!(store.fetch_turn(id).await.unwrap().is_some());
        assert!(store.fetch_turn(TurnId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exchange_append_is_ordered() {
        let store = InMemoryStore::new();
        let (session_id, _) = store.create_session(None).await.unwrap();

        store
            .append_exchange(session_id, "first q", "first a")
            .await
            .unwrap();
        store
            .append_exchange(session_id, "second q", "second a")
            .await
            .unwrap();

        let history = store.history(session_id).await.unwrap();
        assert_eq!(history.len(), 4);
        let idxs: Vec<i64> = history.iter().map(|m| m.idx).collect();
        assert_eq!(idxs, vec![0, 1, 2, 3]);
        assert_eq!(history[2].content, "second q");
        assert_eq!(history[3].role, "assistant");
    }

    #[tokio::test]
    async fn archived_sessions_reject_appends_and_hide() {
        let store = InMemoryStore::new();
        let (session_id, _) = store.create_session(Some("old".into())).await.unwrap();
        store
            .patch_session(
                session_id,
                SessionPatch {
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .append_exchange(session_id, "q", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SessionArchived(_)));

        assert!(store.list_sessions(false).await.unwrap().is_empty());
        assert_eq!(store.list_sessions(true).await.unwrap().len(), 1);
        assert!(store.get_session(session_id, false).await.is_err());
        assert!(store.get_session(session_id, true).await.is_ok());
    }

    #[tokio::test]
    async fn empty_content_rejected() {
        let store = InMemoryStore::new();
        let (session_id, _) = store.create_session(None).await.unwrap();
        let err = store
            .append_exchange(session_id, "  ", "answer")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EmptyContent("user")));
    }

    #[tokio::test]
    async fn pinned_sessions_list_first() {
        let store = InMemoryStore::new();
        let (first, _) = store.create_session(Some("a".into())).await.unwrap();
        let (second, _) = store.create_session(Some("b".into())).await.unwrap();
        store
            .patch_session(
                first,
                SessionPatch {
                    pinned: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sessions = store.list_sessions(false).await.unwrap();
        assert_eq!(sessions[0].id, first);
        assert_eq!(sessions[1].id, second);
    }
}
