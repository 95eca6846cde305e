//! PostgreSQL + pgvector storage backend.
//!
//! Implements [`VectorStore`] (exact nearest-neighbor via pgvector's `<->`
//! L2 operator, restricted to one provider/model pair) and [`SessionLedger`]
//! (transactional, ordered append of finalized exchanges).
//!
//! # Setup
//!
//! ```sql
//! CREATE EXTENSION IF NOT EXISTS vector;
//! ```
//!
//! Then run the migration in `migrations/001_init.sql` (see [`PgStore::migrate`]).

use async_trait::async_trait;
use chrono::Utc;
use hindsight_core::error::{LedgerError, StoreError};
use hindsight_core::session::{
    PersistedExchange, SessionDetail, SessionMessage, SessionPatch, SessionSummary,
};
use hindsight_core::store::{NeighborHit, TurnFilter, TurnRecord, VectorStore};
use hindsight_core::{ConversationId, MessageId, SessionId, SessionLedger, TurnId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// PostgreSQL backend for turns and sessions.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let migration_sql = include_str!("../migrations/001_init.sql");

        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        info!("Schema migration complete");
        Ok(())
    }

    /// pgvector literal for a query embedding.
    fn vector_literal(embedding: &[f32]) -> String {
        format!(
            "[{}]",
            embedding
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )
    }
}

fn hit_from_row(row: &PgRow) -> NeighborHit {
    NeighborHit {
        turn_id: TurnId::from(row.get::<Uuid, _>("id")),
        user_message_id: MessageId::from(row.get::<Uuid, _>("user_message_id")),
        assistant_message_id: row
            .get::<Option<Uuid>, _>("assistant_message_id")
            .map(MessageId::from),
        used_summary: row.get("used_summary"),
        conversation_id: ConversationId::from(row.get::<Uuid, _>("conversation_id")),
        create_time: row.get("create_time"),
        user_text: row.get("user_text"),
        assistant_text: row.get("assistant_text"),
        assistant_summary: row.get("assistant_summary"),
        distance: row.get::<f64, _>("distance") as f32,
    }
}

fn session_message_from_row(row: &PgRow) -> SessionMessage {
    SessionMessage {
        id: MessageId::from(row.get::<Uuid, _>("id")),
        idx: row.get("idx"),
        role: row.get("role"),
        content: row.get::<Option<String>, _>("content").unwrap_or_default(),
        create_time: row.get("create_time"),
        conversation_id: ConversationId::from(row.get::<Uuid, _>("conversation_id")),
    }
}

#[async_trait]
impl VectorStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        provider: &str,
        model: &str,
        top_k: usize,
        filter: &TurnFilter,
    ) -> Result<Vec<NeighborHit>, StoreError> {
        let mut conditions = vec!["t.provider = $2".to_string(), "t.model = $3".to_string()];
        let mut next_param = 4;

        if filter.start_time.is_some() {
            conditions.push(format!("um.create_time >= ${next_param}"));
            next_param += 1;
        }
        if filter.end_time.is_some() {
            conditions.push(format!("um.create_time <= ${next_param}"));
            next_param += 1;
        }
        if filter.conversation_id.is_some() {
            conditions.push(format!("t.conversation_id = ${next_param}"));
            next_param += 1;
        }

        let sql = format!(
            "SELECT t.id, t.user_message_id, t.assistant_message_id, t.used_summary, \
             t.conversation_id, um.create_time, \
             um.content AS user_text, am.content AS assistant_text, \
             am.summary AS assistant_summary, \
             (t.embedding <-> $1::vector)::float8 AS distance \
             FROM turn_embeddings t \
             JOIN messages um ON um.id = t.user_message_id \
             LEFT JOIN messages am ON am.id = t.assistant_message_id \
             WHERE {} \
             ORDER BY t.embedding <-> $1::vector ASC \
             LIMIT ${next_param}",
            conditions.join(" AND ")
        );

        debug!(top_k, provider, model, "Nearest-neighbor query");

        let mut qb = sqlx::query(&sql)
            .bind(Self::vector_literal(embedding))
            .bind(provider)
            .bind(model);
        if let Some(start) = filter.start_time {
            qb = qb.bind(start);
        }
        if let Some(end) = filter.end_time {
            qb = qb.bind(end);
        }
        if let Some(conversation_id) = filter.conversation_id {
            qb = qb.bind(conversation_id.0);
        }
        qb = qb.bind(top_k as i64);

        let rows = qb
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Nearest-neighbor search: {e}")))?;

        Ok(rows.iter().map(hit_from_row).collect())
    }

    async fn fetch_turn(&self, turn_id: TurnId) -> Result<Option<TurnRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT t.id, t.provider, t.model, t.user_message_id, t.assistant_message_id, \
             t.used_summary, t.created_at, t.conversation_id, um.create_time, \
             um.content AS user_text, am.content AS assistant_text, \
             am.summary AS assistant_summary \
             FROM turn_embeddings t \
             JOIN messages um ON um.id = t.user_message_id \
             LEFT JOIN messages am ON am.id = t.assistant_message_id \
             WHERE t.id = $1",
        )
        .bind(turn_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Turn fetch: {e}")))?;

        Ok(row.map(|row| TurnRecord {
            turn_id: TurnId::from(row.get::<Uuid, _>("id")),
            provider: row.get("provider"),
            model: row.get("model"),
            user_message_id: MessageId::from(row.get::<Uuid, _>("user_message_id")),
            assistant_message_id: row
                .get::<Option<Uuid>, _>("assistant_message_id")
                .map(MessageId::from),
            used_summary: row.get("used_summary"),
            embedding_created_at: row.get("created_at"),
            conversation_id: ConversationId::from(row.get::<Uuid, _>("conversation_id")),
            create_time: row.get("create_time"),
            user_text: row.get("user_text"),
            assistant_text: row.get("assistant_text"),
            assistant_summary: row.get("assistant_summary"),
        }))
    }
}

#[async_trait]
impl SessionLedger for PgStore {
    async fn create_session(
        &self,
        title: Option<String>,
    ) -> Result<(SessionId, ConversationId), LedgerError> {
        let session_id = SessionId::new();
        let conversation_id = ConversationId::new();
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversations (id, title, source, create_time, update_time) \
             VALUES ($1, $2, 'session', $3, $3)",
        )
        .bind(conversation_id.0)
        .bind(&title)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO sessions (id, conversation_id, title, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4)",
        )
        .bind(session_id.0)
        .bind(conversation_id.0)
        .bind(&title)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        debug!(session_id = %session_id, "Created session");
        Ok((session_id, conversation_id))
    }

    async fn list_sessions(
        &self,
        include_archived: bool,
    ) -> Result<Vec<SessionSummary>, LedgerError> {
        let archived_clause = if include_archived {
            ""
        } else {
            "WHERE NOT s.archived "
        };
        let sql = format!(
            "SELECT s.id, s.title, s.updated_at, s.pinned, s.archived, \
             (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = s.conversation_id) AS message_count \
             FROM sessions s \
             {archived_clause}\
             ORDER BY s.pinned DESC, s.updated_at DESC"
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| SessionSummary {
                id: SessionId::from(row.get::<Uuid, _>("id")),
                title: row.get("title"),
                updated_at: row.get("updated_at"),
                pinned: row.get("pinned"),
                archived: row.get("archived"),
                message_count: row.get::<i64, _>("message_count") as usize,
            })
            .collect())
    }

    async fn get_session(
        &self,
        session_id: SessionId,
        include_archived: bool,
    ) -> Result<SessionDetail, LedgerError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, title, pinned, archived, created_at, updated_at \
             FROM sessions WHERE id = $1",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        let archived: bool = row.get("archived");
        if archived && !include_archived {
            return Err(LedgerError::SessionNotFound(session_id.to_string()));
        }

        let messages = self.history(session_id).await?;

        Ok(SessionDetail {
            id: SessionId::from(row.get::<Uuid, _>("id")),
            title: row.get("title"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            pinned: row.get("pinned"),
            archived,
            conversation_id: ConversationId::from(row.get::<Uuid, _>("conversation_id")),
            messages,
        })
    }

    async fn patch_session(
        &self,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<SessionDetail, LedgerError> {
        if !patch.is_empty() {
            let result = sqlx::query(
                "UPDATE sessions SET \
                 title = COALESCE($2, title), \
                 pinned = COALESCE($3, pinned), \
                 archived = COALESCE($4, archived), \
                 updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(session_id.0)
            .bind(&patch.title)
            .bind(patch.pinned)
            .bind(patch.archived)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

            if result.rows_affected() == 0 {
                return Err(LedgerError::SessionNotFound(session_id.to_string()));
            }
        }

        // Patched sessions stay visible even when newly archived.
        self.get_session(session_id, true).await
    }

    async fn history(&self, session_id: SessionId) -> Result<Vec<SessionMessage>, LedgerError> {
        let rows = sqlx::query(
            "SELECT m.id, m.idx, m.role, m.content, m.create_time, m.conversation_id \
             FROM messages m \
             JOIN sessions s ON s.conversation_id = m.conversation_id \
             WHERE s.id = $1 \
             ORDER BY m.idx ASC",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(rows.iter().map(session_message_from_row).collect())
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let session = sqlx::query(
            "SELECT conversation_id, archived FROM sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        if session.get::<bool, _>("archived") {
            return Err(LedgerError::SessionArchived(session_id.to_string()));
        }
        let conversation_id = ConversationId::from(session.get::<Uuid, _>("conversation_id"));

        let next_idx: i64 = sqlx::query(
            "SELECT COALESCE(MAX(idx) + 1, 0) AS next_idx FROM messages \
             WHERE conversation_id = $1",
        )
        .bind(conversation_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .get("next_idx");

        let user_message_id = MessageId::new();
        let assistant_message_id = MessageId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, create_time, idx) \
             VALUES ($1, $2, 'user', $3, $4, $5), ($6, $2, 'assistant', $7, $4, $8)",
        )
        .bind(user_message_id.0)
        .bind(conversation_id.0)
        .bind(user_content)
        .bind(now)
        .bind(next_idx)
        .bind(assistant_message_id.0)
        .bind(assistant_content)
        .bind(next_idx + 1)
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query("UPDATE sessions SET updated_at = $2 WHERE id = $1")
            .bind(session_id.0)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        debug!(session_id = %session_id, idx = next_idx, "Appended exchange");

        Ok(PersistedExchange {
            session_id,
            conversation_id,
            user_message_id,
            assistant_message_id,
        })
    }
}

// ── Unit tests (no DB required) ──────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_format() {
        let literal = PgStore::vector_literal(&[0.1, 0.2, 0.3]);
        assert_eq!(literal, "[0.1,0.2,0.3]");
    }

    #[test]
    fn vector_literal_empty() {
        assert_eq!(PgStore::vector_literal(&[]), "[]");
    }
}
