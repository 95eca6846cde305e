//! Turn hydration — expand a turn id into quotable content.
//!
//! Hydration re-reads the stored messages on every request (no caching of
//! assembled content), honors the turn's summary preference, and bounds each
//! side at the configured character limit with a `truncated` marker.

use hindsight_config::RetrievalConfig;
use hindsight_core::{Error, HydratedTurn, Result, TurnId, TurnRecord, VectorStore};
use std::sync::Arc;
use tracing::debug;

pub struct TurnHydrator {
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl TurnHydrator {
    pub fn new(store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Hydrate one turn, or fail with [`Error::TurnNotFound`].
    pub async fn hydrate(&self, turn_id: TurnId) -> Result<HydratedTurn> {
        let record = self
            .store
            .fetch_turn(turn_id)
            .await?
            .ok_or(Error::TurnNotFound(turn_id))?;
        Ok(self.assemble(record))
    }

    fn assemble(&self, record: TurnRecord) -> HydratedTurn {
        let max = self.config.turn_max_chars;

        // When the stored vector embedded the summary, serve the summary as
        // the assistant side so the model reads what was matched against.
        let assistant_source = if record.used_summary {
            record
                .assistant_summary
                .as_deref()
                .or(record.assistant_text.as_deref())
        } else {
            record.assistant_text.as_deref()
        };

        let (user_content, user_cut) = match record.user_text.as_deref() {
            Some(text) => {
                let (bounded, cut) = truncate_chars(text, max);
                (Some(bounded), cut)
            }
            None => (None, false),
        };
        let (assistant_content, assistant_cut) = match assistant_source {
            Some(text) => {
                let (bounded, cut) = truncate_chars(text, max);
                (Some(bounded), cut)
            }
            None => (None, false),
        };

        let truncated = user_cut || assistant_cut;
        if truncated {
            debug!(turn_id = %record.turn_id, "hydrated turn truncated at length bound");
        }

        HydratedTurn {
            turn_id: record.turn_id,
            provider: record.provider,
            model: record.model,
            conversation_id: record.conversation_id,
            user_message_id: record.user_message_id,
            assistant_message_id: record.assistant_message_id,
            create_time: record.create_time,
            user_content,
            assistant_content,
            used_summary: record.used_summary,
            truncated,
            embedding_created_at: record.embedding_created_at,
        }
    }
}

/// Bound a text at `max_chars` characters, reporting whether it was cut.
fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        (text.to_string(), false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use hindsight_core::{
        ConversationId, MessageId, NeighborHit, StoreError, TurnFilter,
    };

    struct OneTurnStore {
        record: Option<TurnRecord>,
    }

    #[async_trait]
    impl VectorStore for OneTurnStore {
        fn name(&self) -> &str {
            "one-turn"
        }
        async fn nearest(
            &self,
            _embedding: &[f32],
            _provider: &str,
            _model: &str,
            _top_k: usize,
            _filter: &TurnFilter,
        ) -> std::result::Result<Vec<NeighborHit>, StoreError> {
            Ok(vec![])
        }
        async fn fetch_turn(
            &self,
            turn_id: TurnId,
        ) -> std::result::Result<Option<TurnRecord>, StoreError> {
            Ok(self
                .record
                .clone()
                .filter(|r| r.turn_id == turn_id))
        }
    }

    fn record(user: &str, assistant: Option<&str>, used_summary: bool) -> TurnRecord {
        TurnRecord {
            turn_id: TurnId::new(),
            provider: "hindsight".into(),
            model: "test-embed".into(),
            user_message_id: MessageId::new(),
            assistant_message_id: assistant.map(|_| MessageId::new()),
            used_summary,
            embedding_created_at: Utc::now(),
            conversation_id: ConversationId::new(),
            create_time: Some(Utc::now()),
            user_text: Some(user.into()),
            assistant_text: assistant.map(Into::into),
            assistant_summary: None,
        }
    }

    fn hydrator(record: Option<TurnRecord>) -> TurnHydrator {
        TurnHydrator::new(
            Arc::new(OneTurnStore { record }),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn unknown_turn_is_not_found() {
        let h = hydrator(None);
        let err = h.hydrate(TurnId::new()).await.unwrap_err();
        assert!(matches!(err, Error::TurnNotFound(_)));
    }

    #[tokio::test]
    async fn hydrates_both_sides() {
        let r = record("what did I say", Some("you said this"), false);
        let id = r.turn_id;
        let h = hydrator(Some(r));
        let turn = h.hydrate(id).await.unwrap();
        assert_eq!(turn.user_content.as_deref(), Some("what did I say"));
        assert_eq!(turn.assistant_content.as_deref(), Some("you said this"));
        assert!(!turn.truncated);
    }

    #[tokio::test]
    async fn summary_served_when_embedded() {
        let mut r = record("q", Some("long raw answer"), true);
        r.assistant_summary = Some("short summary".into());
        let id = r.turn_id;
        let h = hydrator(Some(r));
        let turn = h.hydrate(id).await.unwrap();
        assert!(turn.used_summary);
        assert_eq!(turn.assistant_content.as_deref(), Some("short summary"));
    }

    #[tokio::test]
    async fn summary_falls_back_to_text_when_missing() {
        let r = record("q", Some("raw answer"), true);
        let id = r.turn_id;
        let h = hydrator(Some(r));
        let turn = h.hydrate(id).await.unwrap();
        assert_eq!(turn.assistant_content.as_deref(), Some("raw answer"));
    }

    #[tokio::test]
    async fn long_sides_are_cut_and_flagged() {
        let long = "y".repeat(5_000);
        let r = record(&long, Some("short"), false);
        let id = r.turn_id;
        let h = hydrator(Some(r));
        let turn = h.hydrate(id).await.unwrap();
        let cfg = RetrievalConfig::default();
        assert!(turn.truncated);
        assert_eq!(
            turn.user_content.unwrap().chars().count(),
            cfg.turn_max_chars
        );
        assert_eq!(turn.assistant_content.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn one_sided_turn_hydrates() {
        let r = record("only a question", None, false);
        let id = r.turn_id;
        let h = hydrator(Some(r));
        let turn = h.hydrate(id).await.unwrap();
        assert!(turn.assistant_content.is_none());
        assert!(turn.assistant_message_id.is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let (cut, flagged) = truncate_chars("日本語のテキスト", 3);
        assert_eq!(cut, "日本語");
        assert!(flagged);
    }
}
