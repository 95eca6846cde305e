//! Semantic peek — the cheap probe over the archive.
//!
//! A peek embeds the query, pulls the top-k nearest turns for the configured
//! provider/model pair, builds a time histogram over the *entire* candidate
//! set, and returns snippet previews for only the top-n candidates. It never
//! mutates anything and is deterministic for a fixed query against unchanged
//! data.

use crate::histogram::build_histogram;
use chrono::{DateTime, Utc};
use hindsight_config::RetrievalConfig;
use hindsight_core::{
    ConversationId, EmbeddingGateway, Error, Histogram, NeighborHit, PeekResult, Result, StoreError,
    TurnCandidate, TurnFilter, VectorStore,
};
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Caller-supplied peek parameters. Unset knobs fall back to configured
/// defaults; out-of-range knobs are clamped, not rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeekParams {
    pub query: String,

    /// Candidate-set size (histogram population).
    #[serde(default)]
    pub top_k: Option<usize>,

    /// How many candidates to return as snippet previews.
    #[serde(default)]
    pub top_n_snippets: Option<usize>,

    /// Histogram bucket width in days.
    #[serde(default)]
    pub bin_days: Option<u32>,

    /// Inclusive lower bound on turn time.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Inclusive upper bound on turn time.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    /// Restrict the search to one archived conversation.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl PeekParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// The peek engine: embedding gateway + vector store + retrieval knobs.
pub struct PeekEngine {
    embeddings: Arc<dyn EmbeddingGateway>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl PeekEngine {
    pub fn new(
        embeddings: Arc<dyn EmbeddingGateway>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            config,
        }
    }

    /// Run one peek. Fails on an empty query or an inverted time range;
    /// every other out-of-range knob is clamped.
    pub async fn peek(&self, params: &PeekParams) -> Result<PeekResult> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }
        if let (Some(start), Some(end)) = (params.start_time, params.end_time) {
            if start > end {
                return Err(Error::InvalidArgument(
                    "start_time must not be after end_time".into(),
                ));
            }
        }

        let top_k = params
            .top_k
            .unwrap_or(self.config.default_top_k)
            .clamp(1, self.config.max_top_k);
        let top_n = params
            .top_n_snippets
            .unwrap_or(self.config.default_top_n_snippets)
            .clamp(1, self.config.max_top_n_snippets)
            .min(top_k);
        let bin_days = params
            .bin_days
            .unwrap_or(self.config.default_bin_days)
            .clamp(1, self.config.max_bin_days);

        let embedding = self.embeddings.embed(query).await?;
        let expected = self.embeddings.dimension();
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: embedding.len(),
            }
            .into());
        }

        let filter = TurnFilter {
            start_time: params.start_time,
            end_time: params.end_time,
            conversation_id: params.conversation_id,
        };
        let mut hits = self
            .store
            .nearest(
                &embedding,
                self.embeddings.provider(),
                self.embeddings.model(),
                top_k,
                &filter,
            )
            .await?;

        if hits.is_empty() {
            return Ok(PeekResult {
                histogram: Histogram::empty(bin_days),
                matches: Vec::new(),
            });
        }

        // Rank the full candidate set: score descending, then more recent
        // first (untimestamped last), then turn id for a total order.
        hits.sort_by(|a, b| {
            score(a.distance)
                .partial_cmp(&score(b.distance))
                .unwrap_or(Ordering::Equal)
                .reverse()
                .then_with(|| match (a.create_time, b.create_time) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.turn_id.cmp(&b.turn_id))
        });

        let histogram = build_histogram(hits.iter().map(|h| h.create_time), hits.len(), bin_days);

        let matches = hits
            .iter()
            .take(top_n)
            .map(|h| self.candidate(h))
            .collect::<Vec<_>>();

        debug!(
            candidates = hits.len(),
            snippets = matches.len(),
            top_k,
            bin_days,
            "peek complete"
        );

        Ok(PeekResult { histogram, matches })
    }

    fn candidate(&self, hit: &NeighborHit) -> TurnCandidate {
        let max = self.config.snippet_max_chars;
        let assistant_source = if hit.used_summary {
            hit.assistant_summary.as_deref().or(hit.assistant_text.as_deref())
        } else {
            hit.assistant_text.as_deref()
        };
        TurnCandidate {
            turn_id: hit.turn_id,
            score: score(hit.distance),
            distance: hit.distance,
            user_message_id: hit.user_message_id,
            assistant_message_id: hit.assistant_message_id,
            conversation_id: hit.conversation_id,
            create_time: hit.create_time,
            user_snippet: snippet(hit.user_text.as_deref().unwrap_or_default(), max),
            assistant_snippet: assistant_source.map(|t| snippet(t, max)),
        }
    }
}

/// Similarity score derived from raw distance. Monotone decreasing in
/// distance and bounded to (0, 1] for non-negative distances.
pub fn score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use hindsight_core::{GatewayError, MessageId, TurnId, TurnRecord};

    const DIM: usize = 4;

    struct FixedEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingGateway for FixedEmbedder {
        fn provider(&self) -> &str {
            "hindsight"
        }
        fn model(&self) -> &str {
            "test-embed"
        }
        fn dimension(&self) -> usize {
            DIM
        }
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, GatewayError> {
            Ok(self.vector.clone())
        }
    }

    struct FixedStore {
        hits: Vec<NeighborHit>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn nearest(
            &self,
            _embedding: &[f32],
            _provider: &str,
            _model: &str,
            top_k: usize,
            _filter: &TurnFilter,
        ) -> std::result::Result<Vec<NeighborHit>, StoreError> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }
        async fn fetch_turn(
            &self,
            _turn_id: TurnId,
        ) -> std::result::Result<Option<TurnRecord>, StoreError> {
            Ok(None)
        }
    }

    fn hit(distance: f32, day: u32, user_text: &str) -> NeighborHit {
        NeighborHit {
            turn_id: TurnId::new(),
            user_message_id: MessageId::new(),
            assistant_message_id: None,
            used_summary: false,
            conversation_id: ConversationId::new(),
            create_time: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
            user_text: Some(user_text.into()),
            assistant_text: Some("a reply".into()),
            assistant_summary: None,
            distance,
        }
    }

    fn engine(hits: Vec<NeighborHit>) -> PeekEngine {
        PeekEngine::new(
            Arc::new(FixedEmbedder {
                vector: vec![0.0; DIM],
            }),
            Arc::new(FixedStore { hits }),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let e = engine(vec![]);
        let err = e.peek(&PeekParams::new("   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn inverted_time_range_rejected() {
        let e = engine(vec![]);
        let mut p = PeekParams::new("query");
        p.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        p.end_time = Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        let err = e.peek(&p).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn zero_candidates_is_empty_not_error() {
        let e = engine(vec![]);
        let result = e.peek(&PeekParams::new("anything")).await.unwrap();
        assert_eq!(result.histogram.total, 0);
        assert!(result.matches.is_empty());
    }

    #[tokio::test]
    async fn histogram_covers_full_set_snippets_only_top_n() {
        let hits: Vec<_> = (1..=15).map(|d| hit(d as f32 * 0.1, d, "text")).collect();
        let e = engine(hits);
        let mut p = PeekParams::new("query");
        p.top_n_snippets = Some(5);
        let result = e.peek(&p).await.unwrap();
        assert_eq!(result.histogram.total, 15);
        assert_eq!(result.matches.len(), 5);
    }

    #[tokio::test]
    async fn small_archive_counts_every_candidate() {
        let e = engine(vec![hit(0.3, 3, "schema v1"), hit(0.6, 12, "schema v2")]);
        let mut p = PeekParams::new("schema");
        p.top_k = Some(5);
        let result = e.peek(&p).await.unwrap();
        assert_eq!(result.histogram.total, 2);
        assert_eq!(
            result.histogram.buckets.iter().map(|b| b.count).sum::<usize>(),
            2
        );
        assert_eq!(result.matches.len(), 2);
    }

    #[tokio::test]
    async fn scores_decrease_with_distance() {
        let e = engine(vec![hit(0.5, 1, "far"), hit(0.1, 2, "near")]);
        let result = e.peek(&PeekParams::new("query")).await.unwrap();
        assert_eq!(result.matches[0].user_snippet, "near");
        assert!(result.matches[0].score > result.matches[1].score);
        assert!((result.matches[0].score - 1.0 / 1.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn equal_scores_break_toward_recency() {
        let older = hit(0.2, 1, "older");
        let newer = hit(0.2, 20, "newer");
        let e = engine(vec![older, newer]);
        let result = e.peek(&PeekParams::new("query")).await.unwrap();
        assert_eq!(result.matches[0].user_snippet, "newer");
    }

    #[tokio::test]
    async fn snippets_are_bounded() {
        let long = "x".repeat(2_000);
        let e = engine(vec![hit(0.1, 1, &long)]);
        let result = e.peek(&PeekParams::new("query")).await.unwrap();
        let cfg = RetrievalConfig::default();
        assert_eq!(
            result.matches[0].user_snippet.chars().count(),
            cfg.snippet_max_chars
        );
    }

    #[tokio::test]
    async fn summary_preferred_for_assistant_snippet() {
        let mut h = hit(0.1, 1, "q");
        h.used_summary = true;
        h.assistant_summary = Some("the summary".into());
        h.assistant_text = Some("the raw text".into());
        let e = engine(vec![h]);
        let result = e.peek(&PeekParams::new("query")).await.unwrap();
        assert_eq!(result.matches[0].assistant_snippet.as_deref(), Some("the summary"));
    }

    #[tokio::test]
    async fn top_k_is_clamped() {
        let hits: Vec<_> = (1..=5).map(|d| hit(d as f32 * 0.1, d, "t")).collect();
        let e = engine(hits);
        let mut p = PeekParams::new("query");
        p.top_k = Some(1_000_000);
        // Clamp happens before the store call; the store honors what it gets.
        let result = e.peek(&p).await.unwrap();
        assert_eq!(result.histogram.total, 5);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_surfaced() {
        let e = PeekEngine::new(
            Arc::new(FixedEmbedder {
                vector: vec![0.0; DIM + 1],
            }),
            Arc::new(FixedStore { hits: vec![] }),
            RetrievalConfig::default(),
        );
        let err = e.peek(&PeekParams::new("query")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::DimensionMismatch { .. })
        ));
    }
}
