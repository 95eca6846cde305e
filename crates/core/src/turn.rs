//! Retrieval value objects: peek results, histograms, hydrated turns.
//!
//! A *turn* is one embedded semantic unit anchored on a user message with an
//! optional linked assistant reply. Peek returns ranked candidates plus a
//! time histogram over the full candidate set; hydration expands one turn id
//! into its full bilateral content.

use crate::id::{ConversationId, MessageId, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked peek candidate, carrying preview snippets only.
///
/// Hydrate the `turn_id` to obtain quotable evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnCandidate {
    pub turn_id: TurnId,

    /// Similarity score derived from vector distance: `1 / (1 + distance)`.
    pub score: f32,

    /// Raw vector distance from the store.
    pub distance: f32,

    /// The anchoring user message.
    pub user_message_id: MessageId,

    /// The linked assistant reply, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message_id: Option<MessageId>,

    pub conversation_id: ConversationId,

    /// Timestamp of the anchoring user message (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    /// Bounded preview of the user text.
    pub user_snippet: String,

    /// Bounded preview of the assistant side (summary when recorded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_snippet: Option<String>,
}

/// A fixed-width, epoch-aligned UTC time interval with a match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
}

/// Time histogram over the **entire** candidate set of a peek.
///
/// `total` equals the candidate-set size, which may exceed the number of
/// snippet matches returned alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub bin_days: u32,
    pub total: usize,
    pub buckets: Vec<HistogramBucket>,
}

impl Histogram {
    /// An empty histogram (valid output for a query with zero candidates).
    pub fn empty(bin_days: u32) -> Self {
        Self {
            bin_days,
            total: 0,
            buckets: Vec::new(),
        }
    }
}

/// Result of one semantic peek: histogram over the full top-k candidate set
/// plus snippet previews for the top-n candidates by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeekResult {
    pub histogram: Histogram,
    pub matches: Vec<TurnCandidate>,
}

/// Full content record for one turn, assembled fresh on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedTurn {
    pub turn_id: TurnId,

    /// Embedding provider that produced this turn's vector.
    pub provider: String,

    /// Embedding model that produced this turn's vector.
    pub model: String,

    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message_id: Option<MessageId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_content: Option<String>,

    /// Assistant text, or the stored turn summary when `used_summary` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_content: Option<String>,

    /// Whether the embedded text (and the content above) used the summary.
    pub used_summary: bool,

    /// Whether either side was cut at the configured length bound.
    pub truncated: bool,

    pub embedding_created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_histogram_is_valid() {
        let h = Histogram::empty(1);
        assert_eq!(h.total, 0);
        assert!(h.buckets.is_empty());
    }

    #[test]
    fn bucket_equality() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let a = HistogramBucket {
            start,
            end,
            count: 3,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn peek_result_serialization() {
        let result = PeekResult {
            histogram: Histogram::empty(7),
            matches: vec![],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"total\":0"));
        assert!(json.contains("\"bin_days\":7"));
    }
}
