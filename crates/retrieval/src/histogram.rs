//! Epoch-aligned time binning.
//!
//! Buckets are fixed-width UTC intervals anchored at the Unix epoch, not at
//! the query time, so bucket boundaries are stable across repeated queries
//! with different ranges.

use chrono::{DateTime, TimeZone, Utc};
use hindsight_core::{Histogram, HistogramBucket};
use std::collections::BTreeMap;

const SECONDS_PER_DAY: i64 = 86_400;

/// Floor a timestamp to the start of its epoch-aligned bin.
pub fn bin_start(ts: DateTime<Utc>, bin_days: u32) -> DateTime<Utc> {
    let bin_secs = i64::from(bin_days) * SECONDS_PER_DAY;
    let floored = ts.timestamp().div_euclid(bin_secs) * bin_secs;
    // In range for any timestamp chrono itself can represent.
    Utc.timestamp_opt(floored, 0).single().unwrap_or(ts)
}

/// Build a histogram over the given candidate timestamps.
///
/// `total` counts every candidate, including those without a timestamp;
/// only timestamped candidates land in a bucket. Buckets come out sorted
/// by start time.
pub fn build_histogram<I>(timestamps: I, total: usize, bin_days: u32) -> Histogram
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    let bin_secs = i64::from(bin_days) * SECONDS_PER_DAY;
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();

    for ts in timestamps.into_iter().flatten() {
        let start = bin_start(ts, bin_days).timestamp();
        *counts.entry(start).or_insert(0) += 1;
    }

    let buckets = counts
        .into_iter()
        .filter_map(|(start, count)| {
            let start_dt = Utc.timestamp_opt(start, 0).single()?;
            let end_dt = Utc.timestamp_opt(start + bin_secs, 0).single()?;
            Some(HistogramBucket {
                start: start_dt,
                end: end_dt,
                count,
            })
        })
        .collect();

    Histogram {
        bin_days,
        total,
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn day_bin_floors_to_midnight() {
        let t = ts(2024, 3, 15, 17);
        assert_eq!(bin_start(t, 1), ts(2024, 3, 15, 0));
    }

    #[test]
    fn bin_boundaries_are_query_independent() {
        // Same timestamp always lands in the same bucket regardless of what
        // else is being binned — the anchor is the epoch, not the data.
        let t = ts(2024, 3, 15, 23);
        assert_eq!(bin_start(t, 7), bin_start(ts(2024, 3, 15, 1), 7));
    }

    #[test]
    fn pre_epoch_timestamps_floor_downward() {
        let t = ts(1969, 12, 31, 12);
        let start = bin_start(t, 1);
        assert!(start <= t);
        assert_eq!(start, ts(1969, 12, 31, 0));
    }

    #[test]
    fn histogram_counts_and_sorts() {
        let times = vec![
            Some(ts(2024, 3, 2, 9)),
            Some(ts(2024, 3, 1, 10)),
            Some(ts(2024, 3, 1, 22)),
            None,
        ];
        let h = build_histogram(times, 4, 1);
        assert_eq!(h.total, 4);
        assert_eq!(h.buckets.len(), 2);
        assert_eq!(h.buckets[0].start, ts(2024, 3, 1, 0));
        assert_eq!(h.buckets[0].count, 2);
        assert_eq!(h.buckets[1].count, 1);
        // Untimestamped candidates count toward total but not buckets.
        assert_eq!(h.buckets.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn bucket_width_matches_bin_days() {
        let h = build_histogram(vec![Some(ts(2024, 3, 1, 0))], 1, 7);
        let b = &h.buckets[0];
        assert_eq!((b.end - b.start).num_days(), 7);
    }

    #[test]
    fn identical_inputs_identical_buckets() {
        let times: Vec<_> = (1..=5).map(|d| Some(ts(2024, 3, d, 8))).collect();
        let a = build_histogram(times.clone(), 5, 1);
        let b = build_histogram(times, 5, 1);
        assert_eq!(a.buckets, b.buckets);
    }

    #[test]
    fn empty_input_empty_histogram() {
        let h = build_histogram(std::iter::empty(), 0, 1);
        assert_eq!(h.total, 0);
        assert!(h.buckets.is_empty());
    }
}
