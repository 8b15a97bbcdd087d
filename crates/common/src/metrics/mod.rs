//! Metrics and observability utilities
//!
//! Counters and histograms for the graph-building and propagation passes,
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use serde::Serialize;

/// Metrics prefix for all AuthorForge metrics
pub const METRICS_PREFIX: &str = "authorforge";

/// Buckets for pass duration (in seconds); passes scan whole tables
pub const PASS_DURATION_BUCKETS: &[f64] = &[
    0.1,
    0.5,
    1.0,
    5.0,
    15.0,
    60.0,
    300.0,
    900.0,
    3600.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_dedup_authors_scanned_total", METRICS_PREFIX),
        Unit::Count,
        "Authors visited by the duplicate graph builder"
    );

    describe_counter!(
        format!("{}_dedup_authors_ineligible_total", METRICS_PREFIX),
        Unit::Count,
        "Authors skipped for having fewer than two name tokens"
    );

    describe_counter!(
        format!("{}_dedup_candidates_total", METRICS_PREFIX),
        Unit::Count,
        "Same-bucket candidates examined"
    );

    describe_counter!(
        format!("{}_dedup_edges_created_total", METRICS_PREFIX),
        Unit::Count,
        "Duplicate relations written"
    );

    describe_counter!(
        format!("{}_dedup_edges_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Candidate pairs not written, by reason"
    );

    describe_counter!(
        format!("{}_propagation_relations_total", METRICS_PREFIX),
        Unit::Count,
        "Duplicate relations processed by the popularity propagator"
    );

    describe_counter!(
        format!("{}_popularity_recomputed_total", METRICS_PREFIX),
        Unit::Count,
        "Popularity recomputation requests"
    );

    describe_counter!(
        format!("{}_popularity_zeroed_total", METRICS_PREFIX),
        Unit::Count,
        "Popularity records zeroed for merged authors"
    );

    describe_counter!(
        format!("{}_pass_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Passes aborted by an error"
    );

    describe_histogram!(
        format!("{}_pass_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Wall time of a full pass"
    );

    tracing::info!("Metrics registered");
}

/// Counters gathered by one graph-building pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildCounts {
    pub authors_scanned: u64,
    pub authors_ineligible: u64,
    pub candidates: u64,
    pub edges_created: u64,
    pub reciprocal_suppressed: u64,
    pub already_linked: u64,
    pub rejected: u64,
}

/// Helper to record a finished graph-building pass
pub fn record_build(duration_secs: f64, counts: &BuildCounts) {
    counter!(format!("{}_dedup_authors_scanned_total", METRICS_PREFIX))
        .increment(counts.authors_scanned);
    counter!(format!("{}_dedup_authors_ineligible_total", METRICS_PREFIX))
        .increment(counts.authors_ineligible);
    counter!(format!("{}_dedup_candidates_total", METRICS_PREFIX))
        .increment(counts.candidates);
    counter!(format!("{}_dedup_edges_created_total", METRICS_PREFIX))
        .increment(counts.edges_created);

    for (reason, count) in [
        ("reciprocal", counts.reciprocal_suppressed),
        ("already_linked", counts.already_linked),
        ("dissimilar", counts.rejected),
    ] {
        counter!(
            format!("{}_dedup_edges_skipped_total", METRICS_PREFIX),
            "reason" => reason
        )
        .increment(count);
    }

    histogram!(
        format!("{}_pass_duration_seconds", METRICS_PREFIX),
        "pass" => "build"
    )
    .record(duration_secs);
}

/// Helper to record a finished propagation pass
pub fn record_propagation(duration_secs: f64, relations: u64, recomputed: u64, zeroed: u64) {
    counter!(format!("{}_propagation_relations_total", METRICS_PREFIX)).increment(relations);
    counter!(format!("{}_popularity_recomputed_total", METRICS_PREFIX)).increment(recomputed);
    counter!(format!("{}_popularity_zeroed_total", METRICS_PREFIX)).increment(zeroed);

    histogram!(
        format!("{}_pass_duration_seconds", METRICS_PREFIX),
        "pass" => "propagate"
    )
    .record(duration_secs);
}

/// Helper to record an aborted pass
pub fn record_failure(pass: &'static str) {
    counter!(
        format!("{}_pass_failures_total", METRICS_PREFIX),
        "pass" => pass
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in PASS_DURATION_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every call is a no-op
        record_build(0.5, &BuildCounts::default());
        record_propagation(0.1, 3, 4, 1);
        record_failure("build");
    }
}
