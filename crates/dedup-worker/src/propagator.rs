//! Popularity propagation over resolved duplicate relations

use authorforge_common::db::models::DuplicateAuthor;
use authorforge_common::db::{DuplicateStore, PopularityGenerator, PopularityStore};
use authorforge_common::errors::Result;
use authorforge_common::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Summary of one propagation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub relations: u64,
    pub recomputed: u64,
    pub zeroed: u64,
    /// Merged sons that had no popularity record to zero
    pub missing_records: u64,
    pub duration_ms: u64,
}

pub struct PopularityPropagator {
    duplicates: Arc<dyn DuplicateStore>,
    popularity: Arc<dyn PopularityStore>,
    generator: Arc<dyn PopularityGenerator>,
}

impl PopularityPropagator {
    pub fn new(
        duplicates: Arc<dyn DuplicateStore>,
        popularity: Arc<dyn PopularityStore>,
        generator: Arc<dyn PopularityGenerator>,
    ) -> Self {
        Self {
            duplicates,
            popularity,
            generator,
        }
    }

    /// Recompute popularity for every relation updated strictly after
    /// `since`. The first collaborator error ends the pass.
    #[instrument(skip_all, fields(since = %since))]
    pub async fn propagate(&self, since: DateTime<Utc>) -> Result<PropagationReport> {
        let start = Instant::now();
        let relations = self.duplicates.find_updated_after(since).await?;
        info!(relations = relations.len(), "Propagating popularity");

        let mut report = PropagationReport::default();
        for relation in &relations {
            self.apply(relation, &mut report).await?;
            report.relations += 1;
        }

        let elapsed = start.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        metrics::record_propagation(
            elapsed.as_secs_f64(),
            report.relations,
            report.recomputed,
            report.zeroed,
        );

        info!(
            recomputed = report.recomputed,
            zeroed = report.zeroed,
            missing_records = report.missing_records,
            "Popularity propagated"
        );

        Ok(report)
    }

    async fn apply(&self, relation: &DuplicateAuthor, report: &mut PropagationReport) -> Result<()> {
        self.generator.generate_popularity(relation.son_id).await?;
        report.recomputed += 1;

        if relation.is_resolved_elsewhere() {
            // Merged son: its popularity now counts toward `actual`
            match self.popularity.find_by_author_id(relation.son_id).await? {
                Some(mut record) => {
                    record.popularity = 0.0;
                    self.popularity.save(record).await?;
                    report.zeroed += 1;
                }
                None => {
                    debug!(son_id = relation.son_id, "No popularity record to zero");
                    report.missing_records += 1;
                }
            }
        } else if !relation.clear {
            self.generator.generate_popularity(relation.father_id).await?;
            report.recomputed += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authorforge_common::db::NewDuplicate;
    use authorforge_common::MemoryStore;
    use chrono::Duration;
    use tokio_test::assert_ok;

    fn propagator(store: &Arc<MemoryStore>) -> PopularityPropagator {
        PopularityPropagator::new(store.clone(), store.clone(), store.clone())
    }

    async fn relation(store: &MemoryStore, son: i64, father: i64) -> DuplicateAuthor {
        assert_ok!(DuplicateStore::save(store, NewDuplicate::new(son, father)).await)
    }

    fn long_ago() -> DateTime<Utc> {
        Utc::now() - Duration::days(1)
    }

    #[tokio::test]
    async fn test_merged_son_is_zeroed_and_recomputed() {
        let store = Arc::new(MemoryStore::new().with_generated_score(7.0));
        let r = relation(&store, 10, 20).await;
        store.set_popularity(10, 3.5).await;
        assert_ok!(store.resolve_relation(r.id, 20, true, Utc::now()).await);

        let report = assert_ok!(propagator(&store).propagate(long_ago()).await);

        assert_eq!(store.generated().await, vec![10]);
        assert_eq!(store.popularity(10).await, Some(0.0));
        assert_eq!(report.zeroed, 1);
        assert_eq!(report.recomputed, 1);
    }

    #[tokio::test]
    async fn test_unresolved_recomputes_both_sides() {
        let store = Arc::new(MemoryStore::new());
        relation(&store, 10, 20).await;
        store.set_popularity(10, 3.5).await;

        let report = assert_ok!(propagator(&store).propagate(long_ago()).await);

        assert_eq!(store.generated().await, vec![10, 20]);
        assert_eq!(store.popularity(10).await, Some(3.5));
        assert_eq!(report.zeroed, 0);
        assert_eq!(report.recomputed, 2);
    }

    #[tokio::test]
    async fn test_confirmed_as_distinct_recomputes_son_only() {
        let store = Arc::new(MemoryStore::new());
        let r = relation(&store, 10, 20).await;
        store.set_popularity(10, 3.5).await;
        assert_ok!(store.resolve_relation(r.id, 10, true, Utc::now()).await);

        let report = assert_ok!(propagator(&store).propagate(long_ago()).await);

        assert_eq!(store.generated().await, vec![10]);
        assert_eq!(store.popularity(10).await, Some(3.5));
        assert_eq!(report.zeroed, 0);
    }

    #[tokio::test]
    async fn test_missing_record_is_counted_not_created() {
        let store = Arc::new(MemoryStore::new());
        let r = relation(&store, 10, 20).await;
        assert_ok!(store.resolve_relation(r.id, 20, true, Utc::now()).await);

        let report = assert_ok!(propagator(&store).propagate(long_ago()).await);

        assert_eq!(report.missing_records, 1);
        assert_eq!(store.popularity(10).await, None);
    }

    #[tokio::test]
    async fn test_relations_at_or_before_cutoff_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let cutoff = Utc::now() + Duration::minutes(10);

        let at = relation(&store, 1, 2).await;
        assert_ok!(store.resolve_relation(at.id, 2, true, cutoff).await);
        let before = relation(&store, 3, 4).await;
        assert_ok!(store.resolve_relation(before.id, 4, true, cutoff - Duration::seconds(1)).await);
        let after = relation(&store, 5, 6).await;
        assert_ok!(store.resolve_relation(after.id, 6, false, cutoff + Duration::seconds(1)).await);

        let report = assert_ok!(propagator(&store).propagate(cutoff).await);

        assert_eq!(report.relations, 1);
        assert_eq!(store.generated().await, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let r = relation(&store, 10, 20).await;
        store.set_popularity(10, 3.5).await;
        assert_ok!(store.resolve_relation(r.id, 20, true, Utc::now()).await);

        let propagator = propagator(&store);
        let first = assert_ok!(propagator.propagate(long_ago()).await);
        let second = assert_ok!(propagator.propagate(long_ago()).await);

        assert_eq!(first.zeroed, second.zeroed);
        assert_eq!(store.popularity(10).await, Some(0.0));
    }
}
