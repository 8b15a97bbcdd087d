//! Background task wrappers for the two passes
//!
//! Each pass runs on its own tokio task. The handle resolves to the report,
//! or `None` when the pass was aborted or failed; callers may also drop it.

use crate::builder::{BuildOutcome, BuildReport, DuplicateGraphBuilder};
use crate::propagator::{PopularityPropagator, PropagationReport};
use crate::signal::{CompletionSignal, Shutdown};
use authorforge_common::metrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn a duplicate graph build that starts once `signal` completes
pub fn spawn_build<S>(
    builder: Arc<DuplicateGraphBuilder>,
    signal: S,
    mut shutdown: Shutdown,
) -> JoinHandle<Option<BuildReport>>
where
    S: CompletionSignal + 'static,
{
    tokio::spawn(async move {
        match builder.build(&signal, &mut shutdown).await {
            Ok(BuildOutcome::Completed(report)) => {
                info!(
                    edges_created = report.counts.edges_created,
                    duration_ms = report.duration_ms,
                    "Duplicate graph build finished"
                );
                Some(report)
            }
            Ok(BuildOutcome::Aborted) => {
                info!("Duplicate graph build aborted before start");
                None
            }
            Err(e) => {
                error!(
                    error = %e,
                    code = ?e.code(),
                    transient = e.is_transient(),
                    "Duplicate graph build failed"
                );
                metrics::record_failure("build");
                None
            }
        }
    })
}

/// Spawn a popularity propagation over relations updated after `since`
pub fn spawn_propagation(
    propagator: Arc<PopularityPropagator>,
    since: DateTime<Utc>,
) -> JoinHandle<Option<PropagationReport>> {
    tokio::spawn(async move {
        match propagator.propagate(since).await {
            Ok(report) => {
                info!(
                    relations = report.relations,
                    zeroed = report.zeroed,
                    duration_ms = report.duration_ms,
                    "Popularity propagation finished"
                );
                Some(report)
            }
            Err(e) => {
                error!(
                    error = %e,
                    code = ?e.code(),
                    transient = e.is_transient(),
                    "Popularity propagation failed"
                );
                metrics::record_failure("propagate");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{shutdown_channel, ImportCompletion};
    use crate::similarity::SimilarityMatcher;
    use authorforge_common::MemoryStore;
    use std::time::Duration;

    fn builder(store: &Arc<MemoryStore>) -> Arc<DuplicateGraphBuilder> {
        Arc::new(DuplicateGraphBuilder::new(
            store.clone(),
            store.clone(),
            SimilarityMatcher::default(),
            Duration::from_millis(10),
        ))
    }

    #[tokio::test]
    async fn test_build_task_waits_for_import_task() {
        let store = Arc::new(MemoryStore::new());
        let importer = store.clone();
        let import = tokio::spawn(async move {
            importer.insert_author("John Smith").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            importer.insert_author("J Smith").await;
        });
        let (_trigger, shutdown) = shutdown_channel();

        let report = spawn_build(builder(&store), import, shutdown)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.counts.authors_scanned, 2);
        assert_eq!(store.relations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_build_task_failure_yields_none() {
        let store = Arc::new(MemoryStore::new());
        store.insert_author("John Smith").await;
        store.insert_author("J Smith").await;
        store.fail_relation_writes_after(0).await;

        let (completion, rx) = ImportCompletion::channel();
        completion.complete();
        let (_trigger, shutdown) = shutdown_channel();

        let result = spawn_build(builder(&store), rx, shutdown).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_dropped_build_handle_still_runs() {
        let store = Arc::new(MemoryStore::new());
        store.insert_author("John Smith").await;
        store.insert_author("J Smith").await;

        let (completion, rx) = ImportCompletion::channel();
        let (_trigger, shutdown) = shutdown_channel();
        drop(spawn_build(builder(&store), rx, shutdown));
        completion.complete();

        for _ in 0..100 {
            if !store.relations().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.relations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_propagation_task_reports() {
        let store = Arc::new(MemoryStore::new());
        store.insert_author("John Smith").await;
        store.insert_author("J Smith").await;
        let (completion, rx) = ImportCompletion::channel();
        completion.complete();
        let (_trigger, shutdown) = shutdown_channel();
        spawn_build(builder(&store), rx, shutdown).await.unwrap();

        let propagator = Arc::new(PopularityPropagator::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let since = Utc::now() - chrono::Duration::hours(1);
        let report = spawn_propagation(propagator, since).await.unwrap().unwrap();

        assert_eq!(report.relations, 1);
        assert_eq!(report.recomputed, 2);
    }
}
