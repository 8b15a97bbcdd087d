//! Duplicate graph builder
//!
//! Waits for the bulk import, then walks every author once and records a
//! directed son -> father edge for each same-bucket candidate whose middle
//! names agree.

use crate::blocking::CandidateIndex;
use crate::signal::{wait_for_completion, CompletionSignal, Shutdown, WaitOutcome};
use crate::similarity::SimilarityMatcher;
use authorforge_common::db::models::AuthorId;
use authorforge_common::db::{AuthorStore, DuplicateStore, NewDuplicate};
use authorforge_common::errors::Result;
use authorforge_common::metrics::{self, BuildCounts};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Summary of a completed pass
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    #[serde(flatten)]
    pub counts: BuildCounts,
    pub duration_ms: u64,
}

/// How a build ended when no error occurred
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// Shutdown arrived while waiting for the import
    Aborted,
}

pub struct DuplicateGraphBuilder {
    index: CandidateIndex,
    authors: Arc<dyn AuthorStore>,
    duplicates: Arc<dyn DuplicateStore>,
    matcher: SimilarityMatcher,
    poll_interval: Duration,
}

impl DuplicateGraphBuilder {
    pub fn new(
        authors: Arc<dyn AuthorStore>,
        duplicates: Arc<dyn DuplicateStore>,
        matcher: SimilarityMatcher,
        poll_interval: Duration,
    ) -> Self {
        Self {
            index: CandidateIndex::new(authors.clone()),
            authors,
            duplicates,
            matcher,
            poll_interval,
        }
    }

    /// Wait for `signal`, then run one full pass.
    ///
    /// A storage error ends the pass early; edges written before it stay.
    pub async fn build(
        &self,
        signal: &dyn CompletionSignal,
        shutdown: &mut Shutdown,
    ) -> Result<BuildOutcome> {
        if wait_for_completion(signal, self.poll_interval, shutdown).await?
            == WaitOutcome::Cancelled
        {
            return Ok(BuildOutcome::Aborted);
        }

        let start = Instant::now();
        let mut counts = BuildCounts::default();

        self.scan(&mut counts).await?;

        let elapsed = start.elapsed();
        metrics::record_build(elapsed.as_secs_f64(), &counts);

        Ok(BuildOutcome::Completed(BuildReport {
            counts,
            duration_ms: elapsed.as_millis() as u64,
        }))
    }

    #[instrument(skip_all, fields(mode = ?self.matcher.mode()))]
    async fn scan(&self, counts: &mut BuildCounts) -> Result<()> {
        let authors = self.authors.get_all().await?;
        info!(authors = authors.len(), "Building duplicate graph");

        // son -> fathers linked during this pass
        let mut linked: HashMap<AuthorId, Vec<AuthorId>> = HashMap::new();

        for author in &authors {
            counts.authors_scanned += 1;

            let Some(candidates) = self.index.candidates_for(author).await? else {
                counts.authors_ineligible += 1;
                continue;
            };

            let author_tokens = author.name_tokens();

            for suspect in &candidates {
                counts.candidates += 1;

                if linked
                    .get(&suspect.id)
                    .is_some_and(|fathers| fathers.contains(&author.id))
                {
                    counts.reciprocal_suppressed += 1;
                    continue;
                }

                if !self.matcher.is_similar(&author_tokens, &suspect.name_tokens()) {
                    counts.rejected += 1;
                    continue;
                }

                if self
                    .duplicates
                    .find_between(author.id, suspect.id)
                    .await?
                    .is_some()
                {
                    counts.already_linked += 1;
                    continue;
                }

                let saved = self
                    .duplicates
                    .save(NewDuplicate::new(author.id, suspect.id))
                    .await?;
                linked.entry(author.id).or_default().push(suspect.id);
                counts.edges_created += 1;

                debug!(
                    relation_id = saved.id,
                    son = %author.lower_case_name,
                    father = %suspect.lower_case_name,
                    "Duplicate edge created"
                );
            }
        }

        info!(
            edges_created = counts.edges_created,
            reciprocal_suppressed = counts.reciprocal_suppressed,
            already_linked = counts.already_linked,
            "Duplicate graph built"
        );

        Ok(())
    }
}
