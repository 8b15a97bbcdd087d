//! Candidate blocking index
//!
//! Restricts duplicate search to authors sharing the first initial and the
//! surname, so the builder never compares all pairs.

use authorforge_common::db::models::Author;
use authorforge_common::db::AuthorStore;
use authorforge_common::errors::Result;
use authorforge_common::names::BlockingKey;
use std::sync::Arc;
use tracing::trace;

/// Candidate lookup delegated to the author store
#[derive(Clone)]
pub struct CandidateIndex {
    store: Arc<dyn AuthorStore>,
}

impl CandidateIndex {
    pub fn new(store: Arc<dyn AuthorStore>) -> Self {
        Self { store }
    }

    /// Same-bucket authors other than `author` itself.
    ///
    /// `None` when the author's name has fewer than two tokens and is
    /// therefore not eligible as a source of duplicate search.
    pub async fn candidates_for(&self, author: &Author) -> Result<Option<Vec<Author>>> {
        let Some(key) = BlockingKey::for_name(&author.lower_case_name) else {
            return Ok(None);
        };

        let candidates = self.store.find_by_blocking_key(&key, author.id).await?;
        trace!(
            author_id = author.id,
            key = %key,
            candidates = candidates.len(),
            "Blocking lookup"
        );

        Ok(Some(candidates))
    }
}
