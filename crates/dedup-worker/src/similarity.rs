//! Middle-name similarity between two same-bucket authors
//!
//! Blocking already guarantees a shared first initial and surname, so only
//! the tokens strictly between the first and last are compared. Tokens may
//! be full names or initials ("r", "r.", "robert").

use authorforge_common::config::SimilarityMode;

/// Decides whether two tokenized names denote the same person
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityMatcher {
    mode: SimilarityMode,
}

impl SimilarityMatcher {
    pub fn new(mode: SimilarityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SimilarityMode {
        self.mode
    }

    /// Compare the middle tokens of `author` and `candidate`.
    ///
    /// The shorter sequence drives the comparison; on equal length the
    /// candidate does. Every middle token of the shorter sequence has to
    /// be a prefix of a middle token of the longer one.
    pub fn is_similar(&self, author: &[&str], candidate: &[&str]) -> bool {
        let (less, more) = if author.len() < candidate.len() {
            (author, candidate)
        } else {
            (candidate, author)
        };

        let less = middle(less);
        let more = middle(more);

        match self.mode {
            SimilarityMode::Positional => less
                .iter()
                .zip(more)
                .all(|(l, m)| abbreviates(l, m)),
            SimilarityMode::ForwardScan => {
                let mut cursor = 0;
                for token in less {
                    match more[cursor..].iter().position(|m| abbreviates(token, m)) {
                        Some(offset) => cursor += offset + 1,
                        None => return false,
                    }
                }
                true
            }
        }
    }
}

/// Tokens strictly between the first and the last
fn middle<'a, 'b>(tokens: &'a [&'b str]) -> &'a [&'b str] {
    if tokens.len() <= 2 {
        &[]
    } else {
        &tokens[1..tokens.len() - 1]
    }
}

/// `more` starts with `less`, ignoring trailing periods on `less`
fn abbreviates(less: &str, more: &str) -> bool {
    more.starts_with(less.trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use authorforge_common::names::tokens;

    fn similar(mode: SimilarityMode, a: &str, b: &str) -> bool {
        SimilarityMatcher::new(mode).is_similar(&tokens(a), &tokens(b))
    }

    fn both_modes(a: &str, b: &str) -> (bool, bool) {
        (
            similar(SimilarityMode::Positional, a, b),
            similar(SimilarityMode::ForwardScan, a, b),
        )
    }

    #[test]
    fn test_no_middle_tokens_is_trivially_similar() {
        assert_eq!(both_modes("john smith", "j smith"), (true, true));
        assert_eq!(both_modes("john robert smith", "j smith"), (true, true));
    }

    #[test]
    fn test_initial_matches_full_middle_name() {
        assert_eq!(both_modes("john robert smith", "j r smith"), (true, true));
        assert_eq!(both_modes("j. robert oppenheimer", "john r. oppenheimer"), (true, true));
    }

    #[test]
    fn test_equal_length_candidate_drives_comparison() {
        // "r" is the candidate's token, so it must prefix "robert", not the reverse
        assert_eq!(both_modes("j r smith", "john robert smith"), (false, false));
    }

    #[test]
    fn test_full_name_does_not_match_its_initial() {
        assert_eq!(both_modes("j robert smith", "john r paul smith"), (false, false));
        assert_eq!(both_modes("j r smith", "john robert paul smith"), (true, true));
    }

    #[test]
    fn test_conflicting_middle_name() {
        assert_eq!(both_modes("john robert smith", "j edward smith"), (false, false));
    }

    #[test]
    fn test_forward_scan_recovers_from_positional_miss() {
        // "r" sits one position later in the longer name
        assert_eq!(
            both_modes("j r smith", "john paul robert smith"),
            (false, true)
        );
    }

    #[test]
    fn test_forward_scan_keeps_order() {
        assert!(similar(
            SimilarityMode::ForwardScan,
            "j p r smith",
            "john paul quincy robert smith"
        ));
        assert!(!similar(
            SimilarityMode::ForwardScan,
            "j r p smith",
            "john paul quincy robert smith"
        ));
    }

    #[test]
    fn test_lone_period_matches_anything() {
        assert_eq!(both_modes("john robert smith", "j . smith"), (true, true));
    }

    #[test]
    fn test_default_mode_is_forward_scan() {
        assert_eq!(SimilarityMatcher::default().mode(), SimilarityMode::ForwardScan);
    }
}
