//! Author name normalization and blocking keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derive the case-normalized form of a display name.
///
/// Lowercases and collapses runs of whitespace to a single space. Computed
/// once when an author record is created and never recomputed.
pub fn normalize(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a normalized name into whitespace-delimited tokens.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Cheap "initial + surname" key restricting duplicate candidates to a bucket.
///
/// Middle tokens are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockingKey {
    initial: String,
    surname: String,
}

impl BlockingKey {
    /// Build the key for a tokenized name, `None` when the name has fewer
    /// than two tokens and therefore no surname to block on.
    pub fn for_tokens(tokens: &[&str]) -> Option<Self> {
        if tokens.len() < 2 {
            return None;
        }

        let first = tokens.first()?;
        let surname = tokens.last()?;
        let initial: String = first.chars().next()?.to_lowercase().collect();

        Some(Self {
            initial,
            surname: surname.to_lowercase(),
        })
    }

    /// Key for a normalized name string
    pub fn for_name(normalized: &str) -> Option<Self> {
        Self::for_tokens(&tokens(normalized))
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    /// SQL `LIKE` pattern `"<initial>% <surname>"`, escaping wildcards with `\`.
    pub fn like_pattern(&self) -> String {
        format!(
            "{}% {}",
            escape_like(&self.initial),
            escape_like(&self.surname)
        )
    }

    /// In-process equivalent of matching [`like_pattern`](Self::like_pattern)
    /// against a normalized name.
    pub fn matches(&self, normalized: &str) -> bool {
        let suffix_len = self.surname.len() + 1;
        normalized.len() >= self.initial.len() + suffix_len
            && normalized.starts_with(&self.initial)
            && normalized.ends_with(&format!(" {}", self.surname))
    }
}

impl fmt::Display for BlockingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.initial, self.surname)
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  John   Robert\tSMITH "), "john robert smith");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_single_token_is_not_eligible() {
        assert!(BlockingKey::for_name("plato").is_none());
        assert!(BlockingKey::for_name("").is_none());
    }

    #[test]
    fn test_key_ignores_middle_tokens() {
        let full = BlockingKey::for_name("john robert smith").unwrap();
        let short = BlockingKey::for_name("j smith").unwrap();
        assert_eq!(full, short);
        assert_eq!(full.to_string(), "j smith");
        assert_eq!(full.like_pattern(), "j% smith");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        let key = BlockingKey::for_name("a_b 100%_real").unwrap();
        assert_eq!(key.initial(), "a");
        assert_eq!(key.like_pattern(), "a% 100\\%\\_real");
    }

    #[test]
    fn test_matches_mirrors_like_pattern() {
        let key = BlockingKey::for_name("john smith").unwrap();
        assert!(key.matches("j smith"));
        assert!(key.matches("jane q smith"));
        assert!(!key.matches("john smithson"));
        assert!(!key.matches("mary smith"));
        assert!(!key.matches("smith"));
    }

    #[test]
    fn test_initial_is_lowercased() {
        let key = BlockingKey::for_tokens(&["Élodie", "Durand"]).unwrap();
        assert_eq!(key.initial(), "é");
        assert_eq!(key.surname(), "durand");
    }
}
