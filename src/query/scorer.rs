//! Name match scoring
//!
//! A file scores an exact-name bonus when its base name equals the whole
//! query, plus a per-word weight for every query word found anywhere in its
//! full path.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configurable weights for name matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameWeights {
    /// Bonus when the base name equals the query exactly
    pub exact_name_bonus: u32,
    /// Added once per query word that is a substring of the path
    pub word_match: u32,
}

impl Default for NameWeights {
    fn default() -> Self {
        Self {
            exact_name_bonus: 10,
            word_match: 1,
        }
    }
}

/// Scores paths against one name query
pub struct NameScorer<'q> {
    weights: NameWeights,
    query: &'q str,
    words: Vec<&'q str>,
}

impl<'q> NameScorer<'q> {
    pub fn new(query: &'q str, weights: NameWeights) -> Self {
        Self {
            weights,
            query,
            words: query.split_whitespace().collect(),
        }
    }

    pub fn with_defaults(query: &'q str) -> Self {
        Self::new(query, NameWeights::default())
    }

    /// True if no path can score (blank query)
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn score(&self, path: &Path) -> u32 {
        let mut score = 0;

        let exact = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy() == self.query);
        if exact {
            score += self.weights.exact_name_bonus;
        }

        let full = path.to_string_lossy();
        for word in &self.words {
            if full.contains(word) {
                score += self.weights.word_match;
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_beats_substring() {
        let scorer = NameScorer::with_defaults("report");
        assert_eq!(scorer.score(Path::new("x/report")), 11);
        assert_eq!(scorer.score(Path::new("x/report.txt")), 1);
        assert_eq!(scorer.score(Path::new("x/readme")), 0);
    }

    #[test]
    fn test_each_word_counts_once() {
        let scorer = NameScorer::with_defaults("alpha beta");
        assert_eq!(scorer.score(Path::new("/alpha/alpha_beta.rs")), 2);
        assert_eq!(scorer.score(Path::new("/alpha/gamma.rs")), 1);
    }

    #[test]
    fn test_custom_weights() {
        let weights = NameWeights {
            exact_name_bonus: 100,
            word_match: 5,
        };
        let scorer = NameScorer::new("notes", weights);
        assert_eq!(scorer.score(Path::new("/home/notes")), 105);
    }

    #[test]
    fn test_blank_query() {
        let scorer = NameScorer::with_defaults("   ");
        assert!(scorer.is_empty());
        assert_eq!(scorer.score(Path::new("/a/b")), 0);
    }
}
