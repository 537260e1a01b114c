//! Term normalization applied at both insert and query time.

use std::borrow::Cow;

/// Stopword filtering and stemming for index terms.
///
/// The same normalizer must be used to build and to query an index, or
/// query terms will not line up with stored units.
pub trait TermNormalizer: Send + Sync {
    /// True if the term should never be indexed or searched
    fn is_filtered(&self, _term: &str) -> bool {
        false
    }

    /// Reduce a term to its indexed form
    fn stem<'a>(&self, term: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(term)
    }

    /// Filter then stem; `None` for filtered or empty terms
    fn normalize<'a>(&self, term: &'a str) -> Option<Cow<'a, str>> {
        if term.is_empty() || self.is_filtered(term) {
            return None;
        }
        let stemmed = self.stem(term);
        if stemmed.is_empty() {
            None
        } else {
            Some(stemmed)
        }
    }
}

/// Keeps every term as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl TermNormalizer for IdentityNormalizer {}

/// Lowercases terms so queries are case-insensitive
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseFoldNormalizer;

impl TermNormalizer for CaseFoldNormalizer {
    fn stem<'a>(&self, term: &'a str) -> Cow<'a, str> {
        if term.chars().any(char::is_uppercase) {
            Cow::Owned(term.to_lowercase())
        } else {
            Cow::Borrowed(term)
        }
    }
}

/// Normalizer matching the `fold_case` configuration flag
pub fn normalizer_for(fold_case: bool) -> Box<dyn TermNormalizer> {
    if fold_case {
        Box::new(CaseFoldNormalizer)
    } else {
        Box::new(IdentityNormalizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keeps_term() {
        let n = IdentityNormalizer;
        assert_eq!(n.normalize("Hello").as_deref(), Some("Hello"));
        assert!(n.normalize("").is_none());
    }

    #[test]
    fn test_case_fold() {
        let n = CaseFoldNormalizer;
        assert_eq!(n.normalize("HeLLo").as_deref(), Some("hello"));
        assert!(matches!(n.stem("plain"), Cow::Borrowed(_)));
    }

    struct NoThe;

    impl TermNormalizer for NoThe {
        fn is_filtered(&self, term: &str) -> bool {
            term == "the"
        }
    }

    #[test]
    fn test_custom_stopwords() {
        assert!(NoThe.normalize("the").is_none());
        assert_eq!(NoThe.normalize("cat").as_deref(), Some("cat"));
    }
}
