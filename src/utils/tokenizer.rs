use memchr::memchr;
use std::collections::HashMap;

/// Maximum token length to store in the index.
/// Tokens longer than this are likely base64, hex dumps, or other non-searchable content.
const MAX_TOKEN_LENGTH: usize = 128;

/// Shortest token worth indexing
const MIN_TOKEN_LENGTH: usize = 2;

/// Bytes sampled by [`is_binary`]
const BINARY_SAMPLE: usize = 8192;

/// Count token occurrences in text content.
///
/// Words are split on anything that is not alphanumeric or `_`, then on
/// snake_case and camelCase boundaries. A word that was split is also
/// counted whole, so `getUserById` yields `get`, `user`, `by`, `id` and
/// `getuserbyid`. Tokens are lowercased when `fold_case` is set.
pub fn count_tokens(content: &str, fold_case: bool) -> HashMap<String, u32> {
    let mut counts = HashMap::with_capacity(content.len() / 8);
    let mut word = String::new();

    for ch in content.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
        } else if !word.is_empty() {
            count_word(&mut counts, &word, fold_case);
            word.clear();
        }
    }
    if !word.is_empty() {
        count_word(&mut counts, &word, fold_case);
    }

    counts
}

/// Score every token by term frequency: occurrences / total tokens.
///
/// The result is sorted by token so indexing is deterministic.
pub fn term_frequencies(content: &str, fold_case: bool) -> Vec<(String, f32)> {
    let counts = count_tokens(content, fold_case);
    let total: u32 = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut terms: Vec<(String, f32)> = counts
        .into_iter()
        .map(|(token, count)| (token, count as f32 / total as f32))
        .collect();
    terms.sort_by(|a, b| a.0.cmp(&b.0));
    terms
}

fn count_word(counts: &mut HashMap<String, u32>, word: &str, fold_case: bool) {
    let pieces = split_identifier(word);
    if pieces.len() > 1 {
        add_token(counts, &word.replace('_', ""), fold_case);
    }
    for piece in pieces {
        add_token(counts, piece, fold_case);
    }
}

/// Split on underscores and lower-to-upper case transitions
fn split_identifier(word: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = None;
    let mut prev_was_lower = false;

    for (i, ch) in word.char_indices() {
        if ch == '_' {
            if let Some(s) = start.take() {
                pieces.push(&word[s..i]);
            }
            prev_was_lower = false;
            continue;
        }

        if ch.is_uppercase() && prev_was_lower {
            if let Some(s) = start {
                pieces.push(&word[s..i]);
            }
            start = Some(i);
        } else if start.is_none() {
            start = Some(i);
        }
        prev_was_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }

    if let Some(s) = start {
        pieces.push(&word[s..]);
    }
    pieces
}

fn add_token(counts: &mut HashMap<String, u32>, token: &str, fold_case: bool) {
    let len = token.chars().count();
    if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&len) {
        return;
    }
    let token = if fold_case {
        token.to_lowercase()
    } else {
        token.to_string()
    };
    *counts.entry(token).or_insert(0) += 1;
}

/// Check if content is likely binary
pub fn is_binary(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(BINARY_SAMPLE)];

    // Text files essentially never carry NUL bytes
    if memchr(0, sample).is_some() {
        return true;
    }

    let non_text_count = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    non_text_count > sample.len() / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        let counts = count_tokens("getUserById", true);
        assert!(counts.contains_key("get"));
        assert!(counts.contains_key("user"));
        assert!(counts.contains_key("by"));
        assert!(counts.contains_key("id"));
        assert!(counts.contains_key("getuserbyid"));
    }

    #[test]
    fn test_snake_case() {
        let counts = count_tokens("get_user_by_id", true);
        assert!(counts.contains_key("get"));
        assert!(counts.contains_key("user"));
        assert!(counts.contains_key("getuserbyid"));
    }

    #[test]
    fn test_case_preserved_without_folding() {
        let counts = count_tokens("Hello hello", false);
        assert_eq!(counts.get("Hello"), Some(&1));
        assert_eq!(counts.get("hello"), Some(&1));

        let folded = count_tokens("Hello hello", true);
        assert_eq!(folded.get("hello"), Some(&2));
    }

    #[test]
    fn test_short_and_long_tokens_dropped() {
        let long = "x".repeat(MAX_TOKEN_LENGTH + 1);
        let counts = count_tokens(&format!("a {long} ok"), true);
        assert_eq!(counts.len(), 1);
        assert!(counts.contains_key("ok"));
    }

    #[test]
    fn test_term_frequencies() {
        let terms = term_frequencies("hello world hello", true);
        assert_eq!(
            terms,
            vec![("hello".to_string(), 2.0 / 3.0), ("world".to_string(), 1.0 / 3.0)]
        );
        assert!(term_frequencies("! ? .", true).is_empty());
    }

    #[test]
    fn test_is_binary() {
        assert!(!is_binary(b"plain text\nwith lines\n"));
        assert!(is_binary(b"ELF\x00\x01\x02"));
        assert!(!is_binary(b""));
    }
}
