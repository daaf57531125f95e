//! Paragraph-aware truncation (§4.6).

use crate::token::TokenCounter;

/// Tokens reserved for the trailing ellipsis marker when truncation drops
/// paragraphs.
const ELLIPSIS_RESERVE_TOKENS: u32 = 10;

/// Greedily includes whole paragraphs (split on blank lines) from the head
/// of `text` until the next one would exceed `max_tokens`, leaving room for
/// an ellipsis, then appends `"..."` if anything was dropped.
#[must_use]
pub fn truncate_to_token_limit(text: &str, max_tokens: u32, counter: &dyn TokenCounter) -> String {
    if text.is_empty() {
        return String::new();
    }
    if counter.count(text) <= max_tokens {
        return text.to_string();
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let budget = max_tokens.saturating_sub(ELLIPSIS_RESERVE_TOKENS);

    let mut included = Vec::with_capacity(paragraphs.len());
    let mut total = 0u32;
    for paragraph in &paragraphs {
        let tokens = counter.count(paragraph);
        if total + tokens > budget {
            break;
        }
        included.push(*paragraph);
        total += tokens;
    }

    let mut result = included.join("\n\n");
    if included.len() < paragraphs.len() {
        if !result.is_empty() {
            result.push_str("\n\n");
        }
        result.push_str("...");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::WordCountEstimator;

    #[test]
    fn text_within_budget_is_returned_unchanged() {
        let text = "short paragraph";
        assert_eq!(truncate_to_token_limit(text, 100, &WordCountEstimator), text);
    }

    #[test]
    fn drops_trailing_paragraphs_that_overflow_the_budget() {
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here";
        let truncated = truncate_to_token_limit(text, 8, &WordCountEstimator);
        assert!(truncated.starts_with("first paragraph here"));
        assert!(truncated.ends_with("..."));
        assert!(!truncated.contains("third paragraph"));
    }

    #[test]
    fn empty_text_truncates_to_empty() {
        assert_eq!(truncate_to_token_limit("", 10, &WordCountEstimator), "");
    }

    #[test]
    fn a_single_paragraph_too_large_to_fit_yields_just_the_ellipsis() {
        let text = "one single paragraph with several words in it";
        let truncated = truncate_to_token_limit(text, 5, &WordCountEstimator);
        assert_eq!(truncated, "...");
    }
}
