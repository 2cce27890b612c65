//! Token estimation for prompt budgeting and text splitting.
//!
//! Uses a ~4 characters per token approximation so no model-specific
//! tokenizer is needed for local models.

/// Universal token counter
pub struct TokenCounter;

impl TokenCounter {
    /// Estimated token count for `text`.
    pub fn estimate_tokens(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() + 3) / 4
    }

    /// Tokens left for content once the prompt scaffolding and response
    /// reservation are taken out of the context window.
    pub fn estimate_remaining(
        used_tokens: usize,
        context_window: usize,
        reserved_for_response: usize,
    ) -> usize {
        context_window
            .saturating_sub(used_tokens)
            .saturating_sub(reserved_for_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(TokenCounter::estimate_tokens(""), 0);
        assert_eq!(TokenCounter::estimate_tokens("a"), 1);
        assert_eq!(TokenCounter::estimate_tokens("abcd"), 1);
        assert_eq!(TokenCounter::estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        assert_eq!(TokenCounter::estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(TokenCounter::estimate_remaining(0, 8000, 1000), 7000);
        assert_eq!(TokenCounter::estimate_remaining(2000, 8000, 1000), 5000);
        assert_eq!(TokenCounter::estimate_remaining(7500, 8000, 1000), 0);
    }
}
