//! Token estimation for `calculate_tokens` requests.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Returns the number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

/// Rough estimate of one token per four characters, rounded up.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproximateTokenCounter;

impl TokenCounter for ApproximateTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}
