//! Incremental state shared by every model adapter.
//!
//! A model that memoizes work over a token prefix hands the engine an opaque
//! state handle. The engine only ever asks two things of it: how many
//! positions it has seen, and to forget the most recent `k` of them after a
//! rejected draft.

use crate::error::{Error, Result};

/// Per-model cache over a prefix of the token buffer.
pub trait IncrementalState: Sized {
    /// Number of leading buffer positions this state has processed.
    fn seen_len(&self) -> usize;

    /// Drop the most recent `num_tokens` positions.
    ///
    /// `prune(0)` returns the state unchanged. Pruning more positions than
    /// [`seen_len`](Self::seen_len) fails with [`Error::InvalidPrune`].
    fn prune(self, num_tokens: usize) -> Result<Self>;
}

/// Check a prune request against the state's length.
pub(crate) fn check_prune(requested: usize, seen: usize) -> Result<()> {
    if requested > seen {
        return Err(Error::InvalidPrune { requested, seen });
    }
    Ok(())
}

/// State for models whose only memory is the tokens they consumed.
///
/// Table-driven models have nothing to memoize, but keeping the consumed
/// tokens lets them check that every call extends the prefix they saw last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextCache {
    tokens: Vec<u32>,
}

impl ContextCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that has already seen `tokens`.
    pub fn from_tokens(tokens: impl Into<Vec<u32>>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }

    /// Tokens seen so far.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// Record newly processed tokens.
    pub fn extend(&mut self, tokens: &[u32]) {
        self.tokens.extend_from_slice(tokens);
    }

    /// Whether this cache's history is a prefix of `tokens`.
    pub fn is_prefix_of(&self, tokens: &[u32]) -> bool {
        tokens.starts_with(&self.tokens)
    }
}

impl IncrementalState for ContextCache {
    fn seen_len(&self) -> usize {
        self.tokens.len()
    }

    fn prune(mut self, num_tokens: usize) -> Result<Self> {
        check_prune(num_tokens, self.tokens.len())?;
        self.tokens.truncate(self.tokens.len() - num_tokens);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_zero_is_identity() {
        let cache = ContextCache::from_tokens(vec![1, 2, 3]);
        let pruned = cache.clone().prune(0).unwrap();
        assert_eq!(pruned, cache);
    }

    #[test]
    fn test_prune_drops_tail() {
        let cache = ContextCache::from_tokens(vec![1, 2, 3, 4]);
        let pruned = cache.prune(3).unwrap();
        assert_eq!(pruned.tokens(), &[1]);
        assert_eq!(pruned.seen_len(), 1);
    }

    #[test]
    fn test_prune_too_far() {
        let cache = ContextCache::from_tokens(vec![1, 2]);
        let err = cache.prune(3).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPrune {
                requested: 3,
                seen: 2
            }
        ));
    }

    #[test]
    fn test_prefix_check() {
        let mut cache = ContextCache::new();
        cache.extend(&[5, 6]);
        assert!(cache.is_prefix_of(&[5, 6, 7]));
        assert!(!cache.is_prefix_of(&[5, 7, 7]));
        assert!(!cache.is_prefix_of(&[5]));
    }
}
