//! Speculative decoding configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Offset between a token sampler's seed and the acceptance seed derived
/// from it.
pub const ACCEPTANCE_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Configuration for one speculative generation call.
///
/// Every call receives its own copy, so independent generations never share
/// settings through global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculativeConfig {
    /// Number of tokens the drafter proposes per round (gamma).
    /// Higher values help when the drafter agrees with the target often,
    /// and waste drafter work when it doesn't.
    pub num_speculative_tokens: usize,

    /// Maximum number of tokens to generate after the prompt.
    pub max_new_tokens: usize,

    /// Token ids that end generation. Any of them stops the call.
    pub eos_token_ids: Vec<u32>,

    /// Filler for buffer positions that hold no committed token.
    pub pad_token_id: u32,

    /// Reuse each model's incremental state between calls to `advance`.
    /// When disabled, every forward pass recomputes the whole prefix.
    pub use_cache: bool,

    /// On rejection, sample from the raw target distribution instead of the
    /// residual `max(0, p - q)`. This gives up exactness for the target's law.
    pub skip_sample_adjustment: bool,

    /// Run the target once over the prompt and take the first token from it
    /// before any drafting.
    pub first_target: bool,

    /// Seed for the acceptance test's uniform draws. `None` seeds from entropy.
    ///
    /// Must differ from the token sampler's seed: with equal seeds the first
    /// uniform draw is the same number that picked the draft token, and the
    /// output no longer follows the target distribution. Use
    /// [`seed_from_sampling`](Self::seed_from_sampling) to derive one.
    pub seed: Option<u64>,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self {
            num_speculative_tokens: 5,
            max_new_tokens: 40,
            eos_token_ids: vec![1],
            pad_token_id: 0,
            use_cache: false,
            skip_sample_adjustment: false,
            first_target: true,
            seed: None,
        }
    }
}

impl SpeculativeConfig {
    /// Create a new config with the given speculation width.
    pub fn new(num_speculative_tokens: usize) -> Self {
        Self {
            num_speculative_tokens,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Set the number of speculative tokens.
    pub fn num_tokens(mut self, k: usize) -> Self {
        self.num_speculative_tokens = k;
        self
    }

    /// Set the generation budget.
    pub fn max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    /// Use a single end-of-sequence id.
    pub fn eos_token_id(mut self, id: u32) -> Self {
        self.eos_token_ids = vec![id];
        self
    }

    /// Use several end-of-sequence ids.
    pub fn eos_token_ids(mut self, ids: impl Into<Vec<u32>>) -> Self {
        self.eos_token_ids = ids.into();
        self
    }

    /// Set the pad id.
    pub fn pad_token_id(mut self, id: u32) -> Self {
        self.pad_token_id = id;
        self
    }

    /// Enable or disable incremental state reuse.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Enable or disable the residual correction on rejection.
    pub fn skip_sample_adjustment(mut self, skip: bool) -> Self {
        self.skip_sample_adjustment = skip;
        self
    }

    /// Enable or disable the target-only first step.
    pub fn first_target(mut self, first_target: bool) -> Self {
        self.first_target = first_target;
        self
    }

    /// Seed the acceptance test.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Derive the acceptance seed from the token sampler's seed so the two
    /// random streams stay independent.
    pub fn seed_from_sampling(mut self, sampling_seed: u64) -> Self {
        self.seed = Some(sampling_seed.wrapping_add(ACCEPTANCE_SEED_OFFSET));
        self
    }

    /// Whether `token` ends generation.
    pub fn is_eos(&self, token: u32) -> bool {
        self.eos_token_ids.contains(&token)
    }

    /// Reject settings the decoding loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_speculative_tokens == 0 {
            return Err(Error::Config(
                "num_speculative_tokens must be at least 1".into(),
            ));
        }
        if self.max_new_tokens == 0 {
            return Err(Error::Config("max_new_tokens must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_width() {
        let config = SpeculativeConfig::new(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = SpeculativeConfig::new(4).max_new_tokens(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_seed_from_sampling_differs() {
        let config = SpeculativeConfig::default().seed_from_sampling(5);
        assert_eq!(config.seed, Some(5u64.wrapping_add(ACCEPTANCE_SEED_OFFSET)));
        assert_ne!(config.seed, Some(5));
        let config = SpeculativeConfig::default().seed_from_sampling(u64::MAX);
        assert!(config.seed.is_some());
    }

    #[test]
    fn test_is_eos() {
        let config = SpeculativeConfig::default().eos_token_ids(vec![2, 7]);
        assert!(config.is_eos(2));
        assert!(config.is_eos(7));
        assert!(!config.is_eos(1));
    }
}
