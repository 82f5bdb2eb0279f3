//! Bigram table model.
//!
//! The score row for the next token depends only on the current token:
//! `logits[prev]` is a `[vocab_size]` slice of a `[vocab_size, vocab_size]`
//! table. Cheap enough to draft with, and a convenient stand-in target for
//! demos and tests.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};

use super::{Advance, ModelAdapter};
use crate::core::{ContextCache, IncrementalState};
use crate::error::{Error, Result};

/// Tensor name used when saving or loading a table.
pub const DEFAULT_TENSOR_NAME: &str = "logits";

/// Next-token model backed by a square logit table.
#[derive(Debug, Clone)]
pub struct BigramModel {
    /// Logits: [vocab_size, vocab_size], row = previous token.
    logits: Tensor,
    /// Optional context limit reported to the engine.
    max_context_len: Option<usize>,
}

impl BigramModel {
    /// Wrap an existing `[vocab, vocab]` logit table.
    pub fn new(logits: Tensor) -> Result<Self> {
        match logits.dims() {
            [rows, cols] if rows == cols && *rows > 0 => {}
            dims => {
                return Err(Error::Config(format!(
                    "bigram table must be square and non-empty, got {dims:?}"
                )))
            }
        }

        Ok(Self {
            logits: logits.to_dtype(DType::F32)?,
            max_context_len: None,
        })
    }

    /// Build a table from a token corpus.
    ///
    /// Each row holds `ln(count(prev -> next) + smoothing)`, so unseen
    /// transitions keep a small, non-zero probability.
    pub fn from_corpus(
        corpus: &[u32],
        vocab_size: usize,
        smoothing: f32,
        device: &Device,
    ) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::Config("vocab_size must be at least 1".into()));
        }
        if smoothing <= 0.0 {
            return Err(Error::Config("smoothing must be positive".into()));
        }
        if let Some(&bad) = corpus.iter().find(|&&t| t as usize >= vocab_size) {
            return Err(Error::Config(format!(
                "corpus token {bad} is outside a vocabulary of {vocab_size}"
            )));
        }

        let mut counts = vec![smoothing; vocab_size * vocab_size];
        for pair in corpus.windows(2) {
            counts[pair[0] as usize * vocab_size + pair[1] as usize] += 1.0;
        }
        let logits: Vec<f32> = counts.into_iter().map(f32::ln).collect();

        let table = Tensor::from_vec(logits, (vocab_size, vocab_size), device)?;
        Self::new(table)
    }

    /// Load a table stored under `name` in a safetensors file.
    pub fn from_safetensors<P: AsRef<Path>>(path: P, name: &str, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let mut tensors = candle_core::safetensors::load(path, device)?;
        let logits = tensors.remove(name).ok_or_else(|| {
            Error::Config(format!("tensor '{name}' not found in {}", path.display()))
        })?;
        Self::new(logits)
    }

    /// Save the table under `name` in a safetensors file.
    pub fn save_safetensors<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<()> {
        let tensors = HashMap::from([(name.to_string(), self.logits.clone())]);
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Report a context limit to the engine.
    pub fn with_max_context_len(mut self, max_context_len: usize) -> Self {
        self.max_context_len = Some(max_context_len);
        self
    }

    /// The logit table.
    pub fn logits(&self) -> &Tensor {
        &self.logits
    }

    /// Device the table lives on.
    pub fn device(&self) -> &Device {
        self.logits.device()
    }
}

impl ModelAdapter for BigramModel {
    type State = ContextCache;

    fn vocab_size(&self) -> usize {
        self.logits.dim(0).unwrap_or(0)
    }

    fn max_context_len(&self) -> Option<usize> {
        self.max_context_len
    }

    fn advance(&self, tokens: &[u32], state: Option<ContextCache>) -> Result<Advance<ContextCache>> {
        let mut state = state.unwrap_or_default();

        if !state.is_prefix_of(tokens) {
            return Err(Error::adapter(format!(
                "cached context of {} tokens is not a prefix of the {} tokens passed in",
                state.seen_len(),
                tokens.len()
            )));
        }

        let new_tokens = &tokens[state.seen_len()..];
        if new_tokens.is_empty() {
            return Err(Error::adapter("advance called with no new tokens"));
        }

        let vocab_size = self.vocab_size();
        if let Some(&bad) = new_tokens.iter().find(|&&t| t as usize >= vocab_size) {
            return Err(Error::adapter(format!(
                "token {bad} is outside a vocabulary of {vocab_size}"
            )));
        }

        let ids = Tensor::new(new_tokens, self.device())?;
        let logits = self.logits.index_select(&ids, 0)?;

        state.extend(new_tokens);
        Ok(Advance { logits, state })
    }
}
