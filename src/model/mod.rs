//! Model adapters.
//!
//! The engine treats both the drafter and the target as black boxes behind
//! [`ModelAdapter`]: feed a token prefix plus the state from the previous
//! call, get back scores for every newly processed position.
//!
//! ```text
//! tokens:  [t0 t1 t2 t3 t4 t5]
//! state:   seen_len = 3  ─────┐
//!                             ▼
//! scores:            rows for positions 3, 4, 5
//!                    (row j scores the token after position 3 + j)
//! ```

pub mod bigram;

pub use bigram::BigramModel;

use candle_core::Tensor;

use crate::core::IncrementalState;
use crate::error::{Error, Result};

/// Result of one forward call.
#[derive(Debug, Clone)]
pub struct Advance<S> {
    /// Raw scores, `[num_new_positions, vocab_size]`.
    pub logits: Tensor,
    /// State covering every token passed in.
    pub state: S,
}

/// Uniform interface over a next-token predictor.
///
/// Implementations must not keep the caller's token slice past the call.
/// Adapters take `&self`, so one instance may act as drafter and target at
/// the same time.
pub trait ModelAdapter {
    /// Incremental state this model hands back between calls.
    type State: IncrementalState;

    /// Size of the vocabulary the scores range over.
    fn vocab_size(&self) -> usize;

    /// Longest sequence the model accepts, if bounded.
    fn max_context_len(&self) -> Option<usize> {
        None
    }

    /// Process `tokens[state.seen_len()..]` on top of `state`.
    ///
    /// With `state = None` the whole of `tokens` is processed.
    fn advance(&self, tokens: &[u32], state: Option<Self::State>) -> Result<Advance<Self::State>>;
}

/// Scores returned by a forward pass, indexed by absolute buffer position.
#[derive(Debug, Clone)]
pub(crate) struct Scores {
    logits: Tensor,
    /// Absolute position of the first row.
    offset: usize,
}

impl Scores {
    /// Scores predicting the token after `position`.
    pub(crate) fn row(&self, position: usize) -> Result<Tensor> {
        Ok(self.logits.get(position - self.offset)?)
    }

    /// `len` consecutive rows starting at `position`.
    pub(crate) fn rows(&self, position: usize, len: usize) -> Result<Tensor> {
        Ok(self.logits.narrow(0, position - self.offset, len)?)
    }
}

/// Run `model` over `tokens`, threading its cached state when `use_cache`
/// is set and recomputing from scratch otherwise.
pub(crate) fn forward<M: ModelAdapter + ?Sized>(
    model: &M,
    tokens: &[u32],
    cache: &mut Option<M::State>,
    use_cache: bool,
) -> Result<Scores> {
    let state = if use_cache { cache.take() } else { None };
    let offset = state.as_ref().map_or(0, IncrementalState::seen_len);

    let Advance { logits, state } = model.advance(tokens, state)?;

    let expected = [tokens.len().saturating_sub(offset), model.vocab_size()];
    if logits.dims() != expected {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            got: logits.dims().to_vec(),
        });
    }

    if use_cache {
        *cache = Some(state);
    }

    Ok(Scores { logits, offset })
}

/// Drop the last `num_tokens` positions from a cached state, if any.
pub(crate) fn prune<S: IncrementalState>(cache: &mut Option<S>, num_tokens: usize) -> Result<()> {
    if let Some(state) = cache.take() {
        *cache = Some(state.prune(num_tokens)?);
    }
    Ok(())
}
