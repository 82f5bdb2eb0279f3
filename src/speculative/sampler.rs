//! Rejection sampling for speculative decoding.
//!
//! Given the drafter's distribution `q` and the target's distribution `p` at
//! each drafted position, draft token `x` survives with probability
//! `min(1, p(x) / q(x))`. The first position that fails is the rejection
//! point; a replacement is drawn there from the residual
//!
//! ```text
//! p'(x) = max(0, p(x) - q(x)) / Σ max(0, p(y) - q(y))
//! ```
//!
//! which makes every committed token distributed exactly as if it had been
//! sampled from the target directly.

use candle_core::{DType, Tensor};
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Accept/reject test over one round of drafts.
#[derive(Debug, Clone)]
pub struct RejectionSampler {
    /// Source of the uniform draws.
    rng: rand::rngs::StdRng,
}

impl Default for RejectionSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RejectionSampler {
    /// Create a sampler seeded from entropy.
    pub fn new() -> Self {
        Self {
            rng: rand::rngs::StdRng::from_entropy(),
        }
    }

    /// Create a sampler with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// Number of leading drafts that survive the test.
    ///
    /// One uniform value is drawn per draft up front, so every round consumes
    /// exactly `draft_tokens.len()` draws regardless of where it stops.
    ///
    /// # Arguments
    ///
    /// * `draft_tokens` - Tokens the drafter wrote, `[g]`
    /// * `draft_probs` - Drafter distributions, `[g, vocab_size]`
    /// * `target_probs` - Target distributions at the same positions, `[g, vocab_size]`
    ///
    /// # Returns
    ///
    /// `n` in `0..=g`: the index of the first rejected draft, or `g` when all
    /// of them survive.
    pub fn accepted_prefix_len(
        &mut self,
        draft_tokens: &[u32],
        draft_probs: &Tensor,
        target_probs: &Tensor,
    ) -> Result<usize> {
        let gamma = draft_tokens.len();
        if gamma == 0 {
            return Ok(0);
        }
        if draft_probs.dims() != target_probs.dims() || draft_probs.dim(0)? != gamma {
            return Err(Error::ShapeMismatch {
                expected: vec![gamma, target_probs.dim(candle_core::D::Minus1)?],
                got: draft_probs.dims().to_vec(),
            });
        }

        let q: Vec<Vec<f32>> = draft_probs.to_dtype(DType::F32)?.to_vec2()?;
        let p: Vec<Vec<f32>> = target_probs.to_dtype(DType::F32)?.to_vec2()?;
        let r: Vec<f32> = (0..gamma).map(|_| self.rng.gen::<f32>()).collect();

        for (i, &token) in draft_tokens.iter().enumerate() {
            let token = token as usize;
            if r[i] > acceptance_ratio(p[i][token], q[i][token]) {
                return Ok(i);
            }
        }
        Ok(gamma)
    }
}

/// `p / q`, with the degenerate `q = 0` cases resolved explicitly.
///
/// `p = q = 0` maps to 0, so such a draft is rejected. A plain float
/// division would give NaN there, and `r > NaN` is false, which accepts it
/// instead. The draft can only have `q = 0` when it was not sampled from
/// the drafter's distribution, and a token neither model supports should
/// not be committed.
fn acceptance_ratio(p: f32, q: f32) -> f32 {
    if q > 0.0 {
        p / q
    } else if p > 0.0 {
        f32::INFINITY
    } else {
        0.0
    }
}

/// Residual distribution `normalize(max(0, p - q))`.
///
/// When the target puts no mass above the drafter anywhere (the two
/// distributions coincide) the target distribution itself is returned.
pub fn residual_distribution(target_probs: &Tensor, draft_probs: &Tensor) -> Result<Tensor> {
    let target_probs = target_probs.to_dtype(DType::F32)?;
    let diff = (&target_probs - draft_probs.to_dtype(DType::F32)?)?.relu()?;
    let mass = diff.sum_all()?.to_scalar::<f32>()?;
    if mass <= 0.0 {
        return Ok(target_probs);
    }
    Ok((diff / mass as f64)?)
}
