//! Token sampling strategies.
//!
//! A strategy does two things, always through the same interface:
//!
//! - **process**: raw scores → probability distribution (temperature,
//!   top-k, top-p are applied here)
//! - **sample**: distribution → token id
//!
//! The speculative engine needs both halves separately: the accept/reject
//! test compares the drafter's and target's *distributions*, not just the
//! tokens they would pick.
//!
//! ## Sampling Pipeline
//!
//! ```text
//! Logits [rows, vocab_size]
//!     │
//!     ▼ Temperature scaling
//! Logits / temperature
//!     │
//!     ▼ Softmax
//! Probabilities
//!     │
//!     ▼ Top-k filtering (optional)
//! Keep k most likely tokens
//!     │
//!     ▼ Top-p filtering (optional)
//! Cumulative prob ≤ p
//!     │
//!     ▼ Renormalize
//! Distribution ──▶ sample ──▶ token
//! ```

use candle_core::{DType, Tensor, D};
use rand::distributions::Distribution;
use rand::SeedableRng;

use crate::config::SamplingConfig;
use crate::error::{Error, Result};

/// Turns scores into distributions and distributions into tokens.
///
/// Implementations must be deterministic for a fixed random source.
pub trait SamplingStrategy {
    /// Map raw scores `[..., vocab_size]` to probabilities of the same shape.
    fn process(&self, logits: &Tensor) -> Result<Tensor>;

    /// Draw one token from a `[vocab_size]` distribution.
    fn sample(&mut self, probs: &Tensor) -> Result<u32>;
}

impl<S: SamplingStrategy + ?Sized> SamplingStrategy for Box<S> {
    fn process(&self, logits: &Tensor) -> Result<Tensor> {
        (**self).process(logits)
    }

    fn sample(&mut self, probs: &Tensor) -> Result<u32> {
        (**self).sample(probs)
    }
}

/// Greedy decoding: the most probable token.
///
/// The distribution is still a full softmax, so the accept/reject test sees
/// real probabilities; only the draw is replaced by argmax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Greedy {
    /// Softmax temperature. Changes the distribution, never the argmax.
    temperature: f32,
}

impl Default for Greedy {
    fn default() -> Self {
        Self { temperature: 1.0 }
    }
}

impl Greedy {
    /// Greedy decoding with an unscaled softmax.
    pub fn new() -> Self {
        Self::default()
    }

    /// Greedy decoding with a scaled softmax.
    pub fn with_temperature(temperature: f32) -> Result<Self> {
        if temperature <= 0.0 {
            return Err(Error::Config(format!(
                "greedy softmax temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self { temperature })
    }
}

impl SamplingStrategy for Greedy {
    fn process(&self, logits: &Tensor) -> Result<Tensor> {
        softmax_with_temperature(logits, self.temperature)
    }

    fn sample(&mut self, probs: &Tensor) -> Result<u32> {
        argmax(probs)
    }
}

/// Stochastic sampler with temperature, top-k and top-p.
///
/// A temperature of `0.0` falls back to argmax.
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Temperature for scaling logits.
    temperature: f32,
    /// Top-k value (0 = disabled).
    top_k: usize,
    /// Top-p value (1.0 = disabled).
    top_p: f32,
    /// Random number generator.
    rng: rand::rngs::StdRng,
}

impl Sampler {
    /// Creates a new sampler. Seeds from `config.seed`, or from entropy.
    pub fn new(config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            rng,
        }
    }

    /// Creates a new sampler with a specific seed for reproducibility.
    pub fn with_seed(config: &SamplingConfig, seed: u64) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// Set temperature.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    /// Set top-k.
    pub fn set_top_k(&mut self, top_k: usize) {
        self.top_k = top_k;
    }

    /// Set top-p.
    pub fn set_top_p(&mut self, top_p: f32) {
        self.top_p = top_p;
    }

    fn filters_enabled(&self) -> bool {
        self.top_k > 0 || (self.top_p > 0.0 && self.top_p < 1.0)
    }

    /// Zero out everything outside top-k / top-p in one row, then renormalize.
    fn filter_row(&self, row: &mut [f32]) {
        let vocab_size = row.len();

        // Sort by probability (descending)
        let mut order: Vec<usize> = (0..vocab_size).collect();
        order.sort_by(|&a, &b| {
            row[b]
                .partial_cmp(&row[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep = vocab_size;
        if self.top_k > 0 {
            keep = keep.min(self.top_k);
        }
        if self.top_p > 0.0 && self.top_p < 1.0 {
            let mut cumulative = 0.0f32;
            for (i, &idx) in order.iter().take(keep).enumerate() {
                cumulative += row[idx];
                if cumulative > self.top_p {
                    keep = i + 1; // Include the token that pushed us over
                    break;
                }
            }
        }

        for &idx in &order[keep..] {
            row[idx] = 0.0;
        }
        let sum: f32 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|p| *p /= sum);
        }
    }
}

impl SamplingStrategy for Sampler {
    fn process(&self, logits: &Tensor) -> Result<Tensor> {
        let temperature = if self.temperature > 0.0 {
            self.temperature
        } else {
            1.0
        };
        let probs = softmax_with_temperature(logits, temperature)?;
        if !self.filters_enabled() {
            return Ok(probs);
        }

        let shape = probs.shape().clone();
        let vocab_size = probs.dim(D::Minus1)?;
        let mut flat: Vec<f32> = probs.flatten_all()?.to_vec1()?;
        for row in flat.chunks_mut(vocab_size) {
            self.filter_row(row);
        }

        Ok(Tensor::from_vec(flat, shape, probs.device())?)
    }

    fn sample(&mut self, probs: &Tensor) -> Result<u32> {
        if self.temperature <= 0.0 {
            return argmax(probs);
        }

        let weights: Vec<f32> = probs.to_dtype(DType::F32)?.to_vec1()?;
        let dist = rand::distributions::WeightedIndex::new(&weights)
            .map_err(|e| Error::Sampling(format!("cannot sample from distribution: {e}")))?;

        Ok(dist.sample(&mut self.rng) as u32)
    }
}

/// Build the strategy a [`SamplingConfig`] describes.
pub fn from_config(config: &SamplingConfig) -> Box<dyn SamplingStrategy> {
    if config.is_greedy() {
        Box::new(Greedy::new())
    } else {
        Box::new(Sampler::new(config))
    }
}

/// Softmax over the last axis after dividing by `temperature`.
fn softmax_with_temperature(logits: &Tensor, temperature: f32) -> Result<Tensor> {
    let logits = logits.to_dtype(DType::F32)?;
    let logits = if temperature != 1.0 {
        (logits / temperature as f64)?
    } else {
        logits
    };
    Ok(candle_nn::ops::softmax(&logits, D::Minus1)?)
}

/// Index of the largest entry of a 1D distribution.
fn argmax(probs: &Tensor) -> Result<u32> {
    Ok(probs.argmax(D::Minus1)?.to_scalar::<u32>()?)
}
