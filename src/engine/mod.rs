//! Generation engines and shared decoding pieces.
//!
//! This module contains:
//! - Sampling strategies (distribution + draw)
//! - Generation output and statistics
//! - A single-model autoregressive baseline

pub mod autoregressive;
pub mod output;
pub mod sampler;

pub use autoregressive::generate_autoregressive;
pub use output::{FinishReason, GenerationOutput, SpeculativeStats};
pub use sampler::{Greedy, Sampler, SamplingStrategy};
