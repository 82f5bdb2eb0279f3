//! Speculative decoding.
//!
//! This module implements draft-verify speculative decoding
//! for faster token generation.
//!
//! ## How it works
//!
//! 1. **Draft Phase**: A small, fast drafter generates up to K tokens
//!    speculatively, one forward call each.
//!
//! 2. **Verify Phase**: The target model scores all K+1 positions in a single
//!    forward pass.
//!
//! 3. **Rejection Sampling**: Each draft token is accepted or rejected based on
//!    the probability ratio between target and draft distributions. The first
//!    rejected position is resampled from the residual distribution; if none
//!    is rejected the target contributes one bonus token.
//!
//! ## Example
//!
//! ```text
//! Draft (K=4):     [prompt] -> t1 -> t2 -> t3 -> t4
//! Target verify:   [prompt, t1, t2, t3, t4] -> logits for all 5 positions
//! Rejection:       Accept t1, t2, reject t3, resample -> final: t1, t2, t3'
//! ```
//!
//! ## Configuration
//!
//! - K (`num_speculative_tokens`): 5 by default (typical range: 2-8)
//! - `use_cache`: thread each model's incremental state between passes
//! - `skip_sample_adjustment`: resample from the raw target distribution

pub mod config;
pub mod engine;
pub mod sampler;
pub mod trace;

pub use config::SpeculativeConfig;
pub use engine::{speculative_generate, SpeculativeEngine};
pub use sampler::{residual_distribution, RejectionSampler};
pub use trace::{LogTracer, RecordingTracer, RoundTrace, SpeculativeTracer, TraceEvent};
