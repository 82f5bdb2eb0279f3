//! spec-decode: speculative decoding over pluggable next-token models.
//!
//! A cheap drafter proposes several tokens, an expensive target verifies
//! them in one pass, and rejection sampling keeps the output distributed
//! exactly as the target alone would produce it.
//!
//! - Model-agnostic adapters with prunable incremental state
//! - Exact rejection sampling with residual resampling
//! - Stop tokens, acceptance statistics and optional step tracing

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod model;
pub mod speculative;

pub use config::SamplingConfig;
pub use crate::core::{ContextCache, IncrementalState, KvCache, TokenBuffer};
pub use engine::{
    generate_autoregressive, FinishReason, GenerationOutput, Greedy, Sampler, SamplingStrategy,
    SpeculativeStats,
};
pub use error::{Error, Result};
pub use model::{Advance, BigramModel, ModelAdapter};
pub use speculative::{
    speculative_generate, LogTracer, RecordingTracer, SpeculativeConfig, SpeculativeEngine,
    SpeculativeTracer, TraceEvent,
};
