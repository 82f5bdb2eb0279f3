//! Core data structures for one generation call.
//!
//! This module contains:
//! - TokenBuffer, the fixed-capacity prompt + output buffer
//! - IncrementalState, the prune-only view of a model's cache
//! - KvCache and ContextCache, the concrete cache representations

pub mod buffer;
pub mod kv_cache;
pub mod state;

pub use buffer::{TokenBuffer, DEFAULT_MAX_CONTEXT_LEN};
pub use kv_cache::{KvCache, LayerKvCache};
pub use state::{ContextCache, IncrementalState};
