//! Plain autoregressive decoding with a single model.
//!
//! One forward call per token. Serves as the reference the speculative
//! engine is measured against: with the same strategy and a greedy draw,
//! both produce identical tokens.

use tracing::debug;

use super::output::{FinishReason, GenerationOutput, SpeculativeStats};
use super::sampler::SamplingStrategy;
use crate::core::{TokenBuffer, DEFAULT_MAX_CONTEXT_LEN};
use crate::error::{Error, Result};
use crate::model::{self, ModelAdapter};
use crate::speculative::SpeculativeConfig;

/// Generate a continuation of `prompt` with `model` alone.
///
/// Buffer sizing, end tokens, pad id and cache reuse follow `config`; the
/// speculation width is ignored.
pub fn generate_autoregressive<M, S>(
    model: &M,
    prompt: &[u32],
    config: &SpeculativeConfig,
    strategy: &mut S,
) -> Result<GenerationOutput>
where
    M: ModelAdapter + ?Sized,
    S: SamplingStrategy + ?Sized,
{
    if config.max_new_tokens == 0 {
        return Err(Error::Config("max_new_tokens must be at least 1".into()));
    }

    let max_context_len = model.max_context_len().unwrap_or(DEFAULT_MAX_CONTEXT_LEN);
    let mut buffer = TokenBuffer::for_generation(
        prompt,
        max_context_len,
        config.max_new_tokens,
        config.pad_token_id,
    )?;
    let mut cache: Option<M::State> = None;
    let mut stats = SpeculativeStats::default();

    while !buffer.is_full() {
        let scores = model::forward(model, buffer.committed(), &mut cache, config.use_cache)?;
        stats.target_passes += 1;

        let probs = strategy.process(&scores.row(buffer.position() - 1)?)?;
        let token = strategy.sample(&probs)?;
        buffer.push(token);

        if config.is_eos(token) {
            debug!(generated = buffer.generated().len(), "end token reached");
            return Ok(GenerationOutput::new(
                buffer.generated(),
                FinishReason::EndOfSequence,
                stats,
            ));
        }
    }

    debug!(generated = buffer.generated().len(), "token budget reached");
    Ok(GenerationOutput::new(
        buffer.generated(),
        FinishReason::MaxTokens,
        stats,
    ))
}
