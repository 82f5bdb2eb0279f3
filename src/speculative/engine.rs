//! Speculative decoding engine.
//!
//! Orchestrates the drafter, the target and rejection sampling for one
//! generation call at a time.

use candle_core::Tensor;
use tracing::{debug, trace};

use super::config::SpeculativeConfig;
use super::sampler::{residual_distribution, RejectionSampler};
use super::trace::{self as tracer, RoundTrace, SpeculativeTracer, TraceEvent};
use crate::core::{IncrementalState, TokenBuffer, DEFAULT_MAX_CONTEXT_LEN};
use crate::engine::output::{FinishReason, GenerationOutput, SpeculativeStats};
use crate::engine::sampler::SamplingStrategy;
use crate::error::{Error, Result};
use crate::model::{self, ModelAdapter};

/// Speculative decoding engine.
///
/// Coordinates a cheap drafter and an expensive target so that the target
/// runs once per round instead of once per token, while the committed
/// tokens keep exactly the target's distribution.
///
/// ## Workflow
///
/// 1. **Prefill** (optional): the target alone produces the first token
/// 2. **Draft**: the drafter proposes `g` tokens, one forward call each
/// 3. **Verify**: the target scores all `g` positions in one forward call
/// 4. **Accept/Reject**: keep the longest prefix that passes rejection sampling
/// 5. **Commit**: append a bonus token (all accepted) or a token from the
///    residual distribution (first rejection), pruning both caches back
///
/// ## Example
///
/// ```text
/// Buffer: [The, quick, brown]
/// Draft:  [fox, jumps, over, the]     <- 4 drafter calls
/// Target: verify positions 3..7        <- 1 target call
/// Result: [fox, jumps] + [across]      <- 2 accepted + 1 resampled
/// ```
pub struct SpeculativeEngine<'a, D: ModelAdapter + ?Sized, T: ModelAdapter + ?Sized> {
    /// Cheap model that proposes tokens.
    drafter: &'a D,
    /// Reference model whose distribution the output follows.
    target: &'a T,
    /// Configuration.
    config: SpeculativeConfig,
    /// Accept/reject test.
    rejection_sampler: RejectionSampler,
    /// Optional observer.
    tracer: Option<Box<dyn SpeculativeTracer + 'a>>,
}

impl<'a, D: ModelAdapter + ?Sized, T: ModelAdapter + ?Sized> SpeculativeEngine<'a, D, T> {
    /// Create a new speculative engine.
    ///
    /// # Arguments
    ///
    /// * `drafter` - Small model that proposes tokens
    /// * `target` - Large model that verifies them
    /// * `config` - Speculative decoding configuration
    ///
    /// Fails with [`Error::Config`] when the configuration is malformed or
    /// the two models disagree on the vocabulary size.
    pub fn new(drafter: &'a D, target: &'a T, config: SpeculativeConfig) -> Result<Self> {
        config.validate()?;
        if drafter.vocab_size() != target.vocab_size() {
            return Err(Error::Config(format!(
                "drafter vocabulary ({}) differs from target vocabulary ({})",
                drafter.vocab_size(),
                target.vocab_size()
            )));
        }

        let rejection_sampler = match config.seed {
            Some(seed) => RejectionSampler::with_seed(seed),
            None => RejectionSampler::new(),
        };

        Ok(Self {
            drafter,
            target,
            config,
            rejection_sampler,
            tracer: None,
        })
    }

    /// Attach a tracer that observes every step.
    pub fn with_tracer(mut self, tracer: impl SpeculativeTracer + 'a) -> Self {
        self.tracer = Some(Box::new(tracer));
        self
    }

    /// Get the speculative configuration.
    pub fn config(&self) -> &SpeculativeConfig {
        &self.config
    }

    /// Get reference to the drafter.
    pub fn drafter(&self) -> &D {
        self.drafter
    }

    /// Get reference to the target.
    pub fn target(&self) -> &T {
        self.target
    }

    /// Generate a continuation of `prompt`.
    ///
    /// Distributions and tokens for both models come from `strategy`. The
    /// returned tokens exclude the prompt; generation stops at the first
    /// committed end token (included) or when the buffer is full.
    pub fn generate<S: SamplingStrategy + ?Sized>(
        &mut self,
        prompt: &[u32],
        strategy: &mut S,
    ) -> Result<GenerationOutput> {
        let max_context_len = self
            .target
            .max_context_len()
            .unwrap_or(DEFAULT_MAX_CONTEXT_LEN);
        let mut buffer = TokenBuffer::for_generation(
            prompt,
            max_context_len,
            self.config.max_new_tokens,
            self.config.pad_token_id,
        )?;
        let use_cache = self.config.use_cache;
        let mut stats = SpeculativeStats::default();
        let mut drafter_cache: Option<D::State> = None;
        let mut target_cache: Option<T::State> = None;

        debug!(
            prompt_len = buffer.prompt_len(),
            capacity = buffer.capacity(),
            gamma = self.config.num_speculative_tokens,
            use_cache,
            "starting speculative generation"
        );

        if self.config.first_target {
            let scores = model::forward(self.target, buffer.committed(), &mut target_cache, use_cache)?;
            stats.target_passes += 1;

            let probs = strategy.process(&scores.row(buffer.position() - 1)?)?;
            let token = strategy.sample(&probs)?;
            if self.config.is_eos(token) {
                tracer::emit(&mut self.tracer, TraceEvent::EndTokenFound { location: 0 });
                return Ok(finish(&[], FinishReason::EndOfSequence, stats));
            }
            buffer.push(token);
            tracer::emit(&mut self.tracer, TraceEvent::InitialStep { token });
        }

        while !buffer.is_full() {
            let position = buffer.position();
            // At least one slot stays free for the bonus/replacement token.
            let gamma = self
                .config
                .num_speculative_tokens
                .min(buffer.remaining() - 1);

            // Draft phase: one drafter call per speculative position.
            let mut draft_rows = Vec::with_capacity(gamma);
            for k in 0..gamma {
                let scores = model::forward(
                    self.drafter,
                    buffer.prefix(position + k),
                    &mut drafter_cache,
                    use_cache,
                )?;
                let probs = strategy.process(&scores.row(position + k - 1)?)?;
                let token = strategy.sample(&probs)?;
                buffer.write_draft(k, token);
                draft_rows.push(probs);
            }
            stats.drafted += gamma;
            stats.drafter_passes += gamma;
            let drafted = buffer.drafts(gamma).to_vec();

            // Verify phase: one target call over the whole draft span. Row i
            // predicts draft i; row gamma predicts the bonus position.
            let scores = model::forward(
                self.target,
                buffer.prefix(position + gamma),
                &mut target_cache,
                use_cache,
            )?;
            stats.target_passes += 1;
            let target_rows = strategy.process(&scores.rows(position - 1, gamma + 1)?)?;

            let accepted = if gamma == 0 {
                0
            } else {
                let draft_table = Tensor::stack(&draft_rows, 0)?;
                let target_table = target_rows.narrow(0, 0, gamma)?;
                self.rejection_sampler
                    .accepted_prefix_len(&drafted, &draft_table, &target_table)?
            };
            stats.accepted += accepted;
            stats.rounds += 1;

            if let Some(location) = drafted[..accepted]
                .iter()
                .position(|&t| self.config.is_eos(t))
            {
                buffer.accept(location + 1);
                tracer::emit(&mut self.tracer, TraceEvent::EndTokenFound { location });
                return Ok(finish(buffer.generated(), FinishReason::EndOfSequence, stats));
            }

            let next_probs = if accepted == gamma {
                target_rows.get(gamma)?
            } else {
                if use_cache {
                    // The target also scored the rejected position itself.
                    model::prune(&mut drafter_cache, gamma - accepted)?;
                    model::prune(&mut target_cache, gamma - accepted + 1)?;
                }
                let target_row = target_rows.get(accepted)?;
                if self.config.skip_sample_adjustment {
                    target_row
                } else {
                    residual_distribution(&target_row, &draft_rows[accepted])?
                }
            };
            let token = strategy.sample(&next_probs)?;
            buffer.commit(accepted, gamma, token);

            let drafter_seen = drafter_cache.as_ref().map_or(0, IncrementalState::seen_len);
            let target_seen = target_cache.as_ref().map_or(0, IncrementalState::seen_len);
            debug_assert!(drafter_seen <= buffer.position());
            debug_assert!(target_seen <= buffer.position());
            trace!(
                round = stats.rounds,
                gamma,
                accepted,
                token,
                position = buffer.position(),
                drafter_seen,
                target_seen,
                "round committed"
            );

            tracer::emit(
                &mut self.tracer,
                TraceEvent::SpeculativeStep(RoundTrace {
                    round: stats.rounds - 1,
                    prompt_len: buffer.prompt_len(),
                    position,
                    drafted,
                    accepted,
                    committed: token,
                }),
            );

            if self.config.is_eos(token) {
                tracer::emit(&mut self.tracer, TraceEvent::EndTokenFound { location: accepted });
                return Ok(finish(buffer.generated(), FinishReason::EndOfSequence, stats));
            }
        }

        Ok(finish(buffer.generated(), FinishReason::MaxTokens, stats))
    }
}

fn finish(tokens: &[u32], reason: FinishReason, stats: SpeculativeStats) -> GenerationOutput {
    let output = GenerationOutput::new(tokens, reason, stats);
    debug!(
        generated = output.tokens.len(),
        rounds = output.stats.rounds,
        acceptance_rate = output.acceptance_rate,
        finish_reason = ?output.finish_reason,
        "speculative generation finished"
    );
    output
}

/// Run one speculative generation call.
///
/// Convenience wrapper that builds a [`SpeculativeEngine`] for a single
/// prompt.
pub fn speculative_generate<D, T, S>(
    prompt: &[u32],
    drafter: &D,
    target: &T,
    config: SpeculativeConfig,
    strategy: &mut S,
    tracer: Option<&mut dyn SpeculativeTracer>,
) -> Result<GenerationOutput>
where
    D: ModelAdapter + ?Sized,
    T: ModelAdapter + ?Sized,
    S: SamplingStrategy + ?Sized,
{
    let mut engine = SpeculativeEngine::new(drafter, target, config)?;
    if let Some(tracer) = tracer {
        engine = engine.with_tracer(tracer);
    }
    engine.generate(prompt, strategy)
}
