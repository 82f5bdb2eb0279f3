//! Generation results and statistics.

use serde::Serialize;

/// Reason a generation call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinishReason {
    /// An end-of-sequence token was committed.
    EndOfSequence,
    /// The buffer filled up (token budget or context length).
    MaxTokens,
}

/// Counters for one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpeculativeStats {
    /// Draft/verify rounds run.
    pub rounds: usize,
    /// Draft tokens proposed.
    pub drafted: usize,
    /// Draft tokens accepted.
    pub accepted: usize,
    /// Forward calls made on the drafter.
    pub drafter_passes: usize,
    /// Forward calls made on the target.
    pub target_passes: usize,
    /// Tokens returned to the caller.
    pub generated: usize,
}

impl SpeculativeStats {
    /// Accepted drafts over proposed drafts; 0 when nothing was proposed.
    pub fn acceptance_rate(&self) -> f32 {
        if self.drafted == 0 {
            0.0
        } else {
            self.accepted as f32 / self.drafted as f32
        }
    }

    /// Generated tokens per draft/verify round.
    pub fn tokens_per_round(&self) -> f32 {
        if self.rounds == 0 {
            0.0
        } else {
            self.generated as f32 / self.rounds as f32
        }
    }

    /// Generated tokens per target forward pass.
    pub fn tokens_per_target_pass(&self) -> f32 {
        if self.target_passes == 0 {
            0.0
        } else {
            self.generated as f32 / self.target_passes as f32
        }
    }
}

/// Output of a generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutput {
    /// Generated token ids, prompt excluded.
    pub tokens: Vec<u32>,
    /// Accepted drafts over proposed drafts (0 when none were proposed).
    pub acceptance_rate: f32,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Round and pass counters.
    pub stats: SpeculativeStats,
}

impl GenerationOutput {
    pub(crate) fn new(tokens: &[u32], finish_reason: FinishReason, mut stats: SpeculativeStats) -> Self {
        stats.generated = tokens.len();
        Self {
            tokens: tokens.to_vec(),
            acceptance_rate: stats.acceptance_rate(),
            finish_reason,
            stats,
        }
    }
}
