//! Optional tracing hook for the decoding loop.
//!
//! The engine reports what happened after each decision has been made; a
//! tracer only observes. It returns nothing, and a panic inside it is caught
//! and logged, so it can never change or abort a generation.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

/// One round of draft, verify and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundTrace {
    /// Zero-based round index.
    pub round: usize,
    /// Number of prompt tokens.
    pub prompt_len: usize,
    /// Committed position at the start of the round.
    pub position: usize,
    /// Tokens the drafter proposed, in order.
    pub drafted: Vec<u32>,
    /// How many of `drafted` were accepted.
    pub accepted: usize,
    /// Bonus or replacement token written after the accepted drafts.
    pub committed: u32,
}

impl RoundTrace {
    /// Drafts that survived verification.
    pub fn accepted_tokens(&self) -> &[u32] {
        &self.drafted[..self.accepted]
    }

    /// Drafts discarded at and after the rejection point.
    pub fn rejected_tokens(&self) -> &[u32] {
        &self.drafted[self.accepted..]
    }

    /// Whether every draft was accepted and `committed` is a bonus token.
    pub fn all_accepted(&self) -> bool {
        self.accepted == self.drafted.len()
    }
}

/// Something the engine reports to a tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TraceEvent {
    /// The target-only first step produced `token`.
    InitialStep { token: u32 },
    /// A draft/verify round completed.
    SpeculativeStep(RoundTrace),
    /// An end token was committed `location` slots into the round's span.
    EndTokenFound { location: usize },
}

/// Observer for decoding progress.
pub trait SpeculativeTracer {
    /// Called once per event, after the engine has acted on it.
    fn on_event(&mut self, event: &TraceEvent);
}

impl<T: SpeculativeTracer + ?Sized> SpeculativeTracer for &mut T {
    fn on_event(&mut self, event: &TraceEvent) {
        (**self).on_event(event);
    }
}

impl<T: SpeculativeTracer + ?Sized> SpeculativeTracer for Box<T> {
    fn on_event(&mut self, event: &TraceEvent) {
        (**self).on_event(event);
    }
}

/// Emits every event as a `tracing` debug record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl SpeculativeTracer for LogTracer {
    fn on_event(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::InitialStep { token } => {
                tracing::debug!(token, "initial step: 1 token from target");
            }
            TraceEvent::SpeculativeStep(round) => {
                tracing::debug!(
                    round = round.round,
                    position = round.position,
                    accepted = ?round.accepted_tokens(),
                    rejected = ?round.rejected_tokens(),
                    committed = round.committed,
                    "speculative step: {} draft{} + 1 token",
                    round.accepted,
                    if round.accepted == 1 { "" } else { "s" }
                );
            }
            TraceEvent::EndTokenFound { location } => {
                tracing::debug!(location, "end token found");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Only the round events.
    pub fn rounds(&self) -> impl Iterator<Item = &RoundTrace> {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::SpeculativeStep(round) => Some(round),
            _ => None,
        })
    }
}

impl SpeculativeTracer for RecordingTracer {
    fn on_event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

/// Deliver `event` to `tracer`, containing any panic it raises.
pub(crate) fn emit(tracer: &mut Option<Box<dyn SpeculativeTracer + '_>>, event: TraceEvent) {
    let Some(tracer) = tracer.as_mut() else {
        return;
    };
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| tracer.on_event(&event)));
    if delivered.is_err() {
        tracing::warn!(?event, "tracer panicked; event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl SpeculativeTracer for Exploding {
        fn on_event(&mut self, _event: &TraceEvent) {
            panic!("tracer failure");
        }
    }

    #[test]
    fn test_round_trace_split() {
        let round = RoundTrace {
            round: 0,
            prompt_len: 3,
            position: 3,
            drafted: vec![7, 8, 9],
            accepted: 1,
            committed: 4,
        };
        assert_eq!(round.accepted_tokens(), &[7]);
        assert_eq!(round.rejected_tokens(), &[8, 9]);
        assert!(!round.all_accepted());
    }

    #[test]
    fn test_recording_tracer() {
        let mut recorder = RecordingTracer::new();
        {
            let mut tracer: Option<Box<dyn SpeculativeTracer + '_>> = Some(Box::new(&mut recorder));
            emit(&mut tracer, TraceEvent::InitialStep { token: 5 });
            emit(&mut tracer, TraceEvent::EndTokenFound { location: 0 });
        }
        assert_eq!(recorder.events().len(), 2);
        assert_eq!(recorder.rounds().count(), 0);
    }

    #[test]
    fn test_panicking_tracer_is_contained() {
        let mut tracer: Option<Box<dyn SpeculativeTracer>> = Some(Box::new(Exploding));
        emit(&mut tracer, TraceEvent::InitialStep { token: 1 });
    }
}
