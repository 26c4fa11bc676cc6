//! Per-voice modulation sources evaluated once per control tick.
//!
//! These components are allocation-free and deterministic, making them safe to
//! embed directly inside voice structs. They intentionally stay focused on the
//! signal math so the instrument layer can own orchestration, scheduling and
//! routing.

/// Gate-driven exponential-approach envelope generator.
pub mod envelope;
/// Delay-ramped low frequency oscillator.
pub mod lfo;
/// Table-interpolated sine used by the LFOs.
pub mod sine;

pub use envelope::{Envelope, EnvelopeStage};
pub use lfo::Lfo;
