pub mod dsp;
pub mod io;
pub mod panel; // Front-panel gesture and pickup semantics
pub mod patch;
pub mod player; // Arpeggiator, sequencer and clock handling
pub mod runtime;
pub mod synth; // Voice pool and scheduling
pub mod tuning;

/// Number of physical voice cards driven by the control core.
pub const VOICE_COUNT: usize = 8;

pub(crate) const MIN_PERIOD: f32 = 1.0 / 48_000.0;
