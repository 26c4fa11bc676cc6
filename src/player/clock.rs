//! Step clock rate laws.
//!
//! Two pulse sources feed the step engine: the internal periodic timer and
//! external MIDI clock at 24 pulses per quarter note. Both are divided down
//! to steps; the functions here map the rate fader onto the divider (MIDI
//! source) or onto the timer period (internal source).

use crate::patch::curve::{discretize, fader_log};

/// Note-division dividers for MIDI clock, fastest rate last: whole notes
/// down to sixteenths including dotted/triplet feels. 24 PPQN, so 12 = an
/// eighth note per step.
pub const MIDI_CLOCK_DIVIDERS: [u32; 14] = [96, 72, 48, 36, 32, 24, 18, 16, 12, 9, 8, 6, 4, 3];

/// The internal timer is pre-scaled by the rate fader itself, so its divider
/// stays fixed at eighth notes.
pub const INTERNAL_DIVIDER: u32 = 12;

/// Divider for the current rate fader position (MIDI clock source).
pub fn midi_divider_from_rate(rate: i16) -> u32 {
    MIDI_CLOCK_DIVIDERS[discretize(rate, MIDI_CLOCK_DIVIDERS.len())]
}

/// Internal timer period in seconds for the current rate fader position.
///
/// Logarithmic in the fader so perceived tempo response is smooth across
/// the whole travel; 1 ms floor keeps the timer interval sane.
pub fn internal_step_seconds(rate: i16) -> f32 {
    0.001 + 0.05 * fader_log(1023 - rate.clamp(0, 1023))
}
