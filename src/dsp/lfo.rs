//! Delay-ramped low frequency oscillator.
//!
//! One instance lives in every voice; the instrument additionally owns a
//! shared "synced" instance (selected by the LFO-sync patch switch so all
//! voices wobble in phase) and a quadrature pair driving the chorus bucket
//! brigades.

use std::f32::consts::{FRAC_PI_2, TAU};

use crate::dsp::sine::table_sine;

/// Amplitude ramp slope once the onset delay has elapsed: 0 to full in 20 ms.
const AMP_RAMP_PER_SECOND: f32 = 50.0;

#[derive(Debug, Clone)]
pub struct Lfo {
    /// Oscillation frequency in Hz.
    pub frequency: f32,
    /// Small per-voice frequency offset so an ensemble of voices drifts
    /// apart instead of beating in lockstep.
    pub drift: f32,
    /// Seconds between a rising gate edge and the amplitude ramp starting.
    pub delay_time: f32,

    phase: f32,
    amplitude: f32,
    level: f32,
    time: f32,
    previous_gate: bool,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Lfo {
    pub fn new() -> Self {
        Self {
            frequency: 1.0,
            drift: 0.0,
            delay_time: 0.0,
            phase: 0.0,
            amplitude: 1.0,
            level: 0.0,
            time: 0.0,
            previous_gate: false,
        }
    }

    /// Advance by `dt` seconds. A rising gate edge restarts the onset delay;
    /// falling edges are ignored (the ramp keeps whatever it reached).
    pub fn update(&mut self, dt: f32, gate: bool) {
        if !self.previous_gate && gate {
            self.time = 0.0;
        }
        self.previous_gate = gate;

        self.amplitude = if self.time < self.delay_time {
            0.0
        } else {
            ((self.time - self.delay_time) * AMP_RAMP_PER_SECOND).min(1.0)
        };

        self.phase = (self.phase + TAU * (self.frequency + self.drift) * dt).rem_euclid(TAU);
        self.level = self.amplitude * table_sine(self.phase);
        self.time += dt;
    }

    /// Current bipolar output (-1.0 to 1.0), already amplitude-scaled.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Lock this oscillator 90 degrees ahead of `other`.
    ///
    /// The stereo chorus wants its two modulators in quadrature.
    pub fn sync_quadrature(&mut self, other: &Lfo) {
        self.phase = (other.phase + FRAC_PI_2).rem_euclid(TAU);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.005;

    #[test]
    fn silent_until_delay_elapses() {
        let mut lfo = Lfo::new();
        lfo.frequency = 5.0;
        lfo.delay_time = 0.5;

        lfo.update(DT, true); // rising edge
        for _ in 0..80 {
            lfo.update(DT, true);
            assert_eq!(lfo.level(), 0.0);
        }

        // Past the delay the ramp opens up all the way
        for _ in 0..200 {
            lfo.update(DT, true);
        }
        assert!((lfo.amplitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rising_edge_restarts_delay() {
        let mut lfo = Lfo::new();
        lfo.frequency = 2.0;
        lfo.delay_time = 0.2;

        lfo.update(DT, true);
        for _ in 0..100 {
            lfo.update(DT, true);
        }
        assert!(lfo.amplitude > 0.0);

        // Gate off then on again: the onset delay starts over
        lfo.update(DT, false);
        lfo.update(DT, true);
        lfo.update(DT, true);
        assert_eq!(lfo.amplitude, 0.0);
    }

    #[test]
    fn oscillates_at_configured_frequency() {
        let mut lfo = Lfo::new();
        lfo.frequency = 1.0;

        // A quarter period lands near the positive peak
        let steps = (0.25 / DT) as usize;
        for _ in 0..steps {
            lfo.update(DT, true);
        }
        assert!(lfo.level() > 0.95, "level {}", lfo.level());
    }

    #[test]
    fn drift_detunes_the_phase_advance() {
        let mut a = Lfo::new();
        let mut b = Lfo::new();
        b.drift = 0.05;

        for _ in 0..1000 {
            a.update(DT, true);
            b.update(DT, true);
        }
        assert!((a.phase() - b.phase()).abs() > 1e-3);
    }

    #[test]
    fn quadrature_sync_offsets_by_quarter_turn() {
        let mut left = Lfo::new();
        let mut right = Lfo::new();
        for _ in 0..37 {
            left.update(DT, false);
        }
        right.sync_quadrature(&left);
        let diff = (right.phase() - left.phase()).rem_euclid(TAU);
        assert!((diff - FRAC_PI_2).abs() < 1e-5);
    }
}
