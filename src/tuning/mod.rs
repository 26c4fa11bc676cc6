//! Self-tuning: quadratic correction curves and the calibration procedure
//! that measures each analog voice card's real response and fits them.
//!
//! The voice cards are driven in semitone units, but their exponential
//! converters and filter cores are not perfectly linear or identical. Each
//! voice therefore carries one correction curve per calibrated parameter
//! (oscillator pitch, filter cutoff) mapping the *ideal* semitone value to
//! the request that makes the hardware actually produce it.

pub mod calibrator;
pub mod counter;
pub mod fit;

pub use calibrator::{CalibrationReport, Calibrator, CenterProbe, TuneParam};
pub use counter::{CycleCapture, CycleCounter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of calibrated parameters per voice (pitch, cutoff).
pub const TUNED_PARAMS: usize = 2;

/// Sample points per calibration sweep.
pub const TUNING_SAMPLES: usize = 20;

/// Frequency of C0 in Hz; semitone 0 of the request scale.
pub const C0_HZ: f32 = 16.3516;

/// Convert a measured frequency to its ideal 12-TET semitone value.
pub fn frequency_to_semis(freq: f32) -> f32 {
    12.0 / std::f32::consts::LN_2 * (freq / C0_HZ).ln()
}

/// Quadratic map from ideal semitone value to the corrected request.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningCorrection {
    /// Coefficients `[a, b, c]` of `a + b*x + c*x^2`.
    pub parabolic: [f32; 3],
}

impl Default for TuningCorrection {
    fn default() -> Self {
        Self::identity()
    }
}

impl TuningCorrection {
    pub fn identity() -> Self {
        Self {
            parabolic: [0.0, 1.0, 0.0],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Evaluate the correction in Horner form.
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        let [a, b, c] = self.parabolic;
        a + x * (b + x * c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_passes_values_through() {
        let corr = TuningCorrection::identity();
        for x in [-12.0, 0.0, 36.5, 110.0] {
            assert_eq!(corr.apply(x), x);
        }
    }

    #[test]
    fn apply_matches_polynomial() {
        let corr = TuningCorrection {
            parabolic: [1.5, 0.98, 0.002],
        };
        let x = 60.0f32;
        assert_relative_eq!(corr.apply(x), 1.5 + 0.98 * x + 0.002 * x * x, epsilon = 1e-4);
    }

    #[test]
    fn semis_conversion_matches_equal_temperament() {
        // C0 itself is semitone 0, one octave up is 12
        assert_relative_eq!(frequency_to_semis(C0_HZ), 0.0, epsilon = 1e-4);
        assert_relative_eq!(frequency_to_semis(2.0 * C0_HZ), 12.0, epsilon = 1e-3);
        // A4 = 440 Hz sits at semitone 57
        assert_relative_eq!(frequency_to_semis(440.0), 57.0, epsilon = 0.01);
    }
}
