//! The calibration procedure: sweep, measure, fit.
//!
//! Runs as an offline mode with exclusive control of the voice outputs (the
//! master volume is zeroed so the sweep is inaudible; the measurement taps
//! the analog loopback line, not the mix bus). Each voice gets two profiles:
//! oscillator pitch, measured with the square wave routed to the loopback,
//! and filter cutoff, measured with the oscillators muted and the filter
//! resonance pushed into self-oscillation.
//!
//! Calibration is deliberately not atomic: a profile that times out keeps
//! its identity correction and is reported as failed, while every other
//! profile proceeds and is kept.

use crate::io::render::{RenderSink, MIXER_SQUARE};
use crate::io::time::{elapsed, TimeSource};
use crate::synth::Instrument;
use crate::tuning::counter::CycleCounter;
use crate::tuning::fit::fit_parabola;
use crate::tuning::{frequency_to_semis, TUNED_PARAMS, TUNING_SAMPLES};
use crate::VOICE_COUNT;

/// Pitch profiles sweep most of the keyboard range.
pub const PITCH_SWEEP_SEMIS: (f32, f32) = (30.0, 110.0);

/// Cutoff profiles sweep the range where self-oscillation is reliable.
pub const CUTOFF_SWEEP_SEMIS: (f32, f32) = (30.0, 60.0);

/// Analog settle time after driving a new request value.
const SETTLE_MICROS: u32 = 2_000;

/// Wall-clock limit per measurement; a dead loopback must not hang the
/// instrument.
const MEASURE_TIMEOUT_MILLIS: u32 = 2_000;

/// Busy-wait poll granularity while a measurement window is open.
const POLL_MICROS: u32 = 500;

const CENTER_SAMPLES: u32 = 4;
const CENTER_SETTLE_MICROS: u32 = 100;

/// Cycles to count for a request value: more cycles for high notes keeps
/// the measurement window roughly constant across the sweep.
pub fn cycles_for_semis(semis: f32) -> u32 {
    (0.302 * semis + 18.99) as u32
}

/// Which per-voice parameter a profile calibrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneParam {
    Pitch,
    Cutoff,
}

impl TuneParam {
    pub const fn index(self) -> usize {
        match self {
            TuneParam::Pitch => 0,
            TuneParam::Cutoff => 1,
        }
    }
}

/// Raw readings of the analog control centers (pitch bend and mod wheel at
/// rest), muxed to a known line by the driver.
pub trait CenterProbe {
    fn read_pitch_bend_raw(&mut self) -> u16;
    fn read_mod_raw(&mut self) -> u16;
}

/// Per-profile pass/fail plus the measured center offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReport {
    /// `profiles[voice][TuneParam::index()]`: true = profile calibrated.
    pub profiles: [[bool; TUNED_PARAMS]; VOICE_COUNT],
    pub pitch_bend_center: f32,
    pub mod_center: f32,
}

impl CalibrationReport {
    pub fn all_ok(&self) -> bool {
        self.profiles.iter().all(|voice| voice.iter().all(|&ok| ok))
    }

    pub fn failed_count(&self) -> usize {
        self.profiles
            .iter()
            .flatten()
            .filter(|&&ok| !ok)
            .count()
    }
}

pub struct Calibrator<'a> {
    instrument: &'a mut Instrument,
    counter: &'a CycleCounter,
    time: &'a dyn TimeSource,
    sink: &'a mut dyn RenderSink,
}

impl<'a> Calibrator<'a> {
    pub fn new(
        instrument: &'a mut Instrument,
        counter: &'a CycleCounter,
        time: &'a dyn TimeSource,
        sink: &'a mut dyn RenderSink,
    ) -> Self {
        Self {
            instrument,
            counter,
            time,
            sink,
        }
    }

    /// Calibrate every voice and both control centers.
    pub fn run(&mut self, probe: &mut dyn CenterProbe) -> CalibrationReport {
        self.instrument.main_volume = 0.0;

        let mut report = CalibrationReport {
            profiles: [[false; TUNED_PARAMS]; VOICE_COUNT],
            pitch_bend_center: 0.0,
            mod_center: 0.0,
        };

        for voice in 0..VOICE_COUNT {
            for other in 0..VOICE_COUNT {
                self.instrument.voice_mut(other).out_amp = 0.0;
            }

            // Oscillator pitch: square wave into the loopback, filter open
            self.instrument.mixer = MIXER_SQUARE;
            {
                let v = self.instrument.voice_mut(voice);
                v.out_cutoff = 120.0;
                v.out_pulse = 0.5;
                v.out_resonance = 0.0;
                v.out_sub = 0.0;
                v.out_amp = 1.0;
            }
            report.profiles[voice][TuneParam::Pitch.index()] = self.find_profile(
                voice,
                PITCH_SWEEP_SEMIS.0,
                PITCH_SWEEP_SEMIS.1,
                TuneParam::Pitch,
            );

            // Filter cutoff: oscillators off, resonance into self-oscillation
            self.instrument.mixer = 0;
            {
                let v = self.instrument.voice_mut(voice);
                v.out_resonance = 0.6;
                v.out_amp = 1.0;
            }
            report.profiles[voice][TuneParam::Cutoff.index()] = self.find_profile(
                voice,
                CUTOFF_SWEEP_SEMIS.0,
                CUTOFF_SWEEP_SEMIS.1,
                TuneParam::Cutoff,
            );
        }

        report.pitch_bend_center = self.average_center(|p| p.read_pitch_bend_raw(), probe);
        report.mod_center = self.average_center(|p| p.read_mod_raw(), probe);
        self.instrument.pitch_bend_center = report.pitch_bend_center;
        self.instrument.mod_center = report.mod_center;

        if !report.all_ok() {
            log::warn!("calibration finished with {} failed profiles", report.failed_count());
        }
        report
    }

    fn average_center(
        &mut self,
        mut read: impl FnMut(&mut dyn CenterProbe) -> u16,
        probe: &mut dyn CenterProbe,
    ) -> f32 {
        let mut sum = 0.0;
        for _ in 0..CENTER_SAMPLES {
            self.time.delay_micros(CENTER_SETTLE_MICROS);
            sum += read(probe) as f32;
        }
        sum / CENTER_SAMPLES as f32
    }

    /// Sweep one voice/parameter and fit its correction. Returns false on
    /// timeout; the identity correction stays in place.
    fn find_profile(&mut self, voice: usize, semis_min: f32, semis_max: f32, param: TuneParam) -> bool {
        match param {
            TuneParam::Pitch => self.instrument.voice_mut(voice).pitch_correction.reset(),
            TuneParam::Cutoff => self.instrument.voice_mut(voice).cutoff_correction.reset(),
        }

        let mut ideal = [0.0f32; TUNING_SAMPLES];
        let mut requested = [0.0f32; TUNING_SAMPLES];
        let step = (semis_max - semis_min) / (TUNING_SAMPLES - 1) as f32;

        for i in 0..TUNING_SAMPLES {
            let request = semis_min + i as f32 * step;
            let Some(freq) = self.measure_frequency(voice, request, param) else {
                // Abort this profile's sweep; the others still run
                return false;
            };
            ideal[i] = frequency_to_semis(freq);
            requested[i] = request;

            log::debug!(
                "[{}] {:?} request={:.2} freq={:.2} ideal={:.2}",
                voice,
                param,
                request,
                freq,
                ideal[i]
            );
        }

        let coefficients = fit_parabola(&ideal, &requested);
        match param {
            TuneParam::Pitch => {
                self.instrument.voice_mut(voice).pitch_correction.parabolic = coefficients
            }
            TuneParam::Cutoff => {
                self.instrument.voice_mut(voice).cutoff_correction.parabolic = coefficients
            }
        }

        log::debug!(
            "[{}] {:?} a+bx+cx^2: {:.4} {:.4} {:.6}",
            voice,
            param,
            coefficients[0],
            coefficients[1],
            coefficients[2]
        );
        true
    }

    /// Drive one request value and measure the resulting frequency by
    /// counting loopback cycles. `None` on timeout.
    fn measure_frequency(&mut self, voice: usize, semis: f32, param: TuneParam) -> Option<f32> {
        {
            let v = self.instrument.voice_mut(voice);
            match param {
                TuneParam::Pitch => v.out_pitch = semis,
                TuneParam::Cutoff => v.out_cutoff = semis,
            }
        }

        self.sink.write(&self.instrument.render_frame());
        self.time.delay_micros(SETTLE_MICROS);

        self.counter.arm(cycles_for_semis(semis));

        let started_millis = self.time.millis();
        while !self.counter.is_done() {
            self.time.delay_micros(POLL_MICROS);
            if elapsed(started_millis, self.time.millis()) > MEASURE_TIMEOUT_MILLIS {
                self.counter.disarm();
                log::warn!(
                    "tuning timeout: voice {}, {:?}, request {:.2}",
                    voice,
                    param,
                    semis
                );
                return None;
            }
        }

        self.counter.capture()?.frequency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_count_grows_with_pitch() {
        // Low notes count few cycles (slow edges), high notes more
        assert_eq!(cycles_for_semis(30.0), 28);
        assert_eq!(cycles_for_semis(110.0), 52);
        assert!(cycles_for_semis(110.0) > cycles_for_semis(30.0));
    }

    #[test]
    fn report_accounting() {
        let mut report = CalibrationReport {
            profiles: [[true; TUNED_PARAMS]; VOICE_COUNT],
            pitch_bend_center: 512.0,
            mod_center: 512.0,
        };
        assert!(report.all_ok());
        assert_eq!(report.failed_count(), 0);

        report.profiles[3][0] = false;
        assert!(!report.all_ok());
        assert_eq!(report.failed_count(), 1);
    }
}
