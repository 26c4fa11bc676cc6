//! A single voice: modulation state, scheduling metadata and rendered
//! control values for one analog voice card.

use crate::dsp::{Envelope, Lfo};
use crate::io::render::VoiceFrame;
use crate::patch::curve::{fader_lin, fader_lin_snap, fader_log, lerp};
use crate::patch::{Patch, PatchFader, PatchSwitch};
use crate::synth::instrument::{InstrumentSetting, InstrumentSettings};
use crate::tuning::TuningCorrection;

/// Pick one of three values by switch position (positions beyond 2 take the
/// last value, matching a 3-position switch wired to a resistor ladder).
fn select3(position: i8, a: f32, b: f32, c: f32) -> f32 {
    match position {
        0 => a,
        1 => b,
        _ => c,
    }
}

pub struct Voice {
    // Scheduling state; the instrument's scheduler maintains the invariant
    // that no two gated voices hold the same note.
    pub note: u8,
    pub velocity: u8,
    pub gate: bool,
    /// Recency stamp; higher means touched more recently. Sole tie-break
    /// for voice stealing.
    pub scheduling_tag: i32,

    pub env: Envelope,
    pub lfo: Lfo,

    pub pitch_correction: TuningCorrection,
    pub cutoff_correction: TuningCorrection,
    /// Per-card VCA gain trim applied on top of the rendered amplitude.
    pub volume_correction: f32,

    // Rendered control values, uncorrected
    pub out_pitch: f32,
    pub out_cutoff: f32,
    pub out_pulse: f32,
    pub out_sub: f32,
    pub out_resonance: f32,
    pub out_amp: f32,
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    pub fn new() -> Self {
        Self {
            note: 60,
            velocity: 127,
            gate: false,
            scheduling_tag: -1,
            env: Envelope::new(),
            lfo: Lfo::new(),
            pitch_correction: TuningCorrection::identity(),
            cutoff_correction: TuningCorrection::identity(),
            volume_correction: 1.0,
            out_pitch: 0.0,
            out_cutoff: 0.0,
            out_pulse: 0.0,
            out_sub: 0.0,
            out_resonance: 0.0,
            out_amp: 0.0,
        }
    }

    /// Advance modulation and derive the six output values from the patch.
    ///
    /// `synced_lfo_level` is the instrument-global LFO, substituted for the
    /// per-voice one when the LFO-sync switch is on. `pitch_bend` is -1..1,
    /// `mod_wheel` 0..1, both already centered and dead-zoned.
    pub fn update(
        &mut self,
        dt: f32,
        patch: &Patch,
        settings: &InstrumentSettings,
        synced_lfo_level: f32,
        pitch_bend: f32,
        mod_wheel: f32,
    ) {
        self.env.attack = 10.0 * fader_log(patch.fader(PatchFader::Attack));
        self.env.decay = 10.0 * fader_log(patch.fader(PatchFader::Decay));
        self.env.sustain = fader_lin(patch.fader(PatchFader::Sustain));
        self.env.release = 10.0 * fader_log(patch.fader(PatchFader::Release));

        self.lfo.frequency = 20.0 * fader_log(patch.fader(PatchFader::LfoRate));
        self.lfo.delay_time = 5.0 * fader_log(patch.fader(PatchFader::LfoDelay));
        self.lfo.update(dt, self.gate);

        let lfo_level = if patch.switch_on(PatchSwitch::LfoSync) {
            synced_lfo_level
        } else {
            self.lfo.level()
        };

        self.env.update(dt, self.gate);

        let vco_lfo = 30.0 * fader_log(patch.fader(PatchFader::Vibrato));
        let vcf_freq = lerp(fader_lin(patch.fader(PatchFader::Cutoff)), -20.0, 60.0);
        let vcf_kybd = fader_lin_snap(patch.fader(PatchFader::FilterKeytrack), 0.05);
        let vcf_lfo = 30.0 * fader_log(patch.fader(PatchFader::FilterLfo));
        let vcf_env = 80.0 * fader_lin(patch.fader(PatchFader::FilterEnvelope));

        // Mod wheel adds on top of the patch's own modulation depths
        let mod_vibrato = 25.0 * fader_log(settings.get(InstrumentSetting::ModVco));
        let mod_tremolo = 60.0 * fader_log(settings.get(InstrumentSetting::ModVcf));
        let vibrato = vco_lfo + mod_vibrato * mod_wheel;
        let tremolo = vcf_lfo + mod_tremolo * mod_wheel;

        let bend_range = if settings.get(InstrumentSetting::BendOctave) != 0 {
            12.0
        } else {
            2.0
        };
        let bend_semis = pitch_bend * bend_range;

        let pwm = fader_lin(patch.fader(PatchFader::PulseWidth));

        self.out_pitch = self.note as f32 + vibrato * lfo_level + bend_semis;
        self.out_cutoff =
            vcf_freq + vcf_kybd * self.note as f32 + tremolo * lfo_level + vcf_env * self.env.level();
        self.out_pulse = select3(
            patch.switch(PatchSwitch::PwmSource),
            0.5 + 0.5 * self.env.level() * pwm,
            0.5 + 0.5 * lfo_level * pwm,
            pwm,
        );
        self.out_sub = fader_lin(patch.fader(PatchFader::SubOscillator));
        self.out_resonance = 0.6 * fader_lin(patch.fader(PatchFader::Resonance));
        self.out_amp = 0.4
            * select3(
                patch.switch(PatchSwitch::AmpShape),
                self.env.level(),
                if self.gate { 1.0 } else { 0.0 },
                0.0,
            );
    }

    /// Final values for the render sink, corrections applied.
    pub fn frame(&self) -> VoiceFrame {
        VoiceFrame {
            pitch: self.pitch_correction.apply(self.out_pitch),
            cutoff: self.cutoff_correction.apply(self.out_cutoff),
            pulse: self.out_pulse,
            sub: self.out_sub,
            resonance: self.out_resonance,
            amp: self.out_amp * self.volume_correction,
        }
    }
}
