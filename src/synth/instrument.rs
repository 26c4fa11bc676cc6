//! The instrument aggregate: voice pool, patch, performance settings and
//! the note scheduler.
//!
//! Exactly one `Instrument` exists for the life of the process. It is
//! constructed once and passed by reference wherever the I/O layer needs it;
//! interrupt-side collaborators talk to it through the event queue, never
//! through globals.

use crate::dsp::Lfo;
use crate::io::render::{RenderFrame, CHORUS_I, CHORUS_II, MIXER_SAW, MIXER_SQUARE};
use crate::patch::curve::fader_log;
use crate::patch::{Patch, PatchFader, PatchSwitch};
use crate::synth::voice::Voice;
use crate::tuning::TuningCorrection;
use crate::io::store::TuningRecord;
use crate::VOICE_COUNT;

/// Performance settings that live outside the patch (not part of a stored
/// sound): wheel/bend state, master volume, modulation depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentSetting {
    PitchBend,
    ModWheel,
    Aftertouch,
    Portamento,
    Volume,
    /// Mod wheel to VCO depth.
    ModVco,
    /// Mod wheel to VCF depth.
    ModVcf,
    /// 1 = pitch bend spans an octave instead of two semitones.
    BendOctave,
}

impl InstrumentSetting {
    pub const COUNT: usize = 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentSettings([i16; InstrumentSetting::COUNT]);

impl InstrumentSettings {
    pub fn get(&self, setting: InstrumentSetting) -> i16 {
        self.0[setting as usize]
    }

    pub fn set(&mut self, setting: InstrumentSetting, value: i16) {
        self.0[setting as usize] = value;
    }

    pub fn toggle(&mut self, setting: InstrumentSetting) {
        let flipped = if self.get(setting) != 0 { 0 } else { 1 };
        self.set(setting, flipped);
    }
}

/// Fixed per-voice LFO drift seeds; keeps an ensemble of held voices from
/// beating in lockstep without needing an RNG at startup.
const DRIFT_SEEDS: [f32; VOICE_COUNT] = [
    0.1374, 0.8649, 0.5221, 0.0376, 0.9185, 0.2713, 0.6830, 0.4507,
];

/// Map a chorus LFO level into the 0.25..1.0 depth window the ensemble
/// circuit expects.
fn chorus_depth(lfo_level: f32) -> f32 {
    0.25 + 0.75 * (0.5 + 0.5 * lfo_level)
}

/// Center a raw 10-bit pitch-bend reading: symmetric dead zone of 0.1 around
/// the calibrated rest position, rescaled to -1..1.
fn shape_pitch_bend(raw: i16, center: f32) -> f32 {
    const THRESHOLD: f32 = 0.1;
    let mut bend = (raw as f32 - center) / 150.0;
    bend -= bend.clamp(-THRESHOLD, THRESHOLD);
    bend *= 1.0 / (1.0 - THRESHOLD);
    bend.clamp(-1.0, 1.0)
}

/// Center a raw 10-bit mod-wheel reading: the wheel reads backwards, with a
/// small dead zone at rest, rescaled to 0..1.
fn shape_mod_wheel(raw: i16, center: f32) -> f32 {
    const THRESHOLD: f32 = 0.05;
    let mut wheel = (center - raw as f32) / 153.0;
    wheel -= wheel.clamp(0.0, THRESHOLD);
    wheel *= 1.0 / (1.0 - THRESHOLD);
    wheel.clamp(0.0, 1.0)
}

pub struct Instrument {
    voices: [Voice; VOICE_COUNT],
    patch: Patch,
    settings: InstrumentSettings,
    scheduling_tag_counter: i32,
    unison_divisor: usize,

    chorus_lfo_left: Lfo,
    chorus_lfo_right: Lfo,
    synced_lfo: Lfo,

    pub(crate) mixer: u8,
    pub(crate) chorus_mode: u8,
    pub(crate) main_volume: f32,
    pub(crate) pitch_bend_center: f32,
    pub(crate) mod_center: f32,
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument {
    pub fn new() -> Self {
        let voices = std::array::from_fn(|i| {
            let mut voice = Voice::new();
            voice.lfo.drift = 0.05 * DRIFT_SEEDS[i];
            voice
        });

        let mut patch = Patch::default();
        patch.set_switch(PatchSwitch::VcoSaw, 1);

        let mut settings = InstrumentSettings::default();
        settings.set(InstrumentSetting::Volume, 900);

        Self {
            voices,
            patch,
            settings,
            scheduling_tag_counter: 0,
            unison_divisor: 1,
            chorus_lfo_left: Lfo::new(),
            chorus_lfo_right: Lfo::new(),
            synced_lfo: Lfo::new(),
            mixer: MIXER_SAW,
            chorus_mode: 0,
            main_volume: 1.0,
            // mid-scale until a stored calibration is applied
            pitch_bend_center: 512.0,
            mod_center: 512.0,
        }
    }

    /// Advance every voice and the shared modulation sources by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        // The synced LFO must track the same patch law as the per-voice ones
        self.synced_lfo.frequency = 20.0 * fader_log(self.patch.fader(PatchFader::LfoRate));
        self.synced_lfo.delay_time = 5.0 * fader_log(self.patch.fader(PatchFader::LfoDelay));

        let any_gate = self.voices.iter().any(|v| v.gate);
        self.synced_lfo.update(dt, any_gate);

        // Mirror physical voices onto their virtual source under unison
        let virtual_count = self.virtual_voice_count();
        for i in virtual_count..VOICE_COUNT {
            self.voices[i].note = self.voices[i % virtual_count].note;
            self.voices[i].gate = self.voices[i % virtual_count].gate;
        }

        let pitch_bend = shape_pitch_bend(
            self.settings.get(InstrumentSetting::PitchBend),
            self.pitch_bend_center,
        );
        let mod_wheel =
            shape_mod_wheel(self.settings.get(InstrumentSetting::ModWheel), self.mod_center);

        let synced_level = self.synced_lfo.level();
        let patch = &self.patch;
        let settings = &self.settings;
        for voice in &mut self.voices {
            voice.update(dt, patch, settings, synced_level, pitch_bend, mod_wheel);
        }

        let saw = (self.patch.switch(PatchSwitch::VcoSaw) & 1) as u8;
        let square = (self.patch.switch(PatchSwitch::VcoSquare) & 1) as u8;
        self.mixer = (square * MIXER_SQUARE) | (saw * MIXER_SAW);

        let chorus1 = (self.patch.switch(PatchSwitch::ChorusI) & 1) as u8;
        let chorus2 = (self.patch.switch(PatchSwitch::ChorusII) & 1) as u8;
        self.chorus_mode = (chorus2 * CHORUS_II) | (chorus1 * CHORUS_I);

        self.chorus_lfo_left.frequency = 0.3;
        self.chorus_lfo_right.frequency = 0.3;
        self.chorus_lfo_right.sync_quadrature(&self.chorus_lfo_left);
        self.chorus_lfo_left.update(dt, false);
        self.chorus_lfo_right.update(dt, false);

        // The ensemble stages add level; pad the master gain to compensate
        let mut volume_factor = 1.0;
        if chorus1 != 0 {
            volume_factor *= 0.95;
        }
        if chorus2 != 0 {
            volume_factor *= 0.9;
        }
        self.main_volume =
            volume_factor * (self.settings.get(InstrumentSetting::Volume) as f32 / 1024.0);
    }

    /// Number of independently schedulable note slots under the current
    /// unison divisor.
    pub fn virtual_voice_count(&self) -> usize {
        VOICE_COUNT / self.unison_divisor
    }

    pub fn unison_divisor(&self) -> usize {
        self.unison_divisor
    }

    /// Set the unison divisor, normalized so it evenly divides the pool.
    pub fn set_unison_divisor(&mut self, divisor: usize) {
        let virtual_count = (VOICE_COUNT / divisor.max(1)).max(1);
        self.unison_divisor = VOICE_COUNT / virtual_count;
    }

    fn next_tag(&mut self) -> i32 {
        let tag = self.scheduling_tag_counter;
        self.scheduling_tag_counter += 1;
        tag
    }

    /// Assign a note to a voice, stealing the least recently touched one if
    /// the pool is full.
    pub fn schedule_note_on(&mut self, note: i32, velocity: u8) {
        if velocity == 0 {
            // Running-status convention: velocity 0 is a note off
            self.schedule_note_off(note);
            return;
        }
        let note = match u8::try_from(note) {
            Ok(n) if n <= 127 => n,
            _ => {
                log::debug!("ignoring out-of-range note {}", note);
                return;
            }
        };

        let virtual_count = self.virtual_voice_count();

        for voice in &self.voices[..virtual_count] {
            if voice.gate && voice.note == note {
                return; // duplicate suppression
            }
        }

        // Victim = minimum of the lexicographic key (gate, tag): a free
        // voice always beats a gated one, ties go to the oldest tag.
        let mut oldest = 0;
        let mut oldest_tag = self.voices[0].scheduling_tag;
        let mut oldest_gate = self.voices[0].gate;
        for (i, voice) in self.voices[..virtual_count].iter().enumerate() {
            if (!voice.gate && oldest_gate)
                || (voice.gate == oldest_gate && voice.scheduling_tag < oldest_tag)
            {
                oldest = i;
                oldest_tag = voice.scheduling_tag;
                oldest_gate = voice.gate;
            }
        }

        let tag = self.next_tag();
        let victim = &mut self.voices[oldest];

        if victim.gate {
            // Steal: silence the envelope so the new note attacks cleanly
            victim.env.hard_retrigger();
        }

        victim.note = note;
        victim.velocity = velocity;
        victim.gate = true;
        victim.scheduling_tag = tag;

        log::debug!("scheduled note {} -> voice {}, vel {}", note, oldest, velocity);
    }

    /// Release the virtual voice holding `note`; no-op if none does.
    pub fn schedule_note_off(&mut self, note: i32) {
        let Ok(note) = u8::try_from(note) else {
            return;
        };
        let virtual_count = self.virtual_voice_count();
        for i in 0..virtual_count {
            if self.voices[i].gate && self.voices[i].note == note {
                let tag = self.next_tag();
                self.voices[i].gate = false;
                self.voices[i].scheduling_tag = tag;
                log::debug!("scheduled note {} off, voice {}", note, i);
                return;
            }
        }
    }

    /// Release every gated voice.
    ///
    /// Each cleared voice gets its own fresh tag so recency ordering stays
    /// total across the batch.
    pub fn all_notes_off(&mut self) {
        for i in 0..VOICE_COUNT {
            if self.voices[i].gate {
                let tag = self.next_tag();
                self.voices[i].gate = false;
                self.voices[i].scheduling_tag = tag;
            }
        }
    }

    /// Snapshot the per-tick output for the render sink.
    pub fn render_frame(&self) -> RenderFrame {
        RenderFrame {
            voices: std::array::from_fn(|i| self.voices[i].frame()),
            mixer: self.mixer,
            chorus_mode: self.chorus_mode,
            chorus_left: chorus_depth(self.chorus_lfo_left.level()),
            chorus_right: chorus_depth(self.chorus_lfo_right.level()),
            master_volume: self.main_volume,
        }
    }

    /// Install a stored calibration.
    pub fn apply_tuning(&mut self, record: &TuningRecord) {
        for (i, voice) in self.voices.iter_mut().enumerate() {
            voice.pitch_correction = record.corrections[i][0];
            voice.cutoff_correction = record.corrections[i][1];
        }
        self.pitch_bend_center = record.pitch_bend_center;
        self.mod_center = record.mod_center;
    }

    /// Snapshot the current calibration for persistence.
    pub fn tuning_record(&self) -> TuningRecord {
        let mut record = TuningRecord::default();
        for (i, voice) in self.voices.iter().enumerate() {
            record.corrections[i][0] = voice.pitch_correction;
            record.corrections[i][1] = voice.cutoff_correction;
        }
        record.pitch_bend_center = self.pitch_bend_center;
        record.mod_center = self.mod_center;
        record
    }

    pub fn reset_corrections(&mut self) {
        for voice in &mut self.voices {
            voice.pitch_correction = TuningCorrection::identity();
            voice.cutoff_correction = TuningCorrection::identity();
        }
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn patch_mut(&mut self) -> &mut Patch {
        &mut self.patch
    }

    pub fn settings(&self) -> &InstrumentSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut InstrumentSettings {
        &mut self.settings
    }

    pub fn voice(&self, index: usize) -> &Voice {
        &self.voices[index]
    }

    pub fn voice_mut(&mut self, index: usize) -> &mut Voice {
        &mut self.voices[index]
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn main_volume(&self) -> f32 {
        self.main_volume
    }

    pub fn mixer(&self) -> u8 {
        self.mixer
    }

    pub fn chorus_mode(&self) -> u8 {
        self.chorus_mode
    }
}
