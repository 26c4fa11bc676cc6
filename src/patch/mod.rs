//! Patch data model: the currently edited sound.
//!
//! A patch is the raw front-panel image - fader positions and switch
//! positions - not derived synthesis parameters. Interpretation (response
//! curves, ranges) happens at voice-update time so that edits, program loads
//! and MIDI all mutate the same representation.

pub mod curve;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Continuous panel controls stored in a patch, in record order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFader {
    LfoRate,
    LfoDelay,
    Vibrato,
    PulseWidth,
    SubOscillator,
    Cutoff,
    Resonance,
    FilterEnvelope,
    FilterLfo,
    FilterKeytrack,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl PatchFader {
    pub const COUNT: usize = 14;

    /// All faders in record order; `ALL[f as usize] == f`.
    pub const ALL: [PatchFader; Self::COUNT] = [
        PatchFader::LfoRate,
        PatchFader::LfoDelay,
        PatchFader::Vibrato,
        PatchFader::PulseWidth,
        PatchFader::SubOscillator,
        PatchFader::Cutoff,
        PatchFader::Resonance,
        PatchFader::FilterEnvelope,
        PatchFader::FilterLfo,
        PatchFader::FilterKeytrack,
        PatchFader::Attack,
        PatchFader::Decay,
        PatchFader::Sustain,
        PatchFader::Release,
    ];

    /// Panel label.
    pub fn name(self) -> &'static str {
        match self {
            PatchFader::LfoRate => "LFO RATE",
            PatchFader::LfoDelay => "LFO DELAY",
            PatchFader::Vibrato => "VIBRATO",
            PatchFader::PulseWidth => "PULSE WIDTH",
            PatchFader::SubOscillator => "SUB OSC",
            PatchFader::Cutoff => "CUTOFF",
            PatchFader::Resonance => "RESONANCE",
            PatchFader::FilterEnvelope => "FILTER ENV",
            PatchFader::FilterLfo => "FILTER LFO",
            PatchFader::FilterKeytrack => "KEYTRACK",
            PatchFader::Attack => "ATTACK",
            PatchFader::Decay => "DECAY",
            PatchFader::Sustain => "SUSTAIN",
            PatchFader::Release => "RELEASE",
        }
    }
}

/// Switched panel controls stored in a patch, in record order.
///
/// Values are 0..n-1 for an n-position switch; most are two-position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSwitch {
    /// VCA contour source: 0 = envelope, 1 = gate (organ shape).
    AmpShape,
    /// Pulse width modulation source: 0 = envelope, 1 = LFO, 2 = manual.
    PwmSource,
    /// 1 = all voices share the instrument-global LFO.
    LfoSync,
    VcoSquare,
    VcoSaw,
    ChorusI,
    ChorusII,
}

impl PatchSwitch {
    pub const COUNT: usize = 7;
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Fader positions, 0..=1023.
    pub faders: [i16; PatchFader::COUNT],
    /// Switch positions, 0..n-1 per switch.
    pub switches: [i8; PatchSwitch::COUNT],
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            faders: [0; PatchFader::COUNT],
            switches: [0; PatchSwitch::COUNT],
        }
    }
}

impl Patch {
    pub fn fader(&self, fader: PatchFader) -> i16 {
        self.faders[fader as usize]
    }

    pub fn set_fader(&mut self, fader: PatchFader, value: i16) {
        self.faders[fader as usize] = value.clamp(0, 1023);
    }

    pub fn switch(&self, switch: PatchSwitch) -> i8 {
        self.switches[switch as usize]
    }

    pub fn set_switch(&mut self, switch: PatchSwitch, value: i8) {
        self.switches[switch as usize] = value;
    }

    pub fn switch_on(&self, switch: PatchSwitch) -> bool {
        self.switch(switch) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fader_access_clamps_to_panel_range() {
        let mut patch = Patch::default();
        patch.set_fader(PatchFader::Cutoff, 2000);
        assert_eq!(patch.fader(PatchFader::Cutoff), 1023);
        patch.set_fader(PatchFader::Cutoff, -5);
        assert_eq!(patch.fader(PatchFader::Cutoff), 0);
    }

    #[test]
    fn switches_report_on_state() {
        let mut patch = Patch::default();
        assert!(!patch.switch_on(PatchSwitch::VcoSaw));
        patch.set_switch(PatchSwitch::VcoSaw, 1);
        assert!(patch.switch_on(PatchSwitch::VcoSaw));
    }
}
