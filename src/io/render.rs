//! Per-tick output handed to the DAC/SPI writer.
//!
//! The core renders control values; byte packing, channel mapping and bus
//! transactions belong to the driver behind [`RenderSink`].

use crate::VOICE_COUNT;

/// Oscillator mix enable bits.
pub const MIXER_SAW: u8 = 1 << 0;
pub const MIXER_SQUARE: u8 = 1 << 1;

/// Chorus mode bits (ensemble I / II; both = mode III).
pub const CHORUS_I: u8 = 1 << 0;
pub const CHORUS_II: u8 = 1 << 1;

/// Rendered control values for one physical voice. Pitch and cutoff are in
/// semitones with the tuning correction already applied; the rest are
/// normalized 0.0..1.0 levels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoiceFrame {
    pub pitch: f32,
    pub cutoff: f32,
    pub pulse: f32,
    pub sub: f32,
    pub resonance: f32,
    pub amp: f32,
}

/// Everything the analog side needs for one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame {
    pub voices: [VoiceFrame; VOICE_COUNT],
    pub mixer: u8,
    pub chorus_mode: u8,
    /// Chorus modulation depths, 0.0..1.0, quadrature pair.
    pub chorus_left: f32,
    pub chorus_right: f32,
    pub master_volume: f32,
}

impl Default for RenderFrame {
    fn default() -> Self {
        Self {
            voices: [VoiceFrame::default(); VOICE_COUNT],
            mixer: 0,
            chorus_mode: 0,
            chorus_left: 0.0,
            chorus_right: 0.0,
            master_volume: 0.0,
        }
    }
}

/// Transport to the analog hardware, called once per control tick.
pub trait RenderSink {
    fn write(&mut self, frame: &RenderFrame);
}

/// Keeps the most recent frame; for tests and the panel simulator.
#[derive(Debug, Default)]
pub struct FrameCapture {
    pub last: Option<RenderFrame>,
    pub frames_written: u64,
}

impl RenderSink for FrameCapture {
    fn write(&mut self, frame: &RenderFrame) {
        self.last = Some(*frame);
        self.frames_written += 1;
    }
}
