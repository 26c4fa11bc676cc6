//! The player: note sources in, scheduled voices out.
//!
//! Sits between the I/O layer (keybed, MIDI, step timer) and the
//! [`Instrument`]. Owns the performance state machine (normal play,
//! arpeggiator, sequence record/playback), the shared note buffer, the step
//! clock division and keyboard transposition.

pub mod arp;
pub mod clock;
pub mod keys;
pub mod note_buffer;

use crate::io::midi::{MidiEvent, MidiOut, CC_ALL_NOTES_OFF, CC_RESET_CLOCK};
use crate::player::arp::{lapped_note, range_multiplier, ArpCursor, ArpMode};
use crate::player::clock::{internal_step_seconds, midi_divider_from_rate, INTERNAL_DIVIDER};
use crate::player::keys::NUM_KEYS;
use crate::player::note_buffer::{NoteBuffer, NOTE_BUFFER_MAX, REST};
use crate::runtime::timer::StepTimer;
use crate::synth::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Normal,
    Arp,
    SeqRecording,
    SeqPlaying,
}

/// Whether clock pulses advance the arp/sequencer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongMode {
    Playing,
    Paused,
}

/// Performance settings routed from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSetting {
    /// Latch the arp buffer across key releases.
    Holding,
    /// Next note-on sets the transposition instead of sounding.
    Transposing,
    /// 1 = MIDI clock is the step source, 0 = internal timer.
    MidiClock,
    /// Rate fader, 0..=1023.
    Rate,
    ArpMode,
    ArpRange,
    /// Keybed octave shift, -2..=2.
    OctaveOffset,
}

impl PlayerSetting {
    pub const COUNT: usize = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerSettings([i16; PlayerSetting::COUNT]);

impl PlayerSettings {
    pub fn get(&self, setting: PlayerSetting) -> i16 {
        self.0[setting as usize]
    }

    pub fn set(&mut self, setting: PlayerSetting, value: i16) {
        self.0[setting as usize] = value;
    }

    pub fn toggle(&mut self, setting: PlayerSetting) {
        let flipped = if self.get(setting) != 0 { 0 } else { 1 };
        self.set(setting, flipped);
    }
}

pub struct Player {
    instrument: Instrument,

    state: PlayerState,
    settings: PlayerSettings,
    song_mode: SongMode,

    /// MIDI channel filter: 0 = omni, 1..=16 specific.
    midi_channel: u8,
    keyboard_transposition: i32,

    // Shared by arpeggiator and sequencer
    buffer: NoteBuffer,
    sequence_length: usize,
    cursor: ArpCursor,

    /// Each step splits into a note-on half and a note-off half, giving
    /// played notes a ~50% duty gate.
    note_up_step: bool,
    ticks_since_step: u32,
    last_step_note: i32,

    held_keys: [bool; NUM_KEYS],
}

impl Player {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            state: PlayerState::Normal,
            settings: PlayerSettings::default(),
            song_mode: SongMode::Playing,
            midi_channel: 0,
            keyboard_transposition: 0,
            buffer: NoteBuffer::new(),
            sequence_length: 0,
            cursor: ArpCursor::new(),
            note_up_step: false,
            ticks_since_step: 0,
            last_step_note: 0,
            held_keys: [false; NUM_KEYS],
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument {
        &mut self.instrument
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn song_mode(&self) -> SongMode {
        self.song_mode
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PlayerSettings {
        &mut self.settings
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn keyboard_transposition(&self) -> i32 {
        self.keyboard_transposition
    }

    pub fn note_buffer(&self) -> &NoteBuffer {
        &self.buffer
    }

    /// Refresh the internal step timer period from the rate fader. Called
    /// once per main-loop tick.
    pub fn update(&mut self, timer: &StepTimer) {
        let step_seconds = internal_step_seconds(self.settings.get(PlayerSetting::Rate));
        timer.set_interval_micros((1_000_000.0 * step_seconds) as u32);
    }

    /// Keybed key index to MIDI note under the octave offset.
    pub fn key_to_note(&self, key: u8) -> i32 {
        key as i32 + 12 * (2 + self.settings.get(PlayerSetting::OctaveOffset) as i32)
    }

    // ---- state machine -------------------------------------------------

    fn set_state(&mut self, next: PlayerState) {
        self.state = next;
        self.instrument.all_notes_off();
        self.settings.set(PlayerSetting::Transposing, 0);
    }

    pub fn set_state_normal(&mut self) {
        self.set_state(PlayerState::Normal);
    }

    pub fn set_state_arp(&mut self) {
        self.set_state(PlayerState::Arp);
        self.buffer.clear();
    }

    /// Start recording a sequence of `length` steps. Invalid lengths are
    /// rejected with a warning and leave the player untouched.
    pub fn set_state_seq_recording(&mut self, length: usize) {
        if length == 0 {
            log::warn!("invalid sequence length 0");
            return;
        }
        if length >= NOTE_BUFFER_MAX {
            log::warn!("sequence length {} exceeds note buffer", length);
            return;
        }
        self.set_state(PlayerState::SeqRecording);
        self.sequence_length = length;
        self.buffer.clear();
    }

    /// Record a rest step.
    pub fn push_rest(&mut self) {
        if self.state == PlayerState::SeqRecording {
            self.push_sequencer_note(REST);
        }
    }

    fn push_sequencer_note(&mut self, note: i16) {
        if self.state != PlayerState::SeqRecording {
            log::warn!("sequencer not recording");
            return;
        }
        if self.buffer.len() >= self.sequence_length {
            log::warn!("sequence already full");
            return;
        }
        self.buffer.push(note);

        if self.buffer.len() >= self.sequence_length {
            self.set_state(PlayerState::SeqPlaying);
        }
    }

    // ---- note intake ---------------------------------------------------

    /// Key pressed on the local keybed.
    pub fn on_key_down(&mut self, key: u8, velocity: u8, midi: &mut dyn MidiOut) {
        if (key as usize) < NUM_KEYS {
            self.held_keys[key as usize] = true;
        }
        let note = self.key_to_note(key);
        self.handle_note_on(note, velocity, false, midi);
    }

    /// Key released on the local keybed.
    pub fn on_key_up(&mut self, key: u8, midi: &mut dyn MidiOut) {
        if (key as usize) < NUM_KEYS {
            self.held_keys[key as usize] = false;
        }
        let note = self.key_to_note(key);
        self.handle_note_off(note, 0, false, midi);
    }

    pub fn handle_note_on(
        &mut self,
        note: i32,
        velocity: u8,
        from_midi: bool,
        midi: &mut dyn MidiOut,
    ) {
        if self.settings.get(PlayerSetting::Transposing) != 0 {
            self.set_transposition(note);
            return;
        }
        // Playing a note normally drops any active transposition
        self.keyboard_transposition = 0;

        if self.state == PlayerState::Arp {
            self.update_arp_sequence();
        } else {
            self.instrument.schedule_note_on(note, velocity);

            if self.state == PlayerState::SeqRecording {
                self.push_sequencer_note(note as i16);
            } else if self.state == PlayerState::Normal && !from_midi {
                if let Ok(note) = u8::try_from(note) {
                    midi.send_note_on(note, velocity, self.midi_channel);
                }
            }
        }
    }

    pub fn handle_note_off(
        &mut self,
        note: i32,
        velocity: u8,
        from_midi: bool,
        midi: &mut dyn MidiOut,
    ) {
        if self.settings.get(PlayerSetting::Transposing) != 0 {
            return;
        }

        if self.state == PlayerState::Arp {
            if self.settings.get(PlayerSetting::Holding) == 0 {
                self.update_arp_sequence();
            }
        } else {
            self.instrument.schedule_note_off(note);

            if self.state == PlayerState::Normal && !from_midi {
                if let Ok(note) = u8::try_from(note) {
                    midi.send_note_off(note, velocity, self.midi_channel);
                }
            }
        }
    }

    /// Rebuild the arp buffer from the currently held keys, ascending.
    pub fn update_arp_sequence(&mut self) {
        self.buffer.clear();
        for key in 0..NUM_KEYS {
            if self.held_keys[key] {
                let note = self.key_to_note(key as u8);
                if !self.buffer.push(note as i16) {
                    break; // too many notes
                }
            }
        }
        self.buffer.sort_ascending();
    }

    /// Capture the transposition so the lowest buffered note replays as
    /// `note`.
    fn set_transposition(&mut self, note: i32) {
        let Some(lowest) = self.buffer.lowest() else {
            log::debug!("note buffer empty, transposition unchanged");
            return;
        };
        self.keyboard_transposition = note - lowest as i32;
        log::debug!("transposing by {}", self.keyboard_transposition);
    }

    // ---- clocking ------------------------------------------------------

    /// One pulse from either clock source. Pulses from the non-selected
    /// source are ignored; internal pulses are forwarded as MIDI clock.
    pub fn clock_tick(&mut self, from_midi: bool, midi: &mut dyn MidiOut) {
        if self.state != PlayerState::Arp && self.state != PlayerState::SeqPlaying {
            return;
        }
        if self.song_mode == SongMode::Paused {
            return;
        }
        let use_midi_clock = self.settings.get(PlayerSetting::MidiClock) != 0;
        if from_midi != use_midi_clock {
            return;
        }
        if !from_midi {
            midi.send_clock();
        }

        let divider = if use_midi_clock {
            midi_divider_from_rate(self.settings.get(PlayerSetting::Rate))
        } else {
            // The internal timer period already follows the rate fader
            INTERNAL_DIVIDER
        };

        self.ticks_since_step += 1;
        if self.ticks_since_step >= divider {
            self.ticks_since_step = 0;
            self.step();
        }
    }

    /// One sequencer step: the off half releases the previous note, the on
    /// half sounds the next one.
    fn step(&mut self) {
        if self.note_up_step {
            self.instrument.schedule_note_off(self.last_step_note);
        } else {
            if self.state == PlayerState::Arp && !self.buffer.is_empty() {
                let mode = ArpMode::from_setting(self.settings.get(PlayerSetting::ArpMode));
                let multiplier = range_multiplier(self.settings.get(PlayerSetting::ArpRange));

                let slot = self.cursor.step(mode, self.buffer.len(), multiplier);
                let buffered = self.buffer.get(slot % self.buffer.len());
                let note =
                    lapped_note(buffered, slot, self.buffer.len()) + self.keyboard_transposition;

                self.instrument.schedule_note_on(note, 127);
                self.last_step_note = note;
            }

            if self.state == PlayerState::SeqPlaying && !self.buffer.is_empty() {
                let slot = self.cursor.seq_step(self.buffer.len());
                if self.buffer.get(slot) >= 0 {
                    let note = self.buffer.get(slot) as i32 + self.keyboard_transposition;
                    self.instrument.schedule_note_on(note, 127);
                    self.last_step_note = note;
                }
            }
        }

        self.note_up_step = !self.note_up_step;
    }

    /// Zero all stepping state: tick counter, cursor, duty phase.
    pub fn reset_clock_progress(&mut self) {
        self.instrument.all_notes_off();
        self.ticks_since_step = 0;
        self.note_up_step = false;
        self.cursor.reset();
    }

    pub fn set_song_mode(&mut self, mode: SongMode) {
        self.song_mode = mode;
    }

    // ---- MIDI ----------------------------------------------------------

    /// Select or deselect a specific receive channel; selecting the current
    /// one falls back to omni.
    pub fn toggle_midi_channel(&mut self, channel: u8) {
        self.midi_channel = if self.midi_channel == channel {
            0
        } else {
            channel
        };
    }

    fn accepts_channel(&self, channel: u8) -> bool {
        self.midi_channel == 0 || self.midi_channel == channel
    }

    /// Dispatch one decoded MIDI message. Channel numbers are 1..=16 as
    /// delivered by the transport driver.
    pub fn handle_midi(&mut self, event: MidiEvent, midi: &mut dyn MidiOut) {
        match event {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => {
                if self.accepts_channel(channel) {
                    self.handle_note_on(key as i32, velocity, true, midi);
                }
            }
            MidiEvent::NoteOff { channel, key, .. } => {
                if self.accepts_channel(channel) {
                    self.handle_note_off(key as i32, 0, true, midi);
                }
            }
            MidiEvent::ControlChange {
                channel, controller, ..
            } => {
                if self.accepts_channel(channel) {
                    match controller {
                        CC_ALL_NOTES_OFF => self.instrument.all_notes_off(),
                        CC_RESET_CLOCK => self.reset_clock_progress(),
                        _ => {}
                    }
                }
            }
            MidiEvent::Clock => self.clock_tick(true, midi),
            MidiEvent::Start => {
                self.reset_clock_progress();
                self.set_song_mode(SongMode::Playing);
            }
            MidiEvent::Stop => {
                self.set_song_mode(SongMode::Paused);
                self.instrument.all_notes_off();
            }
            MidiEvent::Continue => {
                self.set_song_mode(SongMode::Playing);
            }
        }
    }
}
