/// MIDI messages this core consumes, as decoded by the transport driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Realtime clock pulse, 24 per quarter note.
    Clock,
    Start,
    Stop,
    Continue,
}

impl MidiEvent {
    /// Channel the message is addressed to, if it carries one.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

/// All-notes-off channel mode message.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Vendor-specific "reset clock progress" controller.
pub const CC_RESET_CLOCK: u8 = 250;

/// Outgoing MIDI: local keybed echo and clock forwarding.
///
/// Implemented by the transport driver; the core never formats bytes.
pub trait MidiOut {
    fn send_note_on(&mut self, note: u8, velocity: u8, channel: u8);
    fn send_note_off(&mut self, note: u8, velocity: u8, channel: u8);
    fn send_clock(&mut self);
}

/// Discards everything; for tests and MIDI-less setups.
#[derive(Debug, Default)]
pub struct NullMidiOut;

impl MidiOut for NullMidiOut {
    fn send_note_on(&mut self, _note: u8, _velocity: u8, _channel: u8) {}
    fn send_note_off(&mut self, _note: u8, _velocity: u8, _channel: u8) {}
    fn send_clock(&mut self) {}
}
