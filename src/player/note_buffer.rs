//! Shared note storage for the arpeggiator and the step sequencer.
//!
//! The arpeggiator rebuilds the buffer from the held-key set on every key
//! event (recomputation can never drift out of sync with the keybed the way
//! incremental add/remove could). The sequencer appends during recording and
//! then treats the contents as fixed.

/// Maximum notes in a buffer; also bounds the recordable sequence length.
pub const NOTE_BUFFER_MAX: usize = 256;

/// Rest sentinel: a step that advances time without sounding a note.
pub const REST: i16 = -1;

#[derive(Debug, Clone)]
pub struct NoteBuffer {
    notes: [i16; NOTE_BUFFER_MAX],
    len: usize,
}

impl Default for NoteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self {
            notes: [0; NOTE_BUFFER_MAX],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a note (or [`REST`]). A full buffer drops the note with a
    /// warning; the player treats that as a non-fatal invalid request.
    pub fn push(&mut self, note: i16) -> bool {
        if self.len >= NOTE_BUFFER_MAX {
            log::warn!("note buffer full, dropping note {}", note);
            return false;
        }
        self.notes[self.len] = note;
        self.len += 1;
        true
    }

    pub fn get(&self, index: usize) -> i16 {
        self.notes[index]
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.notes[..self.len]
    }

    pub fn sort_ascending(&mut self) {
        self.notes[..self.len].sort_unstable();
    }

    /// Lowest real note, ignoring rests. `None` when nothing is buffered.
    pub fn lowest(&self) -> Option<i16> {
        self.as_slice().iter().copied().filter(|&n| n >= 0).min()
    }
}
