//! Arpeggiator cursor: position and direction over the lapped note buffer.
//!
//! The cursor walks `buffer_len * multiplier` slots, where each lap through
//! the buffer transposes up an octave. Keeping the cursor math separate from
//! the player makes the wrap/bounce edge cases independently testable.

/// Traversal order over the held notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpMode {
    Up,
    UpDown,
    Down,
}

impl ArpMode {
    /// Decode the 3-position panel switch.
    pub fn from_setting(value: i16) -> Self {
        match value {
            1 => ArpMode::UpDown,
            2 => ArpMode::Down,
            _ => ArpMode::Up,
        }
    }
}

/// Octave laps for the 3-position range switch (1, 2 or 3 octaves).
pub fn range_multiplier(range_setting: i16) -> i32 {
    match range_setting {
        1 => 2,
        2 => 3,
        _ => 1,
    }
}

#[derive(Debug, Clone)]
pub struct ArpCursor {
    position: i32,
    downwards: bool,
}

impl Default for ArpCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArpCursor {
    pub fn new() -> Self {
        Self {
            position: -1,
            downwards: false,
        }
    }

    /// Park the cursor before the first slot.
    pub fn reset(&mut self) {
        self.position = -1;
        self.downwards = false;
    }

    /// Select the slot for this step and advance for the next one.
    ///
    /// Out-of-range positions (fresh cursor, buffer shrunk, mode changed)
    /// re-enter at the mode's natural end. UpDown clamps one slot inside the
    /// boundary on the turn so the extreme note never sounds twice in a row.
    pub fn step(&mut self, mode: ArpMode, buffer_len: usize, multiplier: i32) -> usize {
        let arp_end = buffer_len as i32 * multiplier;
        let is_below = self.position < 0;
        let is_above = self.position >= arp_end;

        match mode {
            ArpMode::Up => {
                self.downwards = false; // seamless if mode switched mid-run
                if is_below || is_above {
                    self.position = 0;
                }
            }
            ArpMode::UpDown => {
                if is_below {
                    self.downwards = false;
                    self.position = arp_end.min(1);
                }
                if is_above {
                    self.downwards = true;
                    self.position = (arp_end - 2).max(0);
                }
            }
            ArpMode::Down => {
                self.downwards = true;
                if is_below || is_above {
                    self.position = arp_end - 1;
                }
            }
        }

        let selected = self.position;
        self.position += if self.downwards { -1 } else { 1 };
        selected as usize
    }

    /// Sequencer advance over the same position state: plain wrap, no
    /// lapping, no direction. Out-of-range (fresh cursor, buffer changed)
    /// restarts at slot 0.
    pub fn seq_step(&mut self, buffer_len: usize) -> usize {
        let len = buffer_len as i32;
        if self.position < 0 || self.position >= len {
            self.position = 0;
        } else {
            self.position = (self.position + 1) % len;
        }
        self.position as usize
    }
}

/// Note sounded for a slot index: buffer entry plus one octave per lap.
pub fn lapped_note(buffer_note: i16, slot: usize, buffer_len: usize) -> i32 {
    buffer_note as i32 + 12 * (slot / buffer_len) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cursor: &mut ArpCursor, mode: ArpMode, len: usize, mult: i32, steps: usize) -> Vec<usize> {
        (0..steps).map(|_| cursor.step(mode, len, mult)).collect()
    }

    #[test]
    fn up_walks_and_wraps() {
        let mut cursor = ArpCursor::new();
        let slots = run(&mut cursor, ArpMode::Up, 3, 2, 8);
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5, 0, 1]);
    }

    #[test]
    fn up_with_octave_lapping_transposes() {
        // Buffer [60, 64, 67], range x2: two octave laps
        let buffer = [60i16, 64, 67];
        let mut cursor = ArpCursor::new();
        let notes: Vec<i32> = (0..6)
            .map(|_| {
                let slot = cursor.step(ArpMode::Up, 3, 2);
                lapped_note(buffer[slot % 3], slot, 3)
            })
            .collect();
        assert_eq!(notes, vec![60, 64, 67, 72, 76, 79]);

        // and wraps back to the root
        let slot = cursor.step(ArpMode::Up, 3, 2);
        assert_eq!(lapped_note(buffer[slot % 3], slot, 3), 60);
    }

    #[test]
    fn down_walks_from_the_top() {
        let mut cursor = ArpCursor::new();
        let slots = run(&mut cursor, ArpMode::Down, 3, 1, 5);
        assert_eq!(slots, vec![2, 1, 0, 2, 1]);
    }

    #[test]
    fn updown_bounces_without_repeating_boundaries() {
        let mut cursor = ArpCursor::new();
        let slots = run(&mut cursor, ArpMode::UpDown, 3, 1, 9);
        // 1,2 then bounce down 1,0 then bounce up again - ends never double
        assert_eq!(slots, vec![1, 2, 1, 0, 1, 2, 1, 0, 1]);
        for pair in slots.windows(2) {
            assert_ne!(pair[0], pair[1], "boundary slot repeated");
        }
    }

    #[test]
    fn single_note_buffer_just_repeats() {
        let mut cursor = ArpCursor::new();
        let slots = run(&mut cursor, ArpMode::Up, 1, 1, 4);
        assert_eq!(slots, vec![0, 0, 0, 0]);
    }

    #[test]
    fn shrinking_buffer_recovers() {
        let mut cursor = ArpCursor::new();
        run(&mut cursor, ArpMode::Up, 4, 2, 7); // position sits at 7
        let slot = cursor.step(ArpMode::Up, 2, 1); // buffer shrank under it
        assert_eq!(slot, 0);
    }

    #[test]
    fn seq_step_wraps_without_lapping() {
        let mut cursor = ArpCursor::new();
        let slots: Vec<usize> = (0..7).map(|_| cursor.seq_step(3)).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn seq_step_recovers_from_stale_position() {
        let mut cursor = ArpCursor::new();
        run(&mut cursor, ArpMode::Up, 4, 3, 10); // arp left position at 10
        assert_eq!(cursor.seq_step(3), 0);
        assert_eq!(cursor.seq_step(3), 1);
    }

    #[test]
    fn mode_switch_mid_run_is_seamless() {
        let mut cursor = ArpCursor::new();
        run(&mut cursor, ArpMode::Down, 4, 1, 2); // played 3, 2; heading down
        let slot = cursor.step(ArpMode::Up, 4, 1);
        // Up flips the direction and continues from where the cursor sits
        assert_eq!(slot, 1);
        let slot = cursor.step(ArpMode::Up, 4, 1);
        assert_eq!(slot, 2);
    }
}
