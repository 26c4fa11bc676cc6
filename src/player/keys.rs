//! Dual-contact keybed state tracking.
//!
//! Each key closes a "travelling" contact early in its throw and a "pressed"
//! contact at the bottom; velocity is derived from the time between the two.
//! The matrix scanner reports raw per-key contact states, this tracker turns
//! them into note events.

/// Keys on the keybed (five octaves).
pub const NUM_KEYS: usize = 61;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Open,
    /// First contact closed, key in flight.
    Travelling,
    /// Second contact closed, key at the bottom.
    Pressed,
}

/// Note event derived from a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    KeyDown { key: u8, velocity: u8 },
    KeyUp { key: u8 },
}

/// Velocity from contact travel time: faster strike, higher velocity.
pub fn velocity_from_travel(travel_ms: u32) -> u8 {
    (1000 / travel_ms.max(1)).min(127) as u8
}

#[derive(Debug, Clone, Copy, Default)]
struct KeySlot {
    state: KeyState,
    travel_start_ms: u32,
}

#[derive(Debug)]
pub struct KeyTracker {
    keys: [KeySlot; NUM_KEYS],
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTracker {
    pub fn new() -> Self {
        Self {
            keys: [KeySlot::default(); NUM_KEYS],
        }
    }

    /// Feed one observed contact state for `key`; returns the note event it
    /// implies, if any. `now_ms` comes from the wrapping millisecond counter.
    pub fn update(&mut self, key: usize, observed: KeyState, now_ms: u32) -> Option<KeyAction> {
        if key >= NUM_KEYS {
            return None;
        }
        let slot = &mut self.keys[key];

        match observed {
            KeyState::Open => {
                let was_pressed = slot.state == KeyState::Pressed;
                slot.state = KeyState::Open;
                was_pressed.then_some(KeyAction::KeyUp { key: key as u8 })
            }
            KeyState::Travelling => {
                if slot.state == KeyState::Open {
                    slot.state = KeyState::Travelling;
                    slot.travel_start_ms = now_ms;
                }
                None
            }
            KeyState::Pressed => match slot.state {
                KeyState::Travelling => {
                    slot.state = KeyState::Pressed;
                    let travel = now_ms.wrapping_sub(slot.travel_start_ms);
                    Some(KeyAction::KeyDown {
                        key: key as u8,
                        velocity: velocity_from_travel(travel),
                    })
                }
                KeyState::Open => {
                    // Scan never saw the travelling phase: full velocity
                    slot.state = KeyState::Pressed;
                    Some(KeyAction::KeyDown {
                        key: key as u8,
                        velocity: 127,
                    })
                }
                KeyState::Pressed => None,
            },
        }
    }

    pub fn is_pressed(&self, key: usize) -> bool {
        self.keys[key].state == KeyState::Pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_strike_is_loud_slow_strike_is_quiet() {
        assert_eq!(velocity_from_travel(5), 127); // capped
        assert_eq!(velocity_from_travel(10), 100);
        assert_eq!(velocity_from_travel(100), 10);
        assert_eq!(velocity_from_travel(0), 127); // degenerate scan, full on
    }

    #[test]
    fn travel_time_sets_velocity() {
        let mut tracker = KeyTracker::new();
        assert_eq!(tracker.update(10, KeyState::Travelling, 1_000), None);
        let action = tracker.update(10, KeyState::Pressed, 1_020);
        assert_eq!(
            action,
            Some(KeyAction::KeyDown {
                key: 10,
                velocity: 50
            })
        );
    }

    #[test]
    fn direct_press_sounds_at_full_velocity() {
        let mut tracker = KeyTracker::new();
        let action = tracker.update(5, KeyState::Pressed, 0);
        assert_eq!(
            action,
            Some(KeyAction::KeyDown {
                key: 5,
                velocity: 127
            })
        );
    }

    #[test]
    fn release_only_fires_after_a_full_press() {
        let mut tracker = KeyTracker::new();
        tracker.update(7, KeyState::Travelling, 0);
        // Key let go before bottoming out: no note ever sounded
        assert_eq!(tracker.update(7, KeyState::Open, 30), None);

        tracker.update(7, KeyState::Pressed, 100);
        assert_eq!(
            tracker.update(7, KeyState::Open, 400),
            Some(KeyAction::KeyUp { key: 7 })
        );
    }

    #[test]
    fn held_key_reports_once() {
        let mut tracker = KeyTracker::new();
        assert!(tracker.update(3, KeyState::Pressed, 0).is_some());
        assert!(tracker.update(3, KeyState::Pressed, 10).is_none());
        assert!(tracker.is_pressed(3));
    }

    #[test]
    fn travel_across_millis_rollover() {
        let mut tracker = KeyTracker::new();
        tracker.update(2, KeyState::Travelling, u32::MAX - 5);
        let action = tracker.update(2, KeyState::Pressed, 14);
        assert_eq!(
            action,
            Some(KeyAction::KeyDown {
                key: 2,
                velocity: 50
            })
        );
    }
}
