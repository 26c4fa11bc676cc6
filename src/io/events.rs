//! Event intake from the I/O drivers into the control loop.
//!
//! Drivers (keybed scanner, MIDI transport, the internal step timer) never
//! call into the core directly - they hold an [`EventSink`] and the core
//! drains the matching [`EventReceiver`] once per tick. With the `rtrb`
//! feature the sink/receiver pair is a wait-free SPSC ring buffer, safe to
//! feed from an interrupt context.

#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer, RingBuffer};

use crate::io::midi::MidiEvent;

/// One input event, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Key pressed; velocity already derived from contact travel time.
    KeyDown { key: u8, velocity: u8 },
    KeyUp { key: u8 },
    Midi(MidiEvent),
    /// Pulse from the internal step timer.
    ClockPulse,
}

/// Capability handed to I/O drivers for delivering events to the core.
pub trait EventSink {
    fn on_key_down(&mut self, key: u8, velocity: u8);
    fn on_key_up(&mut self, key: u8);
    fn on_midi(&mut self, event: MidiEvent);
    fn on_clock_pulse(&mut self);
}

/// Consumer side drained by the control loop.
pub trait EventReceiver {
    fn pop_event(&mut self) -> Option<ControlEvent>;
}

#[cfg(feature = "rtrb")]
impl EventReceiver for Consumer<ControlEvent> {
    fn pop_event(&mut self) -> Option<ControlEvent> {
        self.pop().ok()
    }
}

impl EventReceiver for std::collections::VecDeque<ControlEvent> {
    fn pop_event(&mut self) -> Option<ControlEvent> {
        self.pop_front()
    }
}

/// Ring-buffer backed [`EventSink`]. Overflow drops the event with a warning
/// rather than blocking - a stalled consumer must not wedge an interrupt.
#[cfg(feature = "rtrb")]
pub struct QueueSink {
    tx: Producer<ControlEvent>,
}

#[cfg(feature = "rtrb")]
impl QueueSink {
    fn push(&mut self, event: ControlEvent) {
        if self.tx.push(event).is_err() {
            log::warn!("event queue full, dropping {:?}", event);
        }
    }
}

#[cfg(feature = "rtrb")]
impl EventSink for QueueSink {
    fn on_key_down(&mut self, key: u8, velocity: u8) {
        self.push(ControlEvent::KeyDown { key, velocity });
    }

    fn on_key_up(&mut self, key: u8) {
        self.push(ControlEvent::KeyUp { key });
    }

    fn on_midi(&mut self, event: MidiEvent) {
        self.push(ControlEvent::Midi(event));
    }

    fn on_clock_pulse(&mut self) {
        self.push(ControlEvent::ClockPulse);
    }
}

/// Create a connected sink/receiver pair with the given capacity.
#[cfg(feature = "rtrb")]
pub fn event_queue(capacity: usize) -> (QueueSink, Consumer<ControlEvent>) {
    let (tx, rx) = RingBuffer::new(capacity);
    (QueueSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "rtrb")]
    #[test]
    fn queue_preserves_arrival_order() {
        let (mut sink, mut rx) = event_queue(8);
        sink.on_key_down(12, 100);
        sink.on_clock_pulse();
        sink.on_key_up(12);

        assert_eq!(
            rx.pop_event(),
            Some(ControlEvent::KeyDown {
                key: 12,
                velocity: 100
            })
        );
        assert_eq!(rx.pop_event(), Some(ControlEvent::ClockPulse));
        assert_eq!(rx.pop_event(), Some(ControlEvent::KeyUp { key: 12 }));
        assert_eq!(rx.pop_event(), None);
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn overflow_drops_instead_of_blocking() {
        let (mut sink, mut rx) = event_queue(2);
        sink.on_clock_pulse();
        sink.on_clock_pulse();
        sink.on_clock_pulse(); // dropped

        assert_eq!(rx.pop_event(), Some(ControlEvent::ClockPulse));
        assert_eq!(rx.pop_event(), Some(ControlEvent::ClockPulse));
        assert_eq!(rx.pop_event(), None);
    }

    #[test]
    fn vecdeque_receiver_works_without_rtrb() {
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(ControlEvent::KeyUp { key: 3 });
        assert_eq!(queue.pop_event(), Some(ControlEvent::KeyUp { key: 3 }));
        assert_eq!(queue.pop_event(), None);
    }
}
