//! Cooperative main-loop glue.
//!
//! One [`ControlCore::tick`] call per loop iteration: measure `dt`, drain
//! the event queue in arrival order, advance the player and instrument, and
//! hand one frame to the render sink. The embedding (firmware main loop,
//! simulator, tests) owns the collaborators and passes them in per call -
//! nothing here is global.

pub mod timer;

use std::sync::Arc;

use crate::io::events::{ControlEvent, EventReceiver};
use crate::io::midi::MidiOut;
use crate::io::render::RenderSink;
use crate::io::time::DeltaTimer;
use crate::player::Player;
use crate::runtime::timer::StepTimer;
use crate::synth::Instrument;

pub struct ControlCore {
    player: Player,
    step_timer: Arc<StepTimer>,
    delta: DeltaTimer,
}

impl ControlCore {
    pub fn new(instrument: Instrument, step_timer: Arc<StepTimer>, now_micros: u32) -> Self {
        Self {
            player: Player::new(instrument),
            step_timer,
            delta: DeltaTimer::new(now_micros),
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn instrument(&self) -> &Instrument {
        self.player.instrument()
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument {
        self.player.instrument_mut()
    }

    pub fn step_timer(&self) -> &Arc<StepTimer> {
        &self.step_timer
    }

    /// Apply one queued event.
    pub fn dispatch(&mut self, event: ControlEvent, midi: &mut dyn MidiOut) {
        match event {
            ControlEvent::KeyDown { key, velocity } => self.player.on_key_down(key, velocity, midi),
            ControlEvent::KeyUp { key } => self.player.on_key_up(key, midi),
            ControlEvent::Midi(message) => self.player.handle_midi(message, midi),
            ControlEvent::ClockPulse => self.player.clock_tick(false, midi),
        }
    }

    /// One cooperative loop iteration. Returns the measured `dt` seconds.
    pub fn tick(
        &mut self,
        now_micros: u32,
        events: &mut dyn EventReceiver,
        midi: &mut dyn MidiOut,
        sink: &mut dyn RenderSink,
    ) -> f32 {
        let dt = self.delta.delta_seconds(now_micros);

        // Scheduling and clock state get read-modified-written below, and
        // the sink write must not interleave with an interrupt-driven bus
        // transaction: bracket the whole pass
        self.step_timer.enter_critical();

        while let Some(event) = events.pop_event() {
            self.dispatch(event, midi);
        }

        self.player.update(&self.step_timer);
        self.player.instrument_mut().update(dt);

        sink.write(&self.player.instrument().render_frame());

        // A pulse that landed mid-pass replays now, so none is ever lost
        if self.step_timer.exit_critical() {
            self.player.clock_tick(false, midi);
        }

        dt
    }
}
