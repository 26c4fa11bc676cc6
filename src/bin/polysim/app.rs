//! Simulator application state and event loop.

use crate::ui;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use rtrb::Consumer;

use polyctl::io::events::{event_queue, ControlEvent, EventSink};
use polyctl::io::midi::MidiOut;
use polyctl::io::render::FrameCapture;
use polyctl::io::store::{
    load_patch, load_tuning, save_patch, save_tuning, MemStorage, TuningRecord, STORAGE_SIZE,
};
use polyctl::player::keys::{KeyAction, KeyState, KeyTracker, NUM_KEYS};
use polyctl::player::{PlayerSetting, PlayerState};
use polyctl::runtime::timer::StepTimer;
use polyctl::runtime::ControlCore;
use polyctl::synth::Instrument;

/// Computer-keyboard row mapped onto one octave of keybed starting here.
const BASE_KEY: u8 = 24;
const NOTE_ROW: &str = "zsxdcvgbhnjm";

/// Simulated key release delay; terminals report no key-up events.
const KEY_HOLD_MILLIS: u32 = 300;

/// Counts outgoing MIDI for the status display.
#[derive(Debug, Default)]
pub struct SimMidiOut {
    pub notes_sent: u64,
    pub clocks_sent: u64,
}

impl MidiOut for SimMidiOut {
    fn send_note_on(&mut self, _note: u8, _velocity: u8, _channel: u8) {
        self.notes_sent += 1;
    }

    fn send_note_off(&mut self, _note: u8, _velocity: u8, _channel: u8) {
        self.notes_sent += 1;
    }

    fn send_clock(&mut self) {
        self.clocks_sent += 1;
    }
}

pub struct App {
    pub core: ControlCore,
    pub midi: SimMidiOut,
    pub sink: FrameCapture,
    pub selected_fader: usize,
    pub last_message: String,

    events_rx: Consumer<ControlEvent>,
    store: MemStorage,
    tracker: KeyTracker,
    release_at_ms: [Option<u32>; NUM_KEYS],
    clock_stop: Arc<AtomicBool>,
    clock_thread: Option<JoinHandle<()>>,
    started: Instant,
    should_quit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        let step_timer = Arc::new(StepTimer::new(10_000));
        let mut core = ControlCore::new(Instrument::new(), step_timer.clone(), 0);

        // Seed storage with identity tuning and an empty bank, then boot the
        // way the firmware does: load tuning, load patch slot 0
        let mut store = MemStorage::new(STORAGE_SIZE);
        let _ = save_tuning(&mut store, &TuningRecord::default());
        if let Ok(record) = load_tuning(&mut store) {
            core.instrument_mut().apply_tuning(&record);
        }
        if let Ok(patch) = load_patch(&mut store, 0) {
            *core.instrument_mut().patch_mut() = patch;
        }

        // Audible defaults so the first keypress makes a sound
        {
            let patch = core.instrument_mut().patch_mut();
            patch.set_fader(polyctl::patch::PatchFader::Sustain, 800);
            patch.set_fader(polyctl::patch::PatchFader::Cutoff, 700);
            patch.set_fader(polyctl::patch::PatchFader::Release, 300);
        }
        core.player_mut()
            .settings_mut()
            .set(PlayerSetting::Rate, 700);

        // The "timer interrupt": a thread that paces pulses into the event
        // queue through the missed-pulse gate
        let (mut pulse_sink, events_rx) = event_queue(512);
        let clock_stop = Arc::new(AtomicBool::new(false));
        let clock_thread = {
            let stop = clock_stop.clone();
            let timer = step_timer;
            Some(std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let interval = timer.interval_micros();
                    std::thread::sleep(Duration::from_micros(interval as u64));
                    if timer.tick() {
                        pulse_sink.on_clock_pulse();
                    }
                }
            }))
        };

        Self {
            core,
            midi: SimMidiOut::default(),
            sink: FrameCapture::default(),
            selected_fader: 0,
            last_message: String::from("ready"),
            events_rx,
            store,
            tracker: KeyTracker::new(),
            release_at_ms: [None; NUM_KEYS],
            clock_stop,
            clock_thread,
            started: Instant::now(),
            should_quit: false,
        }
    }

    fn now_micros(&self) -> u32 {
        self.started.elapsed().as_micros() as u32
    }

    fn now_millis(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    pub fn run(mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.release_expired_keys();

            let now = self.now_micros();
            self.core
                .tick(now, &mut self.events_rx, &mut self.midi, &mut self.sink);

            terminal.draw(|frame| ui::render(frame, &self))?;

            if event::poll(Duration::from_millis(8))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        self.clock_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.clock_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Terminals never report key-up, so pressed keys release themselves
    /// after a fixed hold time (re-pressing extends it).
    fn release_expired_keys(&mut self) {
        let now_ms = self.now_millis();
        for key in 0..NUM_KEYS {
            if let Some(deadline) = self.release_at_ms[key] {
                // wrap-safe "now >= deadline"
                let overdue = now_ms.wrapping_sub(deadline) < u32::MAX / 2;
                if overdue {
                    self.release_at_ms[key] = None;
                    if let Some(KeyAction::KeyUp { key }) =
                        self.tracker.update(key, KeyState::Open, now_ms)
                    {
                        self.core
                            .dispatch(ControlEvent::KeyUp { key }, &mut self.midi);
                    }
                }
            }
        }
    }

    fn press_key(&mut self, key: u8) {
        let now_ms = self.now_millis();
        self.release_at_ms[key as usize] = Some(now_ms.wrapping_add(KEY_HOLD_MILLIS));
        if let Some(KeyAction::KeyDown { key, velocity }) =
            self.tracker.update(key as usize, KeyState::Pressed, now_ms)
        {
            self.core
                .dispatch(ControlEvent::KeyDown { key, velocity }, &mut self.midi);
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,

            KeyCode::Char(c) if NOTE_ROW.contains(c) => {
                let offset = NOTE_ROW.find(c).unwrap() as u8;
                self.press_key(BASE_KEY + offset);
            }

            KeyCode::Char('a') => {
                match self.core.player().state() {
                    PlayerState::Arp => self.core.player_mut().set_state_normal(),
                    _ => self.core.player_mut().set_state_arp(),
                }
                self.last_message = format!("state: {:?}", self.core.player().state());
            }
            KeyCode::Char('r') => {
                self.core.player_mut().set_state_seq_recording(8);
                self.last_message = String::from("recording 8 steps");
            }
            KeyCode::Char('p') => {
                self.core.player_mut().push_rest();
                self.last_message = String::from("rest recorded");
            }
            KeyCode::Char('n') => {
                self.core.player_mut().set_state_normal();
                self.last_message = String::from("state: Normal");
            }
            KeyCode::Char('h') => {
                self.core.player_mut().settings_mut().toggle(PlayerSetting::Holding);
            }
            KeyCode::Char('t') => {
                self.core
                    .player_mut()
                    .settings_mut()
                    .toggle(PlayerSetting::Transposing);
            }
            KeyCode::Char('m') => {
                let mode = self.core.player().settings().get(PlayerSetting::ArpMode);
                self.core
                    .player_mut()
                    .settings_mut()
                    .set(PlayerSetting::ArpMode, (mode + 1) % 3);
            }
            KeyCode::Char('o') => {
                let range = self.core.player().settings().get(PlayerSetting::ArpRange);
                self.core
                    .player_mut()
                    .settings_mut()
                    .set(PlayerSetting::ArpRange, (range + 1) % 3);
            }
            KeyCode::Char('u') => {
                let next = match self.core.instrument().unison_divisor() {
                    1 => 2,
                    2 => 4,
                    4 => 8,
                    _ => 1,
                };
                self.core.instrument_mut().set_unison_divisor(next);
                self.last_message = format!("unison divisor {next}");
            }
            KeyCode::Char('[') => self.shift_octave(-1),
            KeyCode::Char(']') => self.shift_octave(1),

            KeyCode::Left => {
                self.selected_fader =
                    (self.selected_fader + polyctl::patch::PatchFader::COUNT - 1)
                        % polyctl::patch::PatchFader::COUNT;
            }
            KeyCode::Right => {
                self.selected_fader = (self.selected_fader + 1) % polyctl::patch::PatchFader::COUNT;
            }
            KeyCode::Up => self.nudge_fader(64),
            KeyCode::Down => self.nudge_fader(-64),

            KeyCode::Char('-') => self.nudge_rate(-64),
            KeyCode::Char('=') => self.nudge_rate(64),

            KeyCode::Char('w') => {
                let patch = *self.core.instrument().patch();
                match save_patch(&mut self.store, 0, &patch) {
                    Ok(()) => self.last_message = String::from("stored patch slot 0"),
                    Err(err) => self.last_message = format!("store failed: {err}"),
                }
            }
            KeyCode::Char('l') => match load_patch(&mut self.store, 0) {
                Ok(patch) => {
                    *self.core.instrument_mut().patch_mut() = patch;
                    self.last_message = String::from("loaded patch slot 0");
                }
                Err(err) => self.last_message = format!("load failed: {err}"),
            },
            _ => {}
        }
    }

    fn shift_octave(&mut self, delta: i16) {
        let range = self
            .core
            .player()
            .settings()
            .get(PlayerSetting::OctaveOffset);
        let next = (range + delta).clamp(-2, 2);
        if next != range {
            self.core.instrument_mut().all_notes_off();
            self.core
                .player_mut()
                .settings_mut()
                .set(PlayerSetting::OctaveOffset, next);
        }
    }

    fn nudge_fader(&mut self, delta: i16) {
        let fader = polyctl::patch::PatchFader::ALL[self.selected_fader];
        let value = self.core.instrument().patch().fader(fader);
        self.core
            .instrument_mut()
            .patch_mut()
            .set_fader(fader, value + delta);
    }

    fn nudge_rate(&mut self, delta: i16) {
        let rate = self.core.player().settings().get(PlayerSetting::Rate);
        self.core
            .player_mut()
            .settings_mut()
            .set(PlayerSetting::Rate, (rate + delta).clamp(0, 1023));
    }
}
