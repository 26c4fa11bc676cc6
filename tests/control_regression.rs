//! Cross-module regression tests: the scheduler invariants, the published
//! arp/sequencer step sequences, and a full calibration run against a
//! simulated analog rig.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use polyctl::io::midi::NullMidiOut;
use polyctl::io::render::{RenderFrame, RenderSink, MIXER_SQUARE};
use polyctl::io::time::TimeSource;
use polyctl::player::clock::INTERNAL_DIVIDER;
use polyctl::player::{Player, PlayerSetting, PlayerState};
use polyctl::synth::Instrument;
use polyctl::tuning::{
    frequency_to_semis, CalibrationReport, Calibrator, CenterProbe, CycleCounter, TuneParam, C0_HZ,
};
use polyctl::VOICE_COUNT;

fn gated_notes(player: &Player) -> Vec<u8> {
    player
        .instrument()
        .voices()
        .iter()
        .filter(|v| v.gate)
        .map(|v| v.note)
        .collect()
}

fn pulse_one_step(player: &mut Player, midi: &mut NullMidiOut) {
    for _ in 0..INTERNAL_DIVIDER {
        player.clock_tick(false, midi);
    }
}

#[test]
fn arp_up_two_octaves_publishes_the_documented_sequence() {
    let mut player = Player::new(Instrument::new());
    let mut midi = NullMidiOut;

    player.set_state_arp();
    player.settings_mut().set(PlayerSetting::ArpRange, 1); // x2 multiplier

    // Keys 36/40/43 -> notes 60/64/67
    for key in [36, 40, 43] {
        player.on_key_down(key, 127, &mut midi);
    }

    let mut sounded = Vec::new();
    for _ in 0..7 {
        pulse_one_step(&mut player, &mut midi); // on half
        sounded.extend(gated_notes(&player));
        pulse_one_step(&mut player, &mut midi); // off half
    }

    assert_eq!(sounded, vec![60, 64, 67, 72, 76, 79, 60]);
}

#[test]
fn sequencer_with_rest_cycles_exactly() {
    let mut player = Player::new(Instrument::new());
    let mut midi = NullMidiOut;

    player.set_state_seq_recording(3);
    player.handle_note_on(60, 100, true, &mut midi);
    player.push_rest();
    player.handle_note_on(64, 100, true, &mut midi);
    assert_eq!(player.state(), PlayerState::SeqPlaying);

    let mut sounded = Vec::new();
    for _ in 0..6 {
        pulse_one_step(&mut player, &mut midi);
        sounded.push(gated_notes(&player).first().copied());
        pulse_one_step(&mut player, &mut midi);
    }

    assert_eq!(
        sounded,
        vec![Some(60), None, Some(64), Some(60), None, Some(64)]
    );
}

#[test]
fn note_storm_never_duplicates_a_gated_note() {
    let mut instr = Instrument::new();

    // Deterministic pseudo-random on/off storm, bounded at 8 held notes
    let mut held: Vec<i32> = Vec::new();
    let mut seed = 0x2F6E2B1u32;
    for _ in 0..500 {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        let note = 36 + (seed >> 9) as i32 % 49;
        if held.len() < VOICE_COUNT && seed % 3 != 0 {
            instr.schedule_note_on(note, 100);
            if !held.contains(&note) {
                held.push(note);
            }
        } else if let Some(&victim) = held.first() {
            instr.schedule_note_off(victim);
            held.remove(0);
        }

        let mut notes: Vec<u8> = instr
            .voices()
            .iter()
            .filter(|v| v.gate)
            .map(|v| v.note)
            .collect();
        notes.sort_unstable();
        let len = notes.len();
        notes.dedup();
        assert_eq!(len, notes.len(), "two gated voices share a note");
    }
}

// ---- calibration rig ---------------------------------------------------

/// Simulated analog voice bank: turns rendered pitch/cutoff requests into an
/// oscillation frequency with a configurable nonlinearity, and feeds rising
/// edges into the cycle counter whenever simulated time advances.
struct RigState {
    now_micros: Cell<u64>,
    frequency: Cell<f64>,
    next_edge_micros: Cell<f64>,
    counter: Arc<CycleCounter>,
    /// Profile that produces no edges at all (dead loopback).
    dead: Cell<Option<(usize, TuneParam)>>,
}

impl RigState {
    fn new(counter: Arc<CycleCounter>) -> Rc<Self> {
        Rc::new(Self {
            now_micros: Cell::new(0),
            frequency: Cell::new(0.0),
            next_edge_micros: Cell::new(f64::MAX),
            counter,
            dead: Cell::new(None),
        })
    }

    /// The simulated hardware response: the *actual* sounded semitone is a
    /// gentle quadratic distortion of the requested one, so
    /// `ideal = distort(requested)` and a correct calibration must recover
    /// the inverse mapping `requested = fit(ideal)`.
    fn distort(requested: f64) -> f64 {
        3.0 + 0.94 * requested + 0.0004 * requested * requested
    }

    fn set_request(&self, requested: f64, silent: bool) {
        if silent {
            self.frequency.set(0.0);
            self.next_edge_micros.set(f64::MAX);
            return;
        }
        let sounded_semis = Self::distort(requested);
        let freq = C0_HZ as f64 * (2.0f64).powf(sounded_semis / 12.0);
        self.frequency.set(freq);
        self.next_edge_micros
            .set(self.now_micros.get() as f64 + 1_000_000.0 / freq);
    }

    fn advance(&self, micros: u64) {
        let target = self.now_micros.get() + micros;
        while self.frequency.get() > 0.0 && self.next_edge_micros.get() <= target as f64 {
            let edge_at = self.next_edge_micros.get();
            self.counter.on_rising_edge(edge_at as u64 as u32);
            self.next_edge_micros
                .set(edge_at + 1_000_000.0 / self.frequency.get());
        }
        self.now_micros.set(target);
    }
}

struct RigTime(Rc<RigState>);

impl TimeSource for RigTime {
    fn micros(&self) -> u32 {
        self.0.now_micros.get() as u32
    }

    fn millis(&self) -> u32 {
        (self.0.now_micros.get() / 1_000) as u32
    }

    fn delay_micros(&self, us: u32) {
        self.0.advance(us as u64);
    }
}

struct RigSink(Rc<RigState>);

impl RenderSink for RigSink {
    fn write(&mut self, frame: &RenderFrame) {
        // The voice under test is the one with its VCA opened
        let Some(voice) = frame.voices.iter().position(|v| v.amp > 0.5) else {
            self.0.frequency.set(0.0);
            return;
        };

        // Square mix routed = pitch profile; oscillators muted = cutoff
        // profile (filter self-oscillation)
        let (param, requested) = if frame.mixer & MIXER_SQUARE != 0 {
            (TuneParam::Pitch, frame.voices[voice].pitch)
        } else {
            (TuneParam::Cutoff, frame.voices[voice].cutoff)
        };

        let silent = self.0.dead.get() == Some((voice, param));
        self.0.set_request(requested as f64, silent);
    }
}

struct RigProbe;

impl CenterProbe for RigProbe {
    fn read_pitch_bend_raw(&mut self) -> u16 {
        498
    }

    fn read_mod_raw(&mut self) -> u16 {
        523
    }
}

fn run_calibration(dead: Option<(usize, TuneParam)>) -> (Instrument, CalibrationReport) {
    let counter = Arc::new(CycleCounter::new());
    let rig = RigState::new(counter.clone());
    rig.dead.set(dead);

    let mut instrument = Instrument::new();
    let time = RigTime(rig.clone());
    let mut sink = RigSink(rig);

    let report = Calibrator::new(&mut instrument, &counter, &time, &mut sink).run(&mut RigProbe);
    (instrument, report)
}

#[test]
fn calibration_learns_the_inverse_response() {
    let (instrument, report) = run_calibration(None);
    assert!(report.all_ok());

    // The fitted curve maps ideal semitones back to the request that
    // produces them: fit(distort(x)) ~= x across the sweep
    for voice in 0..VOICE_COUNT {
        let correction = instrument.voice(voice).pitch_correction;
        for requested in [35.0f32, 60.0, 90.0, 105.0] {
            let ideal = RigState::distort(requested as f64) as f32;
            let corrected = correction.apply(ideal);
            assert!(
                (corrected - requested).abs() < 0.1,
                "voice {voice}: ideal {ideal} -> {corrected}, wanted {requested}"
            );
        }
        // And it is clearly not the identity
        assert!((correction.parabolic[1] - 1.0).abs() > 0.01);
    }

    assert!((report.pitch_bend_center - 498.0).abs() < 0.5);
    assert!((report.mod_center - 523.0).abs() < 0.5);
}

#[test]
fn calibration_frequency_conversion_is_consistent() {
    // Round-trip sanity for the rig itself: distort(60) semis at the
    // measured frequency converts back to the same semitone value
    let sounded = RigState::distort(60.0);
    let freq = C0_HZ as f64 * (2.0f64).powf(sounded / 12.0);
    let ideal = frequency_to_semis(freq as f32);
    assert!((ideal as f64 - sounded).abs() < 0.01);
}

#[test]
fn calibration_timeout_only_fails_that_profile() {
    let (instrument, report) = run_calibration(Some((3, TuneParam::Pitch)));

    assert!(!report.profiles[3][TuneParam::Pitch.index()]);
    assert!(report.profiles[3][TuneParam::Cutoff.index()]);

    // The failed profile keeps the identity fallback
    assert_eq!(
        instrument.voice(3).pitch_correction.parabolic,
        [0.0, 1.0, 0.0]
    );
    // Its sibling and every other voice calibrated normally
    assert!((instrument.voice(3).cutoff_correction.parabolic[1] - 1.0).abs() > 0.01);
    for voice in (0..VOICE_COUNT).filter(|&v| v != 3) {
        assert!(report.profiles[voice][0] && report.profiles[voice][1]);
        assert!((instrument.voice(voice).pitch_correction.parabolic[1] - 1.0).abs() > 0.01);
    }
}

#[test]
fn midi_stop_silences_and_continue_resumes_in_place() {
    use polyctl::io::midi::MidiEvent;

    let mut player = Player::new(Instrument::new());
    let mut midi = NullMidiOut;
    player.set_state_arp();
    for key in [36, 40, 43] {
        player.on_key_down(key, 127, &mut midi);
    }

    pulse_one_step(&mut player, &mut midi); // sounds 60
    pulse_one_step(&mut player, &mut midi);
    pulse_one_step(&mut player, &mut midi); // sounds 64

    player.handle_midi(MidiEvent::Stop, &mut midi);
    assert!(gated_notes(&player).is_empty());

    // Continue does not rewind: the next sounded note is 67, not 60
    player.handle_midi(MidiEvent::Continue, &mut midi);
    pulse_one_step(&mut player, &mut midi);
    pulse_one_step(&mut player, &mut midi);
    assert_eq!(gated_notes(&player), vec![67]);
}
