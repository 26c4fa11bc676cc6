//! Front-panel gesture and pickup semantics.
//!
//! The mux/matrix scan itself is a thin driver; what lives here is the part
//! with rules in it. Faders use "pickup" behavior: after a program load the
//! physical fader position no longer matches the patch, so a fader only
//! recaptures its parameter once nudged past a threshold. Buttons are edge
//! detected on release (click) or press, and the numbered buttons select
//! patch slots, sequence lengths and MIDI channels depending on which
//! section button is held.

use crate::io::store::{load_patch, save_patch, Storage};
use self::PanelSwitch as Sw;
use crate::patch::{PatchFader, PatchSwitch};
use crate::player::{Player, PlayerSetting, PlayerState};
use crate::synth::InstrumentSetting;

/// How far a fader must move from its last captured position before it
/// takes over the parameter again.
pub const FADER_NUDGE_THRESHOLD: i16 = 100;

pub const NUMBER_BUTTONS: usize = 16;

/// Continuous panel controls. The first [`PatchFader::COUNT`] entries mirror
/// the patch fader order; the rest are performance controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFader {
    LfoRate,
    LfoDelay,
    Vibrato,
    PulseWidth,
    SubOscillator,
    Cutoff,
    Resonance,
    FilterEnvelope,
    FilterLfo,
    FilterKeytrack,
    Attack,
    Decay,
    Sustain,
    Release,
    PbBend,
    PbMod,
    PbModVco,
    PbModVcf,
    CtrlRate,
    OutputVolume,
}

impl PanelFader {
    pub const COUNT: usize = 20;
}

/// Switched panel controls. The first [`PatchSwitch::COUNT`] entries mirror
/// the patch switch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSwitch {
    AmpShape,
    PwmSource,
    LfoSync,
    VcoSquare,
    VcoSaw,
    ChorusI,
    ChorusII,
    BendOctave,
    RangeUp,
    RangeDown,
    Hold,
    KeyTranspose,
    MidiSync,
    ArpEnable,
    ArpMode,
    ArpRange,
    SeqRecord,
    SeqBlank,
    ProgLoad,
    ProgStore,
    ProgMidiChannel,
    ProgRetune,
    ProgLoadPanel,
}

impl PanelSwitch {
    pub const COUNT: usize = 23;
}

/// Raw scan results for one panel pass.
#[derive(Debug, Clone, Copy)]
pub struct PanelSnapshot {
    /// Fader positions, 0..=1023.
    pub faders: [i16; PanelFader::COUNT],
    /// Switch positions, 0..n-1 per switch.
    pub switches: [i16; PanelSwitch::COUNT],
    /// Numbered buttons 1..=16, pressed or not.
    pub numbers: [bool; NUMBER_BUTTONS],
}

impl Default for PanelSnapshot {
    fn default() -> Self {
        Self {
            faders: [0; PanelFader::COUNT],
            switches: [0; PanelSwitch::COUNT],
            numbers: [false; NUMBER_BUTTONS],
        }
    }
}

/// Side effects the embedding loop must carry out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelOutcome {
    /// The retune button was clicked; run the calibrator.
    pub retune: bool,
    pub loaded_slot: Option<usize>,
    pub stored_slot: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PanelElement {
    current: i16,
    last: i16,
    last_active: i16,
    active: bool,
}

impl Default for PanelElement {
    fn default() -> Self {
        Self {
            current: 0,
            last: 0,
            last_active: 0,
            active: true,
        }
    }
}

#[derive(Debug)]
pub struct PanelState {
    faders: [PanelElement; PanelFader::COUNT],
    switches: [PanelElement; PanelSwitch::COUNT],
    numbers: [PanelElement; NUMBER_BUTTONS],
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelState {
    pub fn new() -> Self {
        Self {
            faders: [PanelElement::default(); PanelFader::COUNT],
            switches: [PanelElement::default(); PanelSwitch::COUNT],
            numbers: [PanelElement::default(); NUMBER_BUTTONS],
        }
    }

    fn ingest(&mut self, snapshot: &PanelSnapshot) {
        for (element, &value) in self.faders.iter_mut().zip(&snapshot.faders) {
            element.current = value;
        }
        for (element, &value) in self.switches.iter_mut().zip(&snapshot.switches) {
            element.current = value;
        }
        for (element, &pressed) in self.numbers.iter_mut().zip(&snapshot.numbers) {
            element.current = pressed as i16;
        }
    }

    fn finish(&mut self) {
        for element in self
            .faders
            .iter_mut()
            .chain(&mut self.switches)
            .chain(&mut self.numbers)
        {
            element.last = element.current;
        }
    }

    /// Fader value if this fader currently owns its parameter. A parked
    /// fader reactivates once nudged past the threshold.
    fn fader_pickup(&mut self, fader: PanelFader) -> Option<i16> {
        let element = &mut self.faders[fader as usize];
        if !element.active && (element.current - element.last_active).abs() > FADER_NUDGE_THRESHOLD
        {
            element.active = true;
        }
        if element.active {
            element.last_active = element.current;
            Some(element.current)
        } else {
            None
        }
    }

    /// Switch value if it owns its parameter; any movement reactivates.
    fn switch_pickup(&mut self, switch: PanelSwitch) -> Option<i16> {
        let element = &mut self.switches[switch as usize];
        if !element.active && element.last_active != element.current {
            element.active = true;
        }
        if element.active {
            element.last_active = element.current;
            Some(element.current)
        } else {
            None
        }
    }

    /// Release edge.
    fn clicked(&self, switch: PanelSwitch) -> bool {
        let element = &self.switches[switch as usize];
        element.current == 0 && element.last != 0
    }

    /// Press edge.
    fn clicked_early(&self, switch: PanelSwitch) -> bool {
        let element = &self.switches[switch as usize];
        element.current != 0 && element.last == 0
    }

    fn held(&self, switch: PanelSwitch) -> bool {
        self.switches[switch as usize].current != 0
    }

    /// First numbered button with a release edge this pass.
    fn number_clicked(&self) -> Option<usize> {
        self.numbers
            .iter()
            .position(|e| e.current == 0 && e.last != 0)
    }

    /// Park or reactivate every pickup. Parking happens after a program
    /// load, when fader positions stop matching the patch.
    fn set_inputs_active(&mut self, active: bool) {
        for element in self.faders.iter_mut().chain(&mut self.switches) {
            element.active = active;
        }
    }

    fn current(&self, fader: PanelFader) -> i16 {
        self.faders[fader as usize].current
    }

    /// Process one scanned snapshot against the player/instrument state.
    pub fn update(
        &mut self,
        snapshot: &PanelSnapshot,
        player: &mut Player,
        store: &mut dyn Storage,
    ) -> PanelOutcome {
        let mut outcome = PanelOutcome::default();
        self.ingest(snapshot);

        // Patch faders (panel order mirrors patch order for the first 14)
        const PATCH_FADERS: [(PanelFader, PatchFader); PatchFader::COUNT] = [
            (PanelFader::LfoRate, PatchFader::LfoRate),
            (PanelFader::LfoDelay, PatchFader::LfoDelay),
            (PanelFader::Vibrato, PatchFader::Vibrato),
            (PanelFader::PulseWidth, PatchFader::PulseWidth),
            (PanelFader::SubOscillator, PatchFader::SubOscillator),
            (PanelFader::Cutoff, PatchFader::Cutoff),
            (PanelFader::Resonance, PatchFader::Resonance),
            (PanelFader::FilterEnvelope, PatchFader::FilterEnvelope),
            (PanelFader::FilterLfo, PatchFader::FilterLfo),
            (PanelFader::FilterKeytrack, PatchFader::FilterKeytrack),
            (PanelFader::Attack, PatchFader::Attack),
            (PanelFader::Decay, PatchFader::Decay),
            (PanelFader::Sustain, PatchFader::Sustain),
            (PanelFader::Release, PatchFader::Release),
        ];
        for (panel_fader, patch_fader) in PATCH_FADERS {
            if let Some(value) = self.fader_pickup(panel_fader) {
                player.instrument_mut().patch_mut().set_fader(patch_fader, value);
            }
        }

        // Patch switches: the mix/ensemble buttons toggle on click, the
        // rest follow the physical switch with pickup
        const TOGGLED: [(PanelSwitch, PatchSwitch); 4] = [
            (Sw::VcoSquare, PatchSwitch::VcoSquare),
            (Sw::VcoSaw, PatchSwitch::VcoSaw),
            (Sw::ChorusI, PatchSwitch::ChorusI),
            (Sw::ChorusII, PatchSwitch::ChorusII),
        ];
        for (panel_switch, patch_switch) in TOGGLED {
            if self.clicked(panel_switch) {
                let patch = player.instrument_mut().patch_mut();
                let flipped = if patch.switch(patch_switch) != 0 { 0 } else { 1 };
                patch.set_switch(patch_switch, flipped);
            }
        }
        const PICKED_UP: [(PanelSwitch, PatchSwitch); 3] = [
            (Sw::AmpShape, PatchSwitch::AmpShape),
            (Sw::PwmSource, PatchSwitch::PwmSource),
            (Sw::LfoSync, PatchSwitch::LfoSync),
        ];
        for (panel_switch, patch_switch) in PICKED_UP {
            if let Some(value) = self.switch_pickup(panel_switch) {
                player
                    .instrument_mut()
                    .patch_mut()
                    .set_switch(patch_switch, value as i8);
            }
        }

        // Instrument settings
        if let Some(value) = self.fader_pickup(PanelFader::PbBend) {
            player
                .instrument_mut()
                .settings_mut()
                .set(InstrumentSetting::PitchBend, value);
        }
        if let Some(value) = self.fader_pickup(PanelFader::PbMod) {
            player
                .instrument_mut()
                .settings_mut()
                .set(InstrumentSetting::ModWheel, value);
        }
        if let Some(value) = self.fader_pickup(PanelFader::OutputVolume) {
            player
                .instrument_mut()
                .settings_mut()
                .set(InstrumentSetting::Volume, value);
        }
        // Depth pots can be routed directly; they are not stored in patches
        let mod_vco = self.current(PanelFader::PbModVco);
        let mod_vcf = self.current(PanelFader::PbModVcf);
        {
            let settings = player.instrument_mut().settings_mut();
            settings.set(InstrumentSetting::ModVco, mod_vco);
            settings.set(InstrumentSetting::ModVcf, mod_vcf);
        }
        if self.clicked(Sw::BendOctave) {
            player
                .instrument_mut()
                .settings_mut()
                .toggle(InstrumentSetting::BendOctave);
        }

        // Player settings
        if self.clicked(Sw::Hold) {
            player.settings_mut().toggle(PlayerSetting::Holding);
        }
        if self.clicked(Sw::KeyTranspose) {
            player.settings_mut().toggle(PlayerSetting::Transposing);
        }
        if self.clicked(Sw::MidiSync) {
            player.settings_mut().toggle(PlayerSetting::MidiClock);
        }
        let rate = self.current(PanelFader::CtrlRate);
        player.settings_mut().set(PlayerSetting::Rate, rate);
        let arp_mode = self.switches[Sw::ArpMode as usize].current;
        player.settings_mut().set(PlayerSetting::ArpMode, arp_mode);
        let arp_range = self.switches[Sw::ArpRange as usize].current;
        player.settings_mut().set(PlayerSetting::ArpRange, arp_range);

        // Octave range, clamped to two octaves either way
        let range = player.settings().get(PlayerSetting::OctaveOffset);
        let mut new_range = range;
        if self.clicked(Sw::RangeUp) {
            new_range = (new_range + 1).min(2);
        }
        if self.clicked(Sw::RangeDown) {
            new_range = (new_range - 1).max(-2);
        }
        if new_range != range {
            // Held notes would be re-pitched mid-sound otherwise
            player.instrument_mut().all_notes_off();
            player.settings_mut().set(PlayerSetting::OctaveOffset, new_range);
        }

        // Arpeggiator toggle
        if self.clicked(Sw::ArpEnable) {
            match player.state() {
                PlayerState::Arp => player.set_state_normal(),
                _ => player.set_state_arp(),
            }
        }

        // Sequencer gestures: hold record + number = record that many steps;
        // tapping record while recording/playing cancels
        if self.held(Sw::SeqRecord) {
            if let Some(number) = self.number_clicked() {
                player.set_state_seq_recording(1 + number);
            }
        }
        if self.clicked_early(Sw::SeqRecord)
            && matches!(
                player.state(),
                PlayerState::SeqPlaying | PlayerState::SeqRecording
            )
        {
            player.set_state_normal();
        }
        if self.clicked(Sw::SeqBlank) {
            player.push_rest();
        }

        // Program section
        if self.clicked(Sw::ProgRetune) {
            outcome.retune = true;
        }

        // Loading goes through a staging copy applied at the end of the
        // pass, so holding load+store together swaps the active patch with
        // the slot instead of clobbering one side
        let mut loaded_patch = None;
        if self.held(Sw::ProgLoad) {
            if let Some(slot) = self.number_clicked() {
                match load_patch(store, slot) {
                    Ok(patch) => {
                        loaded_patch = Some(patch);
                        outcome.loaded_slot = Some(slot);
                        self.set_inputs_active(false);
                    }
                    Err(err) => log::warn!("patch load failed: {}", err),
                }
            }
        }
        if self.held(Sw::ProgStore) {
            if let Some(slot) = self.number_clicked() {
                let patch = *player.instrument().patch();
                match save_patch(store, slot, &patch) {
                    Ok(()) => outcome.stored_slot = Some(slot),
                    Err(err) => log::warn!("patch store failed: {}", err),
                }
            }
        }
        if self.held(Sw::ProgMidiChannel) {
            if let Some(number) = self.number_clicked() {
                player.toggle_midi_channel(1 + number as u8);
            }
        }
        if self.clicked(Sw::ProgLoadPanel) {
            self.set_inputs_active(true);
        }

        if let Some(patch) = loaded_patch {
            *player.instrument_mut().patch_mut() = patch;
        }

        self.finish();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::{MemStorage, STORAGE_SIZE};
    use crate::synth::Instrument;

    fn rig() -> (PanelState, Player, MemStorage) {
        (
            PanelState::new(),
            Player::new(Instrument::new()),
            MemStorage::new(STORAGE_SIZE),
        )
    }

    fn pass(panel: &mut PanelState, player: &mut Player, store: &mut MemStorage, snapshot: &PanelSnapshot) -> PanelOutcome {
        panel.update(snapshot, player, store)
    }

    #[test]
    fn active_fader_tracks_directly() {
        let (mut panel, mut player, mut store) = rig();
        let mut snapshot = PanelSnapshot::default();
        snapshot.faders[PanelFader::Cutoff as usize] = 700;

        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert_eq!(player.instrument().patch().fader(PatchFader::Cutoff), 700);
    }

    #[test]
    fn parked_fader_needs_a_nudge() {
        let (mut panel, mut player, mut store) = rig();
        let mut snapshot = PanelSnapshot::default();
        snapshot.faders[PanelFader::Cutoff as usize] = 700;
        pass(&mut panel, &mut player, &mut store, &snapshot);

        panel.set_inputs_active(false);
        player.instrument_mut().patch_mut().set_fader(PatchFader::Cutoff, 100);

        // Small wobble: parameter must keep the loaded value
        snapshot.faders[PanelFader::Cutoff as usize] = 750;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert_eq!(player.instrument().patch().fader(PatchFader::Cutoff), 100);

        // Big move: fader picks the parameter back up
        snapshot.faders[PanelFader::Cutoff as usize] = 900;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert_eq!(player.instrument().patch().fader(PatchFader::Cutoff), 900);
    }

    #[test]
    fn mix_buttons_toggle_on_release() {
        let (mut panel, mut player, mut store) = rig();
        let mut snapshot = PanelSnapshot::default();

        // VcoSaw starts on (instrument default); press then release toggles off
        snapshot.switches[Sw::VcoSaw as usize] = 1;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert!(player.instrument().patch().switch_on(PatchSwitch::VcoSaw));

        snapshot.switches[Sw::VcoSaw as usize] = 0;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert!(!player.instrument().patch().switch_on(PatchSwitch::VcoSaw));
    }

    #[test]
    fn record_gesture_sets_length_from_number() {
        let (mut panel, mut player, mut store) = rig();
        let mut snapshot = PanelSnapshot::default();

        snapshot.switches[Sw::SeqRecord as usize] = 1;
        snapshot.numbers[7] = true;
        pass(&mut panel, &mut player, &mut store, &snapshot);

        snapshot.numbers[7] = false; // release the number while record held
        pass(&mut panel, &mut player, &mut store, &snapshot);

        assert_eq!(player.state(), PlayerState::SeqRecording);
    }

    #[test]
    fn tapping_record_cancels_playback() {
        let (mut panel, mut player, mut store) = rig();
        player.set_state_seq_recording(4);
        assert_eq!(player.state(), PlayerState::SeqRecording);

        let mut snapshot = PanelSnapshot::default();
        snapshot.switches[Sw::SeqRecord as usize] = 1; // press edge
        pass(&mut panel, &mut player, &mut store, &snapshot);
        assert_eq!(player.state(), PlayerState::Normal);
    }

    #[test]
    fn store_then_load_round_trips_a_patch() {
        let (mut panel, mut player, mut store) = rig();

        // Dial in a sound, hold store, click number 2
        let mut snapshot = PanelSnapshot::default();
        snapshot.faders[PanelFader::Resonance as usize] = 333;
        snapshot.switches[Sw::ProgStore as usize] = 1;
        snapshot.numbers[2] = true;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        snapshot.numbers[2] = false;
        let outcome = pass(&mut panel, &mut player, &mut store, &snapshot);
        assert_eq!(outcome.stored_slot, Some(2));

        // Scramble the live patch, then load slot 2 back
        snapshot.faders[PanelFader::Resonance as usize] = 0;
        snapshot.switches[Sw::ProgStore as usize] = 0;
        snapshot.switches[Sw::ProgLoad as usize] = 1;
        snapshot.numbers[2] = true;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        snapshot.numbers[2] = false;
        let outcome = pass(&mut panel, &mut player, &mut store, &snapshot);

        assert_eq!(outcome.loaded_slot, Some(2));
        assert_eq!(
            player.instrument().patch().fader(PatchFader::Resonance),
            333
        );
    }

    #[test]
    fn loading_parks_the_fader_pickups() {
        let (mut panel, mut player, mut store) = rig();

        let mut snapshot = PanelSnapshot::default();
        snapshot.faders[PanelFader::Cutoff as usize] = 800;
        pass(&mut panel, &mut player, &mut store, &snapshot);

        // Load slot 0 (all zeros): the physical fader at 800 must not
        // immediately clobber the loaded cutoff
        snapshot.switches[Sw::ProgLoad as usize] = 1;
        snapshot.numbers[0] = true;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        snapshot.numbers[0] = false;
        pass(&mut panel, &mut player, &mut store, &snapshot);
        snapshot.switches[Sw::ProgLoad as usize] = 0;
        pass(&mut panel, &mut player, &mut store, &snapshot);

        assert_eq!(player.instrument().patch().fader(PatchFader::Cutoff), 0);
    }

    #[test]
    fn retune_click_is_reported_not_executed() {
        let (mut panel, mut player, mut store) = rig();
        let mut snapshot = PanelSnapshot::default();

        snapshot.switches[Sw::ProgRetune as usize] = 1;
        let outcome = pass(&mut panel, &mut player, &mut store, &snapshot);
        assert!(!outcome.retune);

        snapshot.switches[Sw::ProgRetune as usize] = 0; // release edge
        let outcome = pass(&mut panel, &mut player, &mut store, &snapshot);
        assert!(outcome.retune);
    }

    #[test]
    fn octave_range_clamps_and_silences() {
        let (mut panel, mut player, mut store) = rig();
        let mut midi = crate::io::midi::NullMidiOut;
        player.handle_note_on(60, 100, true, &mut midi);

        let mut snapshot = PanelSnapshot::default();
        for _ in 0..4 {
            snapshot.switches[Sw::RangeUp as usize] = 1;
            pass(&mut panel, &mut player, &mut store, &snapshot);
            snapshot.switches[Sw::RangeUp as usize] = 0;
            pass(&mut panel, &mut player, &mut store, &snapshot);
        }

        assert_eq!(player.settings().get(PlayerSetting::OctaveOffset), 2);
        assert!(!player.instrument().voices().iter().any(|v| v.gate));
    }
}
