//! Persistent records: tuning block and patch slots.
//!
//! The non-volatile memory is a flat byte space behind the [`Storage`]
//! trait (EEPROM on the instrument, a file or `Vec<u8>` elsewhere). Records
//! are fixed-size little-endian blocks so the layout is stable across
//! firmware builds: the tuning block lives at offset 0, patch slots follow
//! at `slot * PATCH_RECORD_SIZE`.

use std::fmt;

use crate::patch::{Patch, PatchFader, PatchSwitch};
use crate::tuning::{TuningCorrection, TUNED_PARAMS};
use crate::VOICE_COUNT;

/// Byte-addressed non-volatile storage.
pub trait Storage {
    fn load(&mut self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError>;
    fn save(&mut self, addr: usize, data: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Access past the end of the storage space.
    OutOfRange {
        addr: usize,
        len: usize,
        capacity: usize,
    },
    /// Patch slot index outside 0..PATCH_SLOTS.
    InvalidSlot(usize),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::OutOfRange {
                addr,
                len,
                capacity,
            } => write!(
                f,
                "storage access out of range: {} bytes at {} (capacity {})",
                len, addr, capacity
            ),
            StoreError::InvalidSlot(slot) => {
                write!(f, "invalid patch slot {} (have {})", slot, PATCH_SLOTS)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// In-memory [`Storage`] with a fixed capacity; for tests and the simulator.
#[derive(Debug, Clone)]
pub struct MemStorage {
    bytes: Vec<u8>,
}

impl MemStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
        }
    }

    fn check(&self, addr: usize, len: usize) -> Result<(), StoreError> {
        if addr + len > self.bytes.len() {
            return Err(StoreError::OutOfRange {
                addr,
                len,
                capacity: self.bytes.len(),
            });
        }
        Ok(())
    }
}

impl Storage for MemStorage {
    fn load(&mut self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check(addr, buf.len())?;
        buf.copy_from_slice(&self.bytes[addr..addr + buf.len()]);
        Ok(())
    }

    fn save(&mut self, addr: usize, data: &[u8]) -> Result<(), StoreError> {
        self.check(addr, data.len())?;
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Calibration state persisted as one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningRecord {
    /// Per voice: `[pitch, cutoff]` correction curves.
    pub corrections: [[TuningCorrection; TUNED_PARAMS]; VOICE_COUNT],
    pub pitch_bend_center: f32,
    pub mod_center: f32,
}

impl Default for TuningRecord {
    fn default() -> Self {
        Self {
            corrections: [[TuningCorrection::identity(); TUNED_PARAMS]; VOICE_COUNT],
            // mid-scale of the 10-bit ADC
            pitch_bend_center: 512.0,
            mod_center: 512.0,
        }
    }
}

impl TuningRecord {
    /// 8 voices x 2 parameters x 3 coefficients, plus the two center offsets.
    pub const SIZE: usize = VOICE_COUNT * TUNED_PARAMS * 3 * 4 + 2 * 4;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut at = 0;
        for voice in &self.corrections {
            for corr in voice {
                for coeff in corr.parabolic {
                    bytes[at..at + 4].copy_from_slice(&coeff.to_le_bytes());
                    at += 4;
                }
            }
        }
        bytes[at..at + 4].copy_from_slice(&self.pitch_bend_center.to_le_bytes());
        at += 4;
        bytes[at..at + 4].copy_from_slice(&self.mod_center.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut record = TuningRecord::default();
        let mut at = 0;
        let mut read_f32 = |at: &mut usize| {
            let value = f32::from_le_bytes(bytes[*at..*at + 4].try_into().unwrap());
            *at += 4;
            value
        };
        for voice in &mut record.corrections {
            for corr in voice.iter_mut() {
                for coeff in corr.parabolic.iter_mut() {
                    *coeff = read_f32(&mut at);
                }
            }
        }
        record.pitch_bend_center = read_f32(&mut at);
        record.mod_center = read_f32(&mut at);
        record
    }
}

/// Start of the tuning block.
pub const TUNING_ADDR: usize = 0;

/// Patch slots follow the tuning block.
pub const PATCH_BASE_ADDR: usize = TuningRecord::SIZE;

/// 14 faders as i16 plus 7 switches as one byte each.
pub const PATCH_RECORD_SIZE: usize = PatchFader::COUNT * 2 + PatchSwitch::COUNT;

pub const PATCH_SLOTS: usize = 16;

/// Storage capacity needed for the full memory map.
pub const STORAGE_SIZE: usize = PATCH_BASE_ADDR + PATCH_SLOTS * PATCH_RECORD_SIZE;

fn patch_addr(slot: usize) -> Result<usize, StoreError> {
    if slot >= PATCH_SLOTS {
        return Err(StoreError::InvalidSlot(slot));
    }
    Ok(PATCH_BASE_ADDR + slot * PATCH_RECORD_SIZE)
}

fn patch_to_bytes(patch: &Patch) -> [u8; PATCH_RECORD_SIZE] {
    let mut bytes = [0u8; PATCH_RECORD_SIZE];
    let mut at = 0;
    for fader in patch.faders {
        bytes[at..at + 2].copy_from_slice(&fader.to_le_bytes());
        at += 2;
    }
    for switch in patch.switches {
        bytes[at] = switch as u8;
        at += 1;
    }
    bytes
}

fn patch_from_bytes(bytes: &[u8; PATCH_RECORD_SIZE]) -> Patch {
    let mut patch = Patch::default();
    let mut at = 0;
    for fader in patch.faders.iter_mut() {
        *fader = i16::from_le_bytes(bytes[at..at + 2].try_into().unwrap());
        at += 2;
    }
    for switch in patch.switches.iter_mut() {
        *switch = bytes[at] as i8;
        at += 1;
    }
    patch
}

pub fn load_tuning(store: &mut dyn Storage) -> Result<TuningRecord, StoreError> {
    let mut bytes = [0u8; TuningRecord::SIZE];
    store.load(TUNING_ADDR, &mut bytes)?;
    Ok(TuningRecord::from_bytes(&bytes))
}

pub fn save_tuning(store: &mut dyn Storage, record: &TuningRecord) -> Result<(), StoreError> {
    store.save(TUNING_ADDR, &record.to_bytes())
}

pub fn load_patch(store: &mut dyn Storage, slot: usize) -> Result<Patch, StoreError> {
    let addr = patch_addr(slot)?;
    let mut bytes = [0u8; PATCH_RECORD_SIZE];
    store.load(addr, &mut bytes)?;
    Ok(patch_from_bytes(&bytes))
}

pub fn save_patch(store: &mut dyn Storage, slot: usize, patch: &Patch) -> Result<(), StoreError> {
    let addr = patch_addr(slot)?;
    store.save(addr, &patch_to_bytes(patch))
}
