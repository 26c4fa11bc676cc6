// Purpose - boundaries to the thin I/O drivers: event intake, MIDI types,
// the render sink fed to the DAC writer, persistent records, time sources.
// Everything here is interface + data layout; no driver logic.

pub mod events;
pub mod midi;
pub mod render;
pub mod store;
pub mod time;
