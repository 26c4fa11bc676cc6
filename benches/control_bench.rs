//! Benchmarks for the control tick hot path.
//!
//! Run with: cargo bench
//!
//! The firmware's cooperative loop targets roughly a 200 Hz control rate,
//! so one full instrument update (8 voices, envelopes, LFOs, output laws)
//! plus a frame render has a ~5 ms deadline shared with panel and keybed
//! scanning. These benches keep an eye on the headroom.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use polyctl::patch::{PatchFader, PatchSwitch};
use polyctl::synth::Instrument;
use polyctl::tuning::fit::fit_parabola;

const DT: f32 = 0.005;

fn busy_instrument() -> Instrument {
    let mut instr = Instrument::new();
    let patch = instr.patch_mut();
    patch.set_fader(PatchFader::Sustain, 800);
    patch.set_fader(PatchFader::Cutoff, 700);
    patch.set_fader(PatchFader::Vibrato, 400);
    patch.set_fader(PatchFader::FilterLfo, 300);
    patch.set_fader(PatchFader::Release, 500);
    patch.set_switch(PatchSwitch::ChorusI, 1);

    for note in [48, 52, 55, 59, 62, 65, 69, 72] {
        instr.schedule_note_on(note, 100);
    }
    instr
}

fn bench_instrument_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("control/tick");

    let mut instr = busy_instrument();
    group.bench_function("update_8_voices", |b| {
        b.iter(|| {
            instr.update(black_box(DT));
        })
    });

    let instr = busy_instrument();
    group.bench_function("render_frame", |b| {
        b.iter(|| black_box(instr.render_frame()))
    });

    group.finish();
}

fn bench_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("control/scheduler");

    // Worst case: a full pool, every note-on is a steal
    let mut instr = busy_instrument();
    let mut note = 0u8;
    group.bench_function("note_on_steal", |b| {
        b.iter(|| {
            note = note.wrapping_add(7) % 96;
            instr.schedule_note_on(black_box(24 + note as i32), 100);
        })
    });

    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("control/tuning");

    let x: Vec<f32> = (0..20).map(|i| 30.0 + 80.0 * i as f32 / 19.0).collect();
    let y: Vec<f32> = x.iter().map(|&xi| 1.2 + 0.97 * xi + 0.0005 * xi * xi).collect();

    group.bench_function("fit_parabola_20", |b| {
        b.iter(|| black_box(fit_parabola(black_box(&x), black_box(&y))))
    });

    group.finish();
}

criterion_group!(benches, bench_instrument_tick, bench_scheduler, bench_fit);
criterion_main!(benches);
