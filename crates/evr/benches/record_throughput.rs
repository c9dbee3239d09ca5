// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use labwired_evr::{EventId, EventRecorder, Level, ManualClock, RecorderConfig, RecorderMemory, RecordingMask};

static MEMORY: RecorderMemory<1024> = RecorderMemory::new();

fn bench_record(c: &mut Criterion) {
    let recorder = EventRecorder::new(&MEMORY, ManualClock::new(1_000_000), RecorderConfig::new());
    if recorder.initialize(RecordingMask::ALL, true).is_err() {
        return;
    }
    let id = EventId::new(Level::Op, 0x10, 0x01);
    let filtered = EventId::new(Level::Detail, 0x11, 0x01);
    recorder.disable(RecordingMask::DETAIL, 0x11, 0x11).ok();
    let payload = [0x5Au8; 32];

    c.bench_function("record2", |b| {
        b.iter(|| recorder.record2(black_box(id), black_box(1), black_box(2)))
    });

    c.bench_function("record4", |b| {
        b.iter(|| recorder.record4(black_box(id), 1, 2, 3, 4))
    });

    c.bench_function("record_data_32", |b| {
        b.iter(|| recorder.record_data(black_box(id), black_box(&payload)))
    });

    c.bench_function("record2_filtered", |b| {
        b.iter(|| recorder.record2(black_box(filtered), 1, 2))
    });

    c.bench_function("timestamp64", |b| {
        b.iter(|| {
            recorder.timer().advance(1);
            black_box(recorder.timestamp64())
        })
    });
}

criterion_group!(benches, bench_record);
criterion_main!(benches);
