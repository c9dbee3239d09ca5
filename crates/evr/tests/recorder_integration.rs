// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::{Barrier, Mutex};
use std::thread;

use labwired_evr::logfmt::{LogPayload, LogReader, LogSink};
use labwired_evr::reader::{BufferView, Payload};
use labwired_evr::timestamp::OverflowTracker;
use labwired_evr::{
    EventId, EventRecorder, Level, ManualClock, RecorderConfig, RecorderMemory, RecordingMask,
};

const WRITERS: u32 = 4;

#[test]
fn test_concurrent_writers_fill_distinct_slots() {
    let memory = RecorderMemory::<1024>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), RecorderConfig::new());
    recorder.initialize(RecordingMask::ALL, true).unwrap();
    let per_writer = 200;
    let barrier = Barrier::new(WRITERS as usize);

    thread::scope(|s| {
        for writer in 0..WRITERS {
            let recorder = &recorder;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                let id = EventId::new(Level::Op, 0x20 + writer as u8, 0x01);
                for i in 0..per_writer {
                    recorder.timer().advance(1);
                    recorder.record2(id, writer, i).unwrap();
                }
            });
        }
    });

    let total = WRITERS * per_writer;
    let stats = recorder.stats();
    // INIT and START precede the writers.
    assert_eq!(stats.records_written, total + 2);
    assert_eq!(stats.records_dumped, 0);

    let records: Vec<_> = recorder.records().collect();
    let view = BufferView::new(&records, stats.record_index).unwrap();
    let mut seen = HashSet::new();
    for entry in &view.entries()[2..] {
        let rec = entry.record;
        assert!(rec.is_consistent());
        assert_eq!(rec.id() >> 8, 0x20 + rec.value1() as u16);
        assert!(seen.insert((rec.value1(), rec.value2())));
    }
    assert_eq!(seen.len(), total as usize);
}

#[test]
fn test_overloaded_ring_never_leaves_torn_records() {
    let memory = RecorderMemory::<8>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), RecorderConfig::new());
    recorder.initialize(RecordingMask::ALL, true).unwrap();
    let attempts = 5_000;

    thread::scope(|s| {
        for writer in 0..WRITERS {
            let recorder = &recorder;
            s.spawn(move || {
                let id = EventId::new(Level::Detail, 0x30, writer as u8);
                for i in 0..attempts {
                    // Drops are legal here, only the accounting is checked.
                    let _ = recorder.record2(id, i, !i);
                }
            });
        }
    });

    let stats = recorder.stats();
    assert_eq!(stats.records_written + stats.records_dumped, WRITERS * attempts + 2);
    for rec in recorder.records() {
        assert!(!rec.locked());
        assert!(rec.is_consistent());
        assert_eq!(rec.value2(), !rec.value1());
    }
}

#[test]
fn test_error_filter_end_to_end() {
    let memory = RecorderMemory::<64>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), RecorderConfig::new());
    recorder.initialize(RecordingMask::empty(), true).unwrap();
    recorder.enable(RecordingMask::ERROR, 0x00, 0xFE).unwrap();
    let before = recorder.stats();

    recorder.record2(EventId::new(Level::Op, 0x42, 0x07), 1, 2).unwrap();
    assert_eq!(recorder.stats(), before);

    recorder.record2(EventId::new(Level::Error, 0x42, 0x07), 1, 2).unwrap();
    let after = recorder.stats();
    assert_eq!(after.records_written, before.records_written + 1);
    let rec = recorder.record_at(before.record_index as usize);
    assert!(rec.is_consistent());
    assert_eq!(rec.component_id(), 0x42);
    assert_eq!(rec.message_id(), 0x07);
}

#[test]
fn test_repeated_disable_and_stop_have_no_side_effects() {
    let memory = RecorderMemory::<64>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), RecorderConfig::new());
    recorder.initialize(RecordingMask::ALL, true).unwrap();

    recorder.disable(RecordingMask::API, 0x10, 0x20).unwrap();
    recorder.stop().unwrap();
    let filter = recorder.filter_bytes();
    let stats = recorder.stats();

    recorder.disable(RecordingMask::API, 0x10, 0x20).unwrap();
    recorder.stop().unwrap();
    assert_eq!(recorder.filter_bytes(), filter);
    assert_eq!(recorder.stats(), stats);
}

#[test]
fn test_twenty_byte_payload_round_trip() {
    let memory = RecorderMemory::<64>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), RecorderConfig::new());
    recorder.initialize(RecordingMask::ALL, true).unwrap();
    let payload: Vec<u8> = b"twenty bytes of text".to_vec();
    assert_eq!(payload.len(), 20);

    recorder.record_data(EventId::new(Level::Api, 0x05, 0x11), &payload).unwrap();

    // Dump and decode the way a host tool would.
    let dump: Vec<u8> = recorder.records().flat_map(|r| r.to_le_bytes()).collect();
    let view = BufferView::from_bytes(&dump, recorder.stats().record_index).unwrap();
    let events = view.assemble();
    let event = events.iter().find(|e| e.id == 0x0511).unwrap();
    assert_eq!(event.payload, Payload::Data(payload));
}

struct CaptureSink(Mutex<Vec<u8>>);

impl LogSink for CaptureSink {
    fn write(&self, frame: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(frame);
    }
}

static CAPTURE: CaptureSink = CaptureSink(Mutex::new(Vec::new()));

#[test]
fn test_log_sink_receives_every_event() {
    let memory = RecorderMemory::<64>::new();
    let config = RecorderConfig::new().with_log_sink(&CAPTURE);
    let recorder = EventRecorder::new(&memory, ManualClock::new(1_000), config);
    recorder.initialize(RecordingMask::ALL, true).unwrap();
    recorder.timer().set(0xFFFF_FFF0);
    recorder.record4(EventId::new(Level::Op, 0x01, 0x02), 1, 2, 3, 4).unwrap();
    recorder.timer().set(0x10);
    recorder.record_data(EventId::new(Level::Op, 0x01, 0x03), b"log").unwrap();

    let bytes = CAPTURE.0.lock().unwrap().clone();
    let frames: Vec<_> = LogReader::new(&bytes).collect::<Result<_, _>>().unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].id, 0xFF00);
    assert_eq!(frames[1].id, 0xFF01);
    assert_eq!(frames[2].payload, LogPayload::Values4([1, 2, 3, 4]));
    assert_eq!(frames[2].timestamp, 0xFFFF_FFF0);
    assert_eq!(frames[3].payload, LogPayload::Data(b"log"));
    // The counter wrapped between the two events.
    assert_eq!(frames[3].timestamp, 0x1_0000_0010);
}

#[test]
fn test_wrap_seen_by_many_threads_counts_once() {
    let tracker = OverflowTracker::new();
    tracker.extend(|| 0xFFFF_0000);
    let barrier = Barrier::new(8);

    thread::scope(|s| {
        for _ in 0..8 {
            let tracker = &tracker;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                let ts = tracker.extend(|| 0x100);
                assert!(ts.overflow <= 1);
            });
        }
    });
    assert_eq!(tracker.overflow(), 1);
}
