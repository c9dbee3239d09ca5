// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host-side decoding of a raw record buffer.
//!
//! A dump is read without stopping the target, so any slot may be half written,
//! left over from an older generation, or part of a chain whose head has already
//! been overwritten. [`BufferView`] keeps only what can be trusted and
//! [`BufferView::assemble`] turns chained records back into events.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::id::component;
use crate::record::{RawRecord, RECORD_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("buffer length {len} is not a multiple of the 16-byte record size")]
    Misaligned { len: usize },
    #[error("record count {count} is not a power of two of at least 8")]
    BadRecordCount { count: usize },
}

/// One retained slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Allocation number, i.e. position in the global write order.
    pub position: u32,
    pub slot: usize,
    pub record: RawRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    Values2([u32; 2]),
    Values4([u32; 4]),
    Data(Vec<u8>),
}

/// A fully reassembled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Component and message number. The level is not stored in the buffer.
    pub id: u16,
    pub timestamp: u32,
    pub irq: bool,
    pub payload: Payload,
}

#[derive(Debug)]
pub struct BufferView {
    entries: Vec<Entry>,
}

impl BufferView {
    /// Orders `records` (the whole ring, in slot order) oldest to newest.
    ///
    /// `record_index` is the recorder's allocation counter. Slots that are not
    /// consistent, or whose sequence number does not match the generation the
    /// counter implies, are dropped.
    pub fn new(records: &[RawRecord], record_index: u32) -> Result<Self, ReaderError> {
        let count = records.len();
        if count < 8 || !count.is_power_of_two() {
            return Err(ReaderError::BadRecordCount { count });
        }

        let oldest = record_index.saturating_sub(count as u32);
        let entries = (oldest..record_index)
            .filter_map(|position| {
                let slot = position as usize & (count - 1);
                let record = records[slot];
                let generation = (position / count as u32) & 0xF;
                (record.is_consistent() && record.sequence() as u32 == generation).then_some(Entry {
                    position,
                    slot,
                    record,
                })
            })
            .collect();
        Ok(Self { entries })
    }

    /// Parses a little-endian memory dump of the record ring.
    pub fn from_bytes(bytes: &[u8], record_index: u32) -> Result<Self, ReaderError> {
        Self::new(&parse_records(bytes)?, record_index)
    }

    /// Guesses the allocation counter of a dump taken without one.
    ///
    /// Slot 0 carries the newest generation; the first slot that was never
    /// written, or that holds another sequence number, is where the next write
    /// would land. Only the generation modulo 16 matters to [`BufferView::new`],
    /// so a sequence number that wrapped to 0 is lifted by 16 generations.
    ///
    /// The guess is exact unless a writer dropped its slot mid-record, in which
    /// case the newest records past that slot are left out of the view.
    pub fn infer_index(records: &[RawRecord]) -> u32 {
        let count = records.len() as u32;
        let Some(head) = records.first() else {
            return 0;
        };
        let blank = RawRecord::default();
        let generation = head.sequence() as u32;
        let boundary = records
            .iter()
            .position(|r| *r == blank || r.sequence() != head.sequence());
        match boundary {
            Some(p) if records[p] == blank => (generation * count).wrapping_add(p as u32),
            Some(p) if generation == 0 => (16 * count).wrapping_add(p as u32),
            Some(p) => (generation * count).wrapping_add(p as u32),
            None => (generation * count).wrapping_add(count),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Rebuilds events. Chains missing their head or tail are discarded.
    pub fn assemble(&self) -> Vec<Event> {
        let mut events = Vec::new();
        let mut open: HashMap<u8, Chain> = HashMap::new();

        for entry in &self.entries {
            let rec = entry.record;
            let ctx = rec.dlen_or_context();
            match (rec.first(), rec.last()) {
                (true, true) => {
                    let dlen = ctx as usize;
                    let payload = if (1..8).contains(&dlen) {
                        Payload::Data(rec.payload()[..dlen].to_vec())
                    } else {
                        Payload::Values2([rec.value1(), rec.value2()])
                    };
                    events.push(event(&rec, payload));
                }
                (true, false) => {
                    if open.insert(ctx, Chain::new(rec)).is_some() {
                        tracing::debug!("Chain {} restarted before its last record", ctx);
                    }
                }
                (false, false) => {
                    if rec.component_id() != component::EVENT {
                        events.push(event(&rec, Payload::Data(Vec::new())));
                    } else if let Some(chain) = open
                        .get_mut(&ctx)
                        .filter(|chain| chain.next_message == rec.message_id())
                    {
                        chain.push(&rec);
                    } else {
                        open.remove(&ctx);
                    }
                }
                (false, true) => {
                    let Some(chain) = open.remove(&ctx) else {
                        continue;
                    };
                    if let Some(done) = chain.finish(&rec) {
                        events.push(done);
                    }
                }
            }
        }
        events
    }
}

/// Splits a dump into records.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<RawRecord>, ReaderError> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(ReaderError::Misaligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut raw = [0u8; RECORD_SIZE];
            raw.copy_from_slice(chunk);
            RawRecord::from_le_bytes(&raw)
        })
        .collect())
}

fn event(rec: &RawRecord, payload: Payload) -> Event {
    Event {
        id: rec.id(),
        timestamp: rec.timestamp(),
        irq: rec.irq(),
        payload,
    }
}

struct Chain {
    head: RawRecord,
    bytes: Vec<u8>,
    next_message: u8,
}

impl Chain {
    fn new(head: RawRecord) -> Self {
        Self {
            head,
            bytes: head.payload().to_vec(),
            next_message: 1,
        }
    }

    fn push(&mut self, rec: &RawRecord) {
        self.bytes.extend_from_slice(&rec.payload());
        self.next_message = self.next_message.wrapping_add(1);
    }

    fn finish(mut self, last: &RawRecord) -> Option<Event> {
        if last.message_id() != self.next_message {
            return None;
        }
        let payload = match last.component_id() {
            0 if self.next_message == 1 => Payload::Values4([
                self.head.value1(),
                self.head.value2(),
                last.value1(),
                last.value2(),
            ]),
            len @ 1..=8 => {
                self.bytes.extend_from_slice(&last.payload()[..len as usize]);
                Payload::Data(self.bytes)
            }
            _ => return None,
        };
        Some(event(&self.head, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{EventId, Level, RecordingMask};
    use crate::record::{CTX_POS, FIRST, LAST};
    use crate::recorder::{EventRecorder, RecorderConfig, RecorderMemory};
    use crate::timestamp::ManualClock;

    fn view(recorder: &EventRecorder<'_, ManualClock, 16>) -> BufferView {
        let records: Vec<_> = recorder.records().collect();
        BufferView::new(&records, recorder.stats().record_index).unwrap()
    }

    fn recorder(memory: &RecorderMemory<16>) -> EventRecorder<'_, ManualClock, 16> {
        let recorder = EventRecorder::new(memory, ManualClock::new(1), RecorderConfig::new());
        recorder.initialize(RecordingMask::ALL, true).unwrap();
        recorder
    }

    #[test]
    fn test_assembles_every_payload_kind() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        recorder.record2(EventId::new(Level::Op, 1, 1), 10, 20).unwrap();
        recorder.record4(EventId::new(Level::Op, 1, 2), 1, 2, 3, 4).unwrap();
        recorder.record_data(EventId::new(Level::Op, 1, 3), b"hi").unwrap();
        recorder.record_data(EventId::new(Level::Op, 1, 4), &[]).unwrap();

        let events = view(&recorder).assemble();
        let payloads: Vec<_> = events[2..].iter().map(|e| (e.id, e.payload.clone())).collect();
        assert_eq!(
            payloads,
            vec![
                (0x0101, Payload::Values2([10, 20])),
                (0x0102, Payload::Values4([1, 2, 3, 4])),
                (0x0103, Payload::Data(b"hi".to_vec())),
                (0x0104, Payload::Data(Vec::new())),
            ]
        );
    }

    #[test]
    fn test_interleaved_chains_reassembled() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        let ctx = |c: u32| c << CTX_POS;
        let write = |bits: u32, v1: u32, v2: u32| {
            assert!(memory.store.write(&memory.status.record_index, bits, 0, v1, v2));
        };

        // 20 bytes on context 1, preempted after its head by a four-value event
        // on context 2 and a 12-byte payload on context 3.
        write(0x0103 | ctx(1) | FIRST, 0x0403_0201, 0x0807_0605);
        write(0x0104 | ctx(2) | FIRST, 1, 2);
        write(0x0105 | ctx(3) | FIRST, 0x6463_6261, 0x6867_6665);
        write(0x0001 | ctx(2) | LAST, 3, 4);
        write(0x0001 | (4 << 8) | ctx(3) | LAST, 0x6C6B_6A69, 0);
        write(0xFF01 | ctx(1), 0x0C0B_0A09, 0x100F_0E0D);
        write(0x0002 | (4 << 8) | ctx(1) | LAST, 0x1413_1211, 0);

        let events = view(&recorder).assemble();
        let payloads: Vec<_> = events[2..].iter().map(|e| (e.id, e.payload.clone())).collect();
        assert_eq!(
            payloads,
            vec![
                (0x0104, Payload::Values4([1, 2, 3, 4])),
                (0x0105, Payload::Data(b"abcdefghijkl".to_vec())),
                (0x0103, Payload::Data((1..=20).collect())),
            ]
        );
    }

    #[test]
    fn test_eight_byte_payload_reads_as_two_words() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        recorder
            .record_data(EventId::new(Level::Op, 1, 6), &[1, 0, 0, 0, 2, 0, 0, 0])
            .unwrap();

        let rec = recorder.record_at(2);
        assert_eq!(rec.dlen_or_context(), 0);
        assert!(rec.first() && rec.last());
        let events = view(&recorder).assemble();
        assert_eq!(events.last().map(|e| &e.payload), Some(&Payload::Values2([1, 2])));
    }

    #[test]
    fn test_long_payload_reassembled() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        let payload: Vec<u8> = (1..=20).collect();
        recorder.record_data(EventId::new(Level::Api, 7, 9), &payload).unwrap();

        let events = view(&recorder).assemble();
        assert_eq!(events.last().map(|e| &e.payload), Some(&Payload::Data(payload)));
        assert_eq!(events.last().map(|e| e.id), Some(0x0709));
    }

    #[test]
    fn test_overwritten_head_drops_chain() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        // INIT, START and a 3-record chain at positions 2..=4, then enough
        // singles that only the chain's middle and last records survive.
        recorder.record_data(EventId::new(Level::Op, 2, 0), &[0xAB; 20]).unwrap();
        for i in 0..14 {
            recorder.record2(EventId::new(Level::Op, 3, i), i as u32, 0).unwrap();
        }

        let view = view(&recorder);
        assert_eq!(view.entries().len(), 16);
        assert_eq!(view.entries()[0].position, 3);
        let events = view.assemble();
        assert!(events.iter().all(|e| e.id >> 8 == 3));
        assert_eq!(events.len(), 14);
    }

    #[test]
    fn test_stale_generation_is_skipped() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        let records: Vec<_> = recorder.records().collect();
        // Claim one more generation than was written: every slot is now stale.
        let view = BufferView::new(&records, 16 + 2).unwrap();
        assert!(view.entries().is_empty());
    }

    #[test]
    fn test_infer_index_matches_recorder() {
        let memory = RecorderMemory::<16>::new();
        let recorder = recorder(&memory);
        let records: Vec<_> = recorder.records().collect();
        assert_eq!(BufferView::infer_index(&records), 2);
        assert_eq!(BufferView::infer_index(&records), recorder.stats().record_index);
        assert_eq!(BufferView::infer_index(&[RawRecord::default(); 16]), 0);

        // Second generation, part way through the ring.
        for i in 0..20 {
            recorder.record2(EventId::new(Level::Op, 4, i), 0, 0).unwrap();
        }
        let records: Vec<_> = recorder.records().collect();
        let index = BufferView::infer_index(&records);
        assert_eq!(index, recorder.stats().record_index);
        assert_eq!(
            BufferView::new(&records, index).unwrap().entries().len(),
            16
        );
    }

    #[test]
    fn test_dump_must_be_whole_records() {
        assert_eq!(
            BufferView::from_bytes(&[0u8; 17], 0).unwrap_err(),
            ReaderError::Misaligned { len: 17 }
        );
        assert_eq!(
            BufferView::from_bytes(&[0u8; 48], 0).unwrap_err(),
            ReaderError::BadRecordCount { count: 3 }
        );
    }
}
