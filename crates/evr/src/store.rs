// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::atomic::{atomic_increment, update_if, AtomicU32, Ordering};
use crate::record::{self, RawRecord, LOCKED, TBIT, VALID};

/// Slots tried before an event is counted as dumped.
pub const MAX_LOCK_ATTEMPTS: usize = 7;

#[derive(Debug)]
#[repr(C, align(16))]
struct Slot {
    ts: AtomicU32,
    val1: AtomicU32,
    val2: AtomicU32,
    info: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            ts: AtomicU32::new(0),
            val1: AtomicU32::new(0),
            val2: AtomicU32::new(0),
            info: AtomicU32::new(0),
        }
    }

    /// Claims the slot unless another writer holds it. Keeps the old toggle bit.
    fn lock(&self, info: u32) -> Option<u32> {
        update_if(&self.info, |current| {
            (current & LOCKED == 0).then_some((current & TBIT) | info)
        })
    }

    fn unlock(&self, published: u32) -> bool {
        update_if(&self.info, |current| (current & LOCKED != 0).then_some(published)).is_some()
    }

    fn snapshot(&self) -> RawRecord {
        let info = self.info.load(Ordering::Acquire);
        RawRecord {
            ts: self.ts.load(Ordering::Relaxed),
            val1: self.val1.load(Ordering::Relaxed),
            val2: self.val2.load(Ordering::Relaxed),
            info,
        }
    }

    fn clear(&self) {
        self.ts.store(0, Ordering::Relaxed);
        self.val1.store(0, Ordering::Relaxed);
        self.val2.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Release);
    }
}

/// Fixed ring of `N` records. `N` is a power of two between 8 and 2^20.
#[derive(Debug)]
pub struct RecordStore<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> RecordStore<N> {
    const SIZE_OK: () = assert!(
        N.is_power_of_two() && N >= 8 && N <= (1 << 20),
        "record count must be a power of two between 8 and 2^20"
    );

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_OK;
        Self {
            slots: [const { Slot::new() }; N],
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Allocates a slot through `index` and publishes one record into it.
    ///
    /// Gives up after [`MAX_LOCK_ATTEMPTS`] locked slots, or as soon as the final
    /// unlock finds its slot no longer locked. Never blocks.
    pub fn write(&self, index: &AtomicU32, id_bits: u32, ts: u32, val1: u32, val2: u32) -> bool {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let allocation = atomic_increment(index);
            let slot = &self.slots[allocation as usize & (N - 1)];
            let info = record::locked_info(id_bits, allocation / N as u32, ts, val1, val2);

            let Some(locked) = slot.lock(info) else {
                continue;
            };

            let published = locked ^ LOCKED ^ TBIT;
            let toggle = published & TBIT;
            slot.ts.store(record::fold_toggle(ts, toggle), Ordering::Relaxed);
            slot.val1.store(record::fold_toggle(val1, toggle), Ordering::Relaxed);
            slot.val2.store(record::fold_toggle(val2, toggle), Ordering::Relaxed);

            return slot.unlock(published);
        }
        false
    }

    /// Cold start: forget everything.
    pub fn clear(&self) {
        self.slots.iter().for_each(Slot::clear);
    }

    /// Warm start: a reset may have interrupted writers, drop their half-written slots.
    ///
    /// Returns how many slots were released.
    pub fn release_stale(&self) -> usize {
        let mut released = 0;
        for slot in &self.slots {
            if slot.info.load(Ordering::Acquire) & LOCKED != 0 {
                slot.info.fetch_and(!(LOCKED | VALID), Ordering::AcqRel);
                released += 1;
            }
        }
        released
    }

    pub fn snapshot(&self, slot: usize) -> RawRecord {
        self.slots[slot & (N - 1)].snapshot()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord> + '_ {
        self.slots.iter().map(Slot::snapshot)
    }

    /// Marks slot `slot & (N - 1)` locked, as a writer stalled mid-record would leave it.
    #[cfg(any(test, feature = "test-util"))]
    pub fn hold(&self, slot: usize) {
        self.slots[slot & (N - 1)].info.fetch_or(LOCKED, Ordering::AcqRel);
    }
}

impl<const N: usize> Default for RecordStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FIRST, LAST};

    #[test]
    fn test_write_publishes_consistent_record() {
        let store = RecordStore::<8>::new();
        let index = AtomicU32::new(0);

        assert!(store.write(&index, 0x0102 | FIRST | LAST, 0x8000_0001, 0xFFFF_FFFF, 7));
        let rec = store.snapshot(0);
        assert!(rec.is_consistent());
        assert_eq!(rec.id(), 0x0102);
        assert_eq!(rec.timestamp(), 0x8000_0001);
        assert_eq!(rec.value1(), 0xFFFF_FFFF);
        assert_eq!(rec.value2(), 7);
        assert_eq!(index.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_wrap_sets_sequence_and_flips_toggle() {
        let store = RecordStore::<8>::new();
        let index = AtomicU32::new(0);

        for i in 0..9 {
            assert!(store.write(&index, 0x0100 | i, i, 0, 0));
        }
        let wrapped = store.snapshot(0);
        assert_eq!(wrapped.message_id(), 8);
        assert_eq!(wrapped.sequence(), 1);
        // Second generation in slot 0: toggle back to zero.
        assert_eq!(wrapped.info & TBIT, 0);
        assert!(wrapped.is_consistent());
        assert_eq!(store.snapshot(1).sequence(), 0);
    }

    #[test]
    fn test_locked_slots_are_skipped() {
        let store = RecordStore::<8>::new();
        let index = AtomicU32::new(0);
        store.hold(0);
        store.hold(1);

        assert!(store.write(&index, 0x0203, 1, 2, 3));
        assert_eq!(index.load(Ordering::Relaxed), 3);
        assert_eq!(store.snapshot(2).id(), 0x0203);
        assert!(store.snapshot(0).locked());
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let store = RecordStore::<8>::new();
        let index = AtomicU32::new(0);
        for slot in 0..MAX_LOCK_ATTEMPTS {
            store.hold(slot);
        }

        assert!(!store.write(&index, 0x0203, 1, 2, 3));
        assert_eq!(index.load(Ordering::Relaxed), MAX_LOCK_ATTEMPTS as u32);
        // Nothing half-written: held slots stay in flight, the free one untouched.
        assert!(store.records().take(MAX_LOCK_ATTEMPTS).all(|r| r.locked()));
        assert_eq!(store.snapshot(7), RawRecord::default());
    }

    #[test]
    fn test_release_stale_drops_in_flight_slots() {
        let store = RecordStore::<8>::new();
        let index = AtomicU32::new(0);
        assert!(store.write(&index, 0x0101, 0, 0, 0));
        store.hold(3);

        assert_eq!(store.release_stale(), 1);
        let stale = store.snapshot(3);
        assert!(!stale.locked());
        assert!(!stale.valid());
        assert!(store.snapshot(0).is_consistent());
    }
}
