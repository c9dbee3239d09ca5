// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Start/stop markers for execution time statistics.
//!
//! Four groups of sixteen slots. A host tool pairs every stop with the matching
//! start and reports min/max/average durations per slot.

use core::panic::Location;

use crate::id::{component, EventId, Level};
use crate::recorder::EventRecorder;
use crate::timestamp::TimestampSource;
use crate::RecorderResult;

pub const SLOTS_PER_GROUP: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Group {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

const STOP_FLAG: u8 = 0x20;

/// `0xEF00 | group << 6 | stop << 5 | slot`, slot truncated to four bits.
pub const fn statistics_id(group: Group, slot: u8, stop: bool) -> EventId {
    let stop = if stop { STOP_FLAG } else { 0 };
    let message = ((group as u8) << 6) | stop | (slot & 0x0F);
    EventId::new(Level::Op, component::STATISTICS, message)
}

impl<'m, T: TimestampSource, const N: usize> EventRecorder<'m, T, N> {
    /// Marks the start of `slot`, tagged with the caller's file and line.
    #[track_caller]
    pub fn event_start(&self, group: Group, slot: u8) -> RecorderResult {
        let (file, line) = caller();
        self.record2(statistics_id(group, slot, false), file, line)
    }

    /// Marks the end of `slot`. Stopping slot 15 also closes slots 0..=14 of the group.
    #[track_caller]
    pub fn event_stop(&self, group: Group, slot: u8) -> RecorderResult {
        let (file, line) = caller();
        self.record2(statistics_id(group, slot, true), file, line)
    }

    pub fn event_start_values(&self, group: Group, slot: u8, value1: u32, value2: u32) -> RecorderResult {
        self.record2(statistics_id(group, slot, false), value1, value2)
    }

    pub fn event_stop_values(&self, group: Group, slot: u8, value1: u32, value2: u32) -> RecorderResult {
        self.record2(statistics_id(group, slot, true), value1, value2)
    }
}

// The file name pointer is only meaningful to a debugger reading the same image.
#[track_caller]
fn caller() -> (u32, u32) {
    let location = Location::caller();
    (location.file().as_ptr() as usize as u32, location.line())
}
