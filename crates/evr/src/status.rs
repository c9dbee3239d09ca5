// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crc::{Crc, CRC_16_IBM_3740};

use crate::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

/// Written on cold start. A mismatch on the next initialize means the memory was not ours.
pub const SIGNATURE: u32 = 0xE1A5_276B;

pub const PROTOCOL_TYPE: u8 = 1;
pub const PROTOCOL_VERSION: u16 = 0x0101;

pub(crate) const STATE_STOPPED: u8 = 0;
pub(crate) const STATE_RUNNING: u8 = 1;

// CCITT: poly 0x1021, init 0xFFFF, MSB first, no final XOR.
const DESCRIPTOR_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Recorder bookkeeping. Lives next to the buffer in memory that survives a reset.
#[derive(Debug)]
#[repr(C)]
pub struct RecorderStatus {
    pub(crate) state: AtomicU8,
    pub(crate) context: AtomicU8,
    pub(crate) info_crc: AtomicU16,
    pub(crate) record_index: AtomicU32,
    pub(crate) records_written: AtomicU32,
    pub(crate) records_dumped: AtomicU32,
    pub(crate) ts_frequency: AtomicU32,
    pub(crate) init_count: AtomicU32,
    pub(crate) signature: AtomicU32,
}

impl RecorderStatus {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_STOPPED),
            context: AtomicU8::new(0),
            info_crc: AtomicU16::new(0),
            record_index: AtomicU32::new(0),
            records_written: AtomicU32::new(0),
            records_dumped: AtomicU32::new(0),
            ts_frequency: AtomicU32::new(0),
            init_count: AtomicU32::new(0),
            signature: AtomicU32::new(0),
        }
    }

    /// True when signature and descriptor CRC both match, i.e. the previous
    /// contents belong to this firmware image.
    pub(crate) fn is_warm(&self, descriptor_crc: u16) -> bool {
        self.signature.load(Ordering::Acquire) == SIGNATURE
            && self.info_crc.load(Ordering::Acquire) == descriptor_crc
    }

    pub(crate) fn cold_reset(&self, descriptor_crc: u16) {
        self.context.store(0, Ordering::Relaxed);
        self.record_index.store(0, Ordering::Relaxed);
        self.records_written.store(0, Ordering::Relaxed);
        self.records_dumped.store(0, Ordering::Relaxed);
        self.ts_frequency.store(0, Ordering::Relaxed);
        self.init_count.store(1, Ordering::Relaxed);
        self.info_crc.store(descriptor_crc, Ordering::Relaxed);
        self.signature.store(SIGNATURE, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_RUNNING
    }
}

impl Default for RecorderStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Static description of a recorder instance, what host tooling needs to find the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderInfo {
    pub record_count: u32,
    pub buffer_address: usize,
    pub filter_address: usize,
    pub status_address: usize,
    pub timestamp_source: u32,
}

impl RecorderInfo {
    /// CRC16 over the descriptor. Relinking the image or resizing the buffer changes it.
    pub fn crc(&self) -> u16 {
        let mut digest = DESCRIPTOR_CRC.digest();
        digest.update(&[PROTOCOL_TYPE, 0]);
        digest.update(&PROTOCOL_VERSION.to_le_bytes());
        digest.update(&self.record_count.to_le_bytes());
        digest.update(&self.buffer_address.to_le_bytes());
        digest.update(&self.filter_address.to_le_bytes());
        digest.update(&self.status_address.to_le_bytes());
        digest.update(&self.timestamp_source.to_le_bytes());
        digest.finalize()
    }
}

/// Point-in-time copy of the status counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stats {
    pub running: bool,
    pub record_index: u32,
    pub records_written: u32,
    pub records_dumped: u32,
    pub ts_overflow: u32,
    pub ts_frequency: u32,
    pub ts_last: u32,
    pub init_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> RecorderInfo {
        RecorderInfo {
            record_count: 64,
            buffer_address: 0x2000_0000,
            filter_address: 0x2000_0400,
            status_address: 0x2000_0480,
            timestamp_source: 0,
        }
    }

    #[test]
    fn test_crc16_ccitt_check_value() {
        assert_eq!(DESCRIPTOR_CRC.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_descriptor_crc_tracks_layout() {
        let base = info();
        let moved = RecorderInfo {
            buffer_address: 0x2000_1000,
            ..base
        };
        let resized = RecorderInfo {
            record_count: 128,
            ..base
        };
        assert_eq!(base.crc(), info().crc());
        assert_ne!(base.crc(), moved.crc());
        assert_ne!(base.crc(), resized.crc());
    }

    #[test]
    fn test_warm_requires_signature_and_crc() {
        let status = RecorderStatus::new();
        assert!(!status.is_warm(0));
        status.cold_reset(0x1234);
        assert!(status.is_warm(0x1234));
        assert!(!status.is_warm(0x1235));
        assert_eq!(status.init_count.load(Ordering::Relaxed), 1);
    }
}
