// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::atomic::{AtomicU8, Ordering};
use crate::id::RecordingMask;

pub const FILTER_BYTES: usize = 128;
const BYTES_PER_LEVEL: usize = 32;

/// One bit per (level, component): byte `level * 32 + component / 8`, bit `component % 8`.
#[derive(Debug)]
pub struct FilterTable {
    bits: [AtomicU8; FILTER_BYTES],
}

impl FilterTable {
    pub const fn new() -> Self {
        Self {
            bits: [const { AtomicU8::new(0) }; FILTER_BYTES],
        }
    }

    pub fn clear(&self) {
        for byte in &self.bits {
            byte.store(0, Ordering::Relaxed);
        }
    }

    /// Level and component are taken from bits [17:8] of the event id.
    #[inline]
    pub fn allows(&self, id: u32) -> bool {
        let byte = ((id >> 11) & 0x7F) as usize;
        let bit = (id >> 8) & 7;
        (self.bits[byte].load(Ordering::Relaxed) >> bit) & 1 != 0
    }

    /// Sets or clears `start..=end` for every level in `levels`. An empty range is a no-op.
    pub fn set_range(&self, levels: RecordingMask, start: u8, end: u8, enable: bool) {
        for level in 0..4usize {
            if levels.bits() & (1 << level) == 0 {
                continue;
            }
            for component in start..=end {
                let byte = &self.bits[level * BYTES_PER_LEVEL + component as usize / 8];
                let mask = 1u8 << (component % 8);
                if enable {
                    byte.fetch_or(mask, Ordering::Relaxed);
                } else {
                    byte.fetch_and(!mask, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn snapshot(&self) -> [u8; FILTER_BYTES] {
        let mut out = [0u8; FILTER_BYTES];
        for (dst, src) in out.iter_mut().zip(&self.bits) {
            *dst = src.load(Ordering::Relaxed);
        }
        out
    }
}

impl Default for FilterTable {
    fn default() -> Self {
        Self::new()
    }
}
