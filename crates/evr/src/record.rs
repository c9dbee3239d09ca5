// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bit layout of one 16-byte record.
//!
//! ```text
//! word 0  timestamp  [30:0] value, [31] toggle
//! word 1  value1     [30:0] value, [31] toggle
//! word 2  value2     [30:0] value, [31] toggle
//! word 3  info       see the constants below
//! ```
//!
//! The real MSB of each data word travels in the matching `MSB_*` flag of the info
//! word. A reader accepts a slot only when all three toggles agree with `TBIT`.

pub const RECORD_SIZE: usize = 16;

pub const MESSAGE_MASK: u32 = 0x0000_00FF;
pub const COMPONENT_MASK: u32 = 0x0000_FF00;
pub const COMPONENT_POS: u32 = 8;
/// Message and component together.
pub const ID_MASK: u32 = 0x0000_FFFF;
/// Data length of a single-record payload, or the context id of a chained one.
pub const DLEN_MASK: u32 = 0x0007_0000;
pub const DLEN_POS: u32 = 16;
pub const CTX_MASK: u32 = DLEN_MASK;
pub const CTX_POS: u32 = DLEN_POS;
pub const IRQ: u32 = 0x0008_0000;
pub const SEQ_MASK: u32 = 0x00F0_0000;
pub const SEQ_POS: u32 = 20;
pub const FIRST: u32 = 0x0100_0000;
pub const LAST: u32 = 0x0200_0000;
pub const LOCKED: u32 = 0x0400_0000;
pub const VALID: u32 = 0x0800_0000;
pub const MSB_TS: u32 = 0x1000_0000;
pub const MSB_VAL1: u32 = 0x2000_0000;
pub const MSB_VAL2: u32 = 0x4000_0000;
pub const TBIT: u32 = 0x8000_0000;

/// Info word written while a slot is being filled. The toggle bit is left clear;
/// the store merges it from the slot's previous content.
#[inline]
pub const fn locked_info(id_bits: u32, sequence: u32, ts: u32, val1: u32, val2: u32) -> u32 {
    id_bits
        | ((sequence << SEQ_POS) & SEQ_MASK)
        | ((ts >> 3) & MSB_TS)
        | ((val1 >> 2) & MSB_VAL1)
        | ((val2 >> 1) & MSB_VAL2)
        | VALID
        | LOCKED
}

/// Replaces the MSB of a data word with the toggle bit.
#[inline]
pub const fn fold_toggle(word: u32, toggle: u32) -> u32 {
    (word & !TBIT) | (toggle & TBIT)
}

/// Rebuilds a data word from its stored form and the carry flag in `info`.
#[inline]
pub const fn restore_msb(stored: u32, info: u32, carry: u32) -> u32 {
    let shift = match carry {
        MSB_TS => 3,
        MSB_VAL1 => 2,
        _ => 1,
    };
    (stored & !TBIT) | ((info & carry) << shift)
}

/// A record as it sits in memory, before the toggle bits are stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RawRecord {
    pub ts: u32,
    pub val1: u32,
    pub val2: u32,
    pub info: u32,
}

impl RawRecord {
    pub fn from_le_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            ts: word(0),
            val1: word(4),
            val2: word(8),
            info: word(12),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..4].copy_from_slice(&self.ts.to_le_bytes());
        out[4..8].copy_from_slice(&self.val1.to_le_bytes());
        out[8..12].copy_from_slice(&self.val2.to_le_bytes());
        out[12..16].copy_from_slice(&self.info.to_le_bytes());
        out
    }

    pub fn message_id(&self) -> u8 {
        (self.info & MESSAGE_MASK) as u8
    }

    pub fn component_id(&self) -> u8 {
        ((self.info & COMPONENT_MASK) >> COMPONENT_POS) as u8
    }

    pub fn id(&self) -> u16 {
        (self.info & ID_MASK) as u16
    }

    /// DLEN for single-record payloads, context id for chained ones.
    pub fn dlen_or_context(&self) -> u8 {
        ((self.info & DLEN_MASK) >> DLEN_POS) as u8
    }

    pub fn sequence(&self) -> u8 {
        ((self.info & SEQ_MASK) >> SEQ_POS) as u8
    }

    pub fn irq(&self) -> bool {
        self.info & IRQ != 0
    }

    pub fn first(&self) -> bool {
        self.info & FIRST != 0
    }

    pub fn last(&self) -> bool {
        self.info & LAST != 0
    }

    pub fn locked(&self) -> bool {
        self.info & LOCKED != 0
    }

    pub fn valid(&self) -> bool {
        self.info & VALID != 0
    }

    /// Published, not in flight, and every data word carries the same toggle.
    pub fn is_consistent(&self) -> bool {
        if !self.valid() || self.locked() {
            return false;
        }
        let toggle = self.info & TBIT;
        [self.ts, self.val1, self.val2]
            .iter()
            .all(|word| word & TBIT == toggle)
    }

    pub fn timestamp(&self) -> u32 {
        restore_msb(self.ts, self.info, MSB_TS)
    }

    pub fn value1(&self) -> u32 {
        restore_msb(self.val1, self.info, MSB_VAL1)
    }

    pub fn value2(&self) -> u32 {
        restore_msb(self.val2, self.info, MSB_VAL2)
    }

    /// The eight payload bytes in memory order.
    pub fn payload(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.value1().to_le_bytes());
        out[4..].copy_from_slice(&self.value2().to_le_bytes());
        out
    }
}
