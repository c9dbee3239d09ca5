// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::fmt;

use bitflags::bitflags;

/// Severity level, bits [17:16] of an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Api = 1,
    Op = 2,
    Detail = 3,
}

impl Level {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Level::Error,
            1 => Level::Api,
            2 => Level::Op,
            _ => Level::Detail,
        }
    }

    pub const fn mask(self) -> RecordingMask {
        RecordingMask::from_bits_truncate(1 << self as u8)
    }
}

bitflags! {
    /// Which levels a filter operation applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct RecordingMask: u8 {
        const ERROR = 0x01;
        const API = 0x02;
        const OP = 0x04;
        const DETAIL = 0x08;
        const ALL = 0x0F;
    }
}

/// Reserved component numbers.
pub mod component {
    pub const FAULT: u8 = 0xEE;
    pub const STATISTICS: u8 = 0xEF;
    pub const PRINTF: u8 = 0xFE;
    /// The recorder's own INIT/START/STOP/CLOCK events.
    pub const EVENT: u8 = 0xFF;
}

/// `level << 16 | component << 8 | message`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventId(u32);

impl EventId {
    pub const fn new(level: Level, component: u8, message: u8) -> Self {
        Self(((level as u32) << 16) | ((component as u32) << 8) | message as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn level(self) -> Level {
        Level::from_bits((self.0 >> 16) as u8)
    }

    pub const fn component(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn message(self) -> u8 {
        self.0 as u8
    }

    /// Same level and component, message number moved by `offset`.
    pub const fn offset(self, offset: u8) -> Self {
        Self(self.0.wrapping_add(offset as u32))
    }
}

impl From<u32> for EventId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventId({:?}, {:#04x}, {:#04x})",
            self.level(),
            self.component(),
            self.message()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_layout() {
        let id = EventId::new(Level::Op, 0x12, 0x34);
        assert_eq!(id.raw(), 0x0002_1234);
        assert_eq!(id.level(), Level::Op);
        assert_eq!(id.component(), 0x12);
        assert_eq!(id.message(), 0x34);
        assert_eq!(id.offset(3).message(), 0x37);
    }

    #[test]
    fn test_level_mask() {
        assert_eq!(Level::Error.mask(), RecordingMask::ERROR);
        assert_eq!(Level::Detail.mask(), RecordingMask::DETAIL);
        assert!(RecordingMask::ALL.contains(Level::Api.mask()));
    }
}
