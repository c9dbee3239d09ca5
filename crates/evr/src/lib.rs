// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Event recorder for Cortex-M firmware.
//!
//! Events go into a fixed ring of 16-byte records that every thread and interrupt
//! can write concurrently without blocking. The ring, its status block and the
//! filter live in memory that survives a warm reset, so a debugger or the next
//! boot can read what happened before the reset.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod macros;

pub mod atomic;
pub mod filter;
pub mod id;
pub mod logfmt;
pub mod record;
pub mod recorder;
pub mod statistics;
pub mod status;
pub mod store;
pub mod timestamp;

#[cfg(feature = "std")]
pub mod reader;

pub use id::{component, EventId, Level, RecordingMask};
pub use recorder::{EventRecorder, RecorderConfig, RecorderMemory};
pub use status::Stats;
pub use timestamp::{ManualClock, Timestamp, TimestampSource};

#[cfg(all(target_arch = "arm", not(armv6m), not(armv8m_base)))]
pub use timestamp::DwtCycleCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    #[error("component range {start:#04x}..={end:#04x} outside 0x00..=0xFE")]
    InvalidComponentRange { start: u8, end: u8 },
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    DataTooLong { len: usize, max: usize },
    #[error("no free record slot, event dropped")]
    Dropped,
    #[error("timestamp source failed to start")]
    TimerSetup,
}

pub type RecorderResult<T = ()> = Result<T, RecorderError>;
