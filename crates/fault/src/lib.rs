// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cortex-M fault capture.
//!
//! The fault handler snapshots the CPU state into a [`FaultInfo`] record kept in
//! memory that survives a reset. After the reset the firmware can replay it into
//! the event recorder with [`record_fault`], and a host tool can decode a memory
//! dump of it with [`FaultInfo::from_bytes`] and [`print`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod capture;
pub mod decode;
pub mod info;
pub mod print;
pub mod record;
pub mod regs;

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(feature = "std")]
pub mod sim;

pub use capture::{ArchProfile, CpuAccess, EntryState, FaultExit, FaultStorage, SystemReset};
pub use decode::{causes, FaultCategory, FaultCause, FaultEntry};
pub use info::{Content, FaultInfo, FAULT_INFO_SIZE, FAULT_MAGIC};
pub use print::print;
pub use record::record_fault;

/// The buffer cannot hold a fault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("fault record needs 140 bytes, got {len}")]
    Truncated { len: usize },
}

/// Why a fault record cannot be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultInfoError {
    #[error("no fault saved")]
    MissingMagic,
    #[error("CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },
    #[error("unsupported fault record version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
}
