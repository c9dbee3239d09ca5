// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The persistent fault record and its byte layout.
//!
//! All fields are little-endian 32-bit words except the version bytes and the
//! content flags:
//!
//! ```text
//!   0  magic            4  crc32          8  count
//!  12  version.minor   13  version.major  14  content (u16)
//!  16  R0..R12         68  LR            72  return address   76  xPSR
//!  80  MSP             84  PSP           88  MSPLIM           92  PSPLIM
//!  96  exception xPSR 100  EXC_RETURN
//! 104  CFSR HFSR DFSR MMFAR BFAR AFSR SFSR SFAR RFSR
//! ```
//!
//! The CRC covers bytes 8..140.

use bitflags::bitflags;
use crc::{Crc, CRC_32_MPEG_2};

use crate::{FaultInfoError, LayoutError};

/// `"FltR"` read as a little-endian word.
pub const FAULT_MAGIC: u32 = 0x5274_6C46;
pub const FAULT_INFO_SIZE: usize = 140;

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

const CRC_START: usize = 8;
const FAULT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

bitflags! {
    /// Which parts of the record hold captured data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct Content: u16 {
        /// The core implements CFSR/HFSR/DFSR/MMFAR/BFAR/AFSR.
        const FAULT_REGS_EXIST = 1 << 0;
        const ARMV8M_MAIN = 1 << 1;
        const TZ_ENABLED = 1 << 2;
        /// Captured from Secure code.
        const TZ_SAVED_SECURE = 1 << 3;
        /// The faulting context was Secure.
        const TZ_FAULT_SECURE = 1 << 4;
        /// R0-R3, R12, LR, return address and xPSR came from the stack frame.
        const STATE_CONTEXT = 1 << 5;
        /// R4-R11 came from an integrity-checked additional state context.
        const ADDITIONAL_CONTEXT = 1 << 6;
        const LIMIT_REGS = 1 << 7;
        const FAULT_REGS = 1 << 8;
        const SECURE_FAULT_REGS = 1 << 9;
        const RAS_FAULT_REG = 1 << 10;
        const ARMV8M_BASE = 1 << 11;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(C)]
pub struct Version {
    pub minor: u8,
    pub major: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(C)]
pub struct Registers {
    pub r: [u32; 13],
    pub lr: u32,
    pub return_address: u32,
    pub xpsr: u32,
    pub msp: u32,
    pub psp: u32,
    pub msplim: u32,
    pub psplim: u32,
}

/// Handler-side state at the time of capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(C)]
pub struct ExceptionState {
    pub xpsr: u32,
    pub exc_return: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(C)]
pub struct FaultRegisters {
    pub cfsr: u32,
    pub hfsr: u32,
    pub dfsr: u32,
    pub mmfar: u32,
    pub bfar: u32,
    pub afsr: u32,
    pub sfsr: u32,
    pub sfar: u32,
    pub rfsr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(C)]
pub struct FaultInfo {
    pub magic: u32,
    pub crc32: u32,
    /// Faults captured since the record was last cleared.
    pub count: u32,
    pub version: Version,
    pub content: Content,
    pub registers: Registers,
    pub exception: ExceptionState,
    pub fault_regs: FaultRegisters,
}

const _: () = assert!(core::mem::size_of::<FaultInfo>() == FAULT_INFO_SIZE);

impl FaultInfo {
    /// An all-zero record, which reads as "no fault saved".
    pub const fn empty() -> Self {
        Self {
            magic: 0,
            crc32: 0,
            count: 0,
            version: Version { minor: 0, major: 0 },
            content: Content::empty(),
            registers: Registers {
                r: [0; 13],
                lr: 0,
                return_address: 0,
                xpsr: 0,
                msp: 0,
                psp: 0,
                msplim: 0,
                psplim: 0,
            },
            exception: ExceptionState { xpsr: 0, exc_return: 0 },
            fault_regs: FaultRegisters {
                cfsr: 0,
                hfsr: 0,
                dfsr: 0,
                mmfar: 0,
                bfar: 0,
                afsr: 0,
                sfsr: 0,
                sfar: 0,
                rfsr: 0,
            },
        }
    }

    pub fn to_bytes(&self) -> [u8; FAULT_INFO_SIZE] {
        let mut out = [0u8; FAULT_INFO_SIZE];
        let mut w = Writer { buf: &mut out, pos: 0 };
        w.word(self.magic);
        w.word(self.crc32);
        w.word(self.count);
        w.byte(self.version.minor);
        w.byte(self.version.major);
        w.half(self.content.bits());
        let regs = &self.registers;
        for r in regs.r {
            w.word(r);
        }
        for word in [
            regs.lr,
            regs.return_address,
            regs.xpsr,
            regs.msp,
            regs.psp,
            regs.msplim,
            regs.psplim,
            self.exception.xpsr,
            self.exception.exc_return,
        ] {
            w.word(word);
        }
        let f = &self.fault_regs;
        for word in [f.cfsr, f.hfsr, f.dfsr, f.mmfar, f.bfar, f.afsr, f.sfsr, f.sfar, f.rfsr] {
            w.word(word);
        }
        out
    }

    /// Parses a dump. Only the length is checked, see [`FaultInfo::validate`].
    /// Bytes past the record are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < FAULT_INFO_SIZE {
            return Err(LayoutError::Truncated { len: bytes.len() });
        }
        let mut r = Reader { buf: bytes, pos: 0 };
        let mut info = Self::empty();
        info.magic = r.word();
        info.crc32 = r.word();
        info.count = r.word();
        info.version.minor = r.byte();
        info.version.major = r.byte();
        info.content = Content::from_bits_retain(r.half());
        let regs = &mut info.registers;
        for slot in regs.r.iter_mut() {
            *slot = r.word();
        }
        regs.lr = r.word();
        regs.return_address = r.word();
        regs.xpsr = r.word();
        regs.msp = r.word();
        regs.psp = r.word();
        regs.msplim = r.word();
        regs.psplim = r.word();
        info.exception.xpsr = r.word();
        info.exception.exc_return = r.word();
        let f = &mut info.fault_regs;
        f.cfsr = r.word();
        f.hfsr = r.word();
        f.dfsr = r.word();
        f.mmfar = r.word();
        f.bfar = r.word();
        f.afsr = r.word();
        f.sfsr = r.word();
        f.sfar = r.word();
        f.rfsr = r.word();
        Ok(info)
    }

    /// CRC-32/MPEG-2 over everything after the CRC field.
    pub fn compute_crc(&self) -> u32 {
        FAULT_CRC.checksum(&self.to_bytes()[CRC_START..])
    }

    /// Checks the magic, then the CRC, then the version.
    pub fn validate(&self) -> Result<(), FaultInfoError> {
        if self.magic != FAULT_MAGIC {
            return Err(FaultInfoError::MissingMagic);
        }
        let computed = self.compute_crc();
        if computed != self.crc32 {
            return Err(FaultInfoError::CrcMismatch {
                stored: self.crc32,
                computed,
            });
        }
        if self.version.major != VERSION_MAJOR {
            return Err(FaultInfoError::UnsupportedVersion {
                major: self.version.major,
                minor: self.version.minor,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Active exception number at capture time.
    pub fn exception_number(&self) -> u32 {
        self.exception.xpsr & crate::regs::IPSR_MASK
    }

    pub fn has(&self, content: Content) -> bool {
        self.content.contains(content)
    }
}

struct Writer<'a> {
    buf: &'a mut [u8; FAULT_INFO_SIZE],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn word(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn half(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    fn byte(&mut self, v: u8) {
        self.put(&[v]);
    }
}

// Callers guarantee at least FAULT_INFO_SIZE bytes.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const W: usize>(&mut self) -> [u8; W] {
        let mut out = [0u8; W];
        out.copy_from_slice(&self.buf[self.pos..self.pos + W]);
        self.pos += W;
        out
    }

    fn word(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn half(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn byte(&mut self) -> u8 {
        self.take::<1>()[0]
    }
}
