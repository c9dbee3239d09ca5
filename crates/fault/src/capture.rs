// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fault capture pipeline.
//!
//! Runs inside the fault handler with the stack possibly corrupt, so nothing
//! here allocates, logs or panics. The CPU is reached through [`CpuAccess`]:
//! [`crate::cortex_m::HardwareCpu`] on a target, [`crate::sim::SimulatedCore`]
//! on the host.

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::info::{
    Content, ExceptionState, FaultInfo, FaultRegisters, Registers, Version, FAULT_MAGIC,
    VERSION_MAJOR, VERSION_MINOR,
};
use crate::regs::{cfsr, ExcReturn, ADDITIONAL_CONTEXT_WORDS, BASIC_FRAME_WORDS, INTEGRITY_SIGNATURE};

/// What the core implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchProfile {
    /// CFSR, HFSR, DFSR, MMFAR, BFAR and AFSR are present.
    pub fault_registers: bool,
    pub armv8m_base: bool,
    pub armv8m_main: bool,
    /// Armv8.1-M Mainline, which adds the RAS fault status register.
    pub armv81m: bool,
    /// Built as TrustZone Secure code.
    pub secure: bool,
}

impl ArchProfile {
    pub const ARMV6M: Self = Self {
        fault_registers: false,
        armv8m_base: false,
        armv8m_main: false,
        armv81m: false,
        secure: false,
    };
    pub const ARMV7M: Self = Self {
        fault_registers: true,
        ..Self::ARMV6M
    };
    pub const ARMV8M_BASE: Self = Self {
        armv8m_base: true,
        ..Self::ARMV6M
    };
    pub const ARMV8M_MAIN: Self = Self {
        fault_registers: true,
        armv8m_main: true,
        ..Self::ARMV6M
    };
    pub const ARMV81M_MAIN: Self = Self {
        armv81m: true,
        ..Self::ARMV8M_MAIN
    };

    pub const fn with_secure(self) -> Self {
        Self { secure: true, ..self }
    }

    pub const fn armv8m(&self) -> bool {
        self.armv8m_base || self.armv8m_main
    }

    fn content(&self) -> Content {
        let mut content = Content::empty();
        content.set(Content::FAULT_REGS_EXIST, self.fault_registers);
        content.set(Content::ARMV8M_MAIN, self.armv8m_main);
        content.set(Content::ARMV8M_BASE, self.armv8m_base);
        content.set(Content::TZ_ENABLED, self.secure);
        content.set(Content::TZ_SAVED_SECURE, self.secure);
        content
    }
}

/// Registers the entry trampoline saved before any Rust code ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct EntryState {
    pub exc_return: u32,
    pub msp: u32,
    pub psp: u32,
    pub r4_r11: [u32; 8],
    pub xpsr: u32,
}

/// Access to the faulting CPU.
pub trait CpuAccess {
    fn profile(&self) -> ArchProfile;

    fn entry(&self) -> EntryState;

    /// # Safety
    ///
    /// `addr` must be a word-aligned address the caller has checked is a
    /// readable stack location.
    unsafe fn read_word(&self, addr: u32) -> u32;

    /// Non-secure MSP and PSP, seen from Secure code.
    fn non_secure_stack_pointers(&self) -> (u32, u32) {
        (0, 0)
    }

    /// MSPLIM and PSPLIM of the given security state, if the core has them.
    fn stack_limits(&self, _non_secure: bool) -> Option<(u32, u32)> {
        None
    }

    /// CFSR through AFSR. Secure code reads the Non-secure alias when the
    /// fault was taken from Non-secure state.
    fn fault_registers(&self, non_secure: bool) -> FaultRegisters;

    /// SFSR and SFAR.
    fn secure_fault_registers(&self) -> (u32, u32) {
        (0, 0)
    }

    fn ras_fault_status(&self) -> u32 {
        0
    }
}

/// What to do once the fault is saved.
pub trait FaultExit {
    fn exit(&self) -> !;
}

/// Resets the system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReset;

impl FaultExit for SystemReset {
    fn exit(&self) -> ! {
        #[cfg(target_arch = "arm")]
        cortex_m::peripheral::SCB::sys_reset();
        #[cfg(all(not(target_arch = "arm"), feature = "std"))]
        std::process::abort();
        #[cfg(all(not(target_arch = "arm"), not(feature = "std")))]
        loop {
            core::hint::spin_loop();
        }
    }
}

/// The fault record, meant to be placed in memory the runtime does not zero.
pub struct FaultStorage {
    info: UnsafeCell<FaultInfo>,
}

// Writers are the fault handler and boot code, which never run concurrently
// with each other (see the safety sections below).
unsafe impl Sync for FaultStorage {}

impl Default for FaultStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultStorage {
    pub const fn new() -> Self {
        Self {
            info: UnsafeCell::new(FaultInfo::empty()),
        }
    }

    /// Zeroes the record, including the fault count.
    ///
    /// # Safety
    ///
    /// Must not race [`FaultStorage::save`]. Call it from boot code or with the
    /// fault exceptions masked.
    pub unsafe fn clear(&self) {
        ptr::write_volatile(self.info.get(), FaultInfo::empty());
    }

    /// Copies the record out. A copy torn by a concurrent capture fails validation.
    pub fn snapshot(&self) -> FaultInfo {
        // SAFETY: the cell always holds a plain-old-data FaultInfo.
        unsafe { ptr::read_volatile(self.info.get()) }
    }

    /// A fault was saved and the record is intact.
    pub fn occurred(&self) -> bool {
        self.snapshot().is_valid()
    }

    /// Saves the faulting state.
    ///
    /// The magic is cleared first and written last, so a capture interrupted by
    /// a second fault or a reset leaves a record that reads as "no fault".
    ///
    /// # Safety
    ///
    /// Only one capture may run at a time, normally the fault handler itself.
    /// The stack reads rely on [`CpuAccess::read_word`] being valid for any
    /// address inside a stack frame that passed the checks below.
    pub unsafe fn save<C: CpuAccess>(&self, cpu: &C) {
        let cell = self.info.get();
        let count = ptr::read_volatile(ptr::addr_of!((*cell).count));
        ptr::write_volatile(ptr::addr_of_mut!((*cell).magic), 0);
        compiler_fence(Ordering::SeqCst);

        let mut info = build(cpu, count.wrapping_add(1));
        info.crc32 = info.compute_crc();

        ptr::write_volatile(cell, info);
        compiler_fence(Ordering::SeqCst);
        ptr::write_volatile(ptr::addr_of_mut!((*cell).magic), FAULT_MAGIC);
    }

    /// Saves the faulting state, then hands over to `exit`.
    ///
    /// # Safety
    ///
    /// See [`FaultStorage::save`].
    pub unsafe fn capture<C: CpuAccess, E: FaultExit>(&self, cpu: &C, exit: &E) -> ! {
        self.save(cpu);
        exit.exit()
    }
}

// Assembles the record with magic 0; `save` publishes it.
unsafe fn build<C: CpuAccess>(cpu: &C, count: u32) -> FaultInfo {
    let profile = cpu.profile();
    let entry = cpu.entry();
    let exc = ExcReturn(entry.exc_return);
    let mut content = profile.content();

    let non_secure = profile.secure && !exc.secure_stack();
    if profile.secure && !non_secure {
        content |= Content::TZ_FAULT_SECURE;
    }

    let (msp, psp) = if non_secure {
        cpu.non_secure_stack_pointers()
    } else {
        (entry.msp, entry.psp)
    };
    let mut frame = if exc.process_stack() { psp } else { msp };

    let fault_regs = if profile.fault_registers {
        let mut regs = cpu.fault_registers(non_secure);
        regs.sfsr = 0;
        regs.sfar = 0;
        regs.rfsr = 0;
        Some(regs)
    } else {
        None
    };

    let stacking_failed = fault_regs
        .map(|regs| regs.cfsr & cfsr::STACK_ERROR != 0)
        .unwrap_or(false);
    let frame_ok = frame % 4 == 0 && frame != 0 && !stacking_failed;

    let mut registers = Registers {
        msp,
        psp,
        ..Registers::default()
    };
    registers.r[4..12].copy_from_slice(&entry.r4_r11);

    if frame_ok {
        if profile.armv8m() && !exc.default_callee_stacking() {
            if cpu.read_word(frame) == INTEGRITY_SIGNATURE {
                for (i, slot) in registers.r[4..12].iter_mut().enumerate() {
                    *slot = cpu.read_word(frame + 8 + 4 * i as u32);
                }
                content |= Content::ADDITIONAL_CONTEXT;
            }
            frame += 4 * ADDITIONAL_CONTEXT_WORDS;
        }

        let mut basic = [0u32; BASIC_FRAME_WORDS as usize];
        for (i, word) in basic.iter_mut().enumerate() {
            *word = cpu.read_word(frame + 4 * i as u32);
        }
        registers.r[..4].copy_from_slice(&basic[..4]);
        registers.r[12] = basic[4];
        registers.lr = basic[5];
        registers.return_address = basic[6];
        registers.xpsr = basic[7];
        content |= Content::STATE_CONTEXT;
    }

    if let Some((msplim, psplim)) = cpu.stack_limits(non_secure) {
        registers.msplim = msplim;
        registers.psplim = psplim;
        content |= Content::LIMIT_REGS;
    }

    let mut fault_regs = fault_regs.unwrap_or_default();
    if profile.fault_registers {
        content |= Content::FAULT_REGS;
    }
    if profile.secure && profile.armv8m_main {
        let (sfsr, sfar) = cpu.secure_fault_registers();
        fault_regs.sfsr = sfsr;
        fault_regs.sfar = sfar;
        content |= Content::SECURE_FAULT_REGS;
    }
    if profile.armv81m {
        fault_regs.rfsr = cpu.ras_fault_status();
        content |= Content::RAS_FAULT_REG;
    }

    FaultInfo {
        magic: 0,
        crc32: 0,
        count,
        version: Version {
            minor: VERSION_MINOR,
            major: VERSION_MAJOR,
        },
        content,
        registers,
        exception: ExceptionState {
            xpsr: entry.xpsr,
            exc_return: entry.exc_return,
        },
        fault_regs,
    }
}
