// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fault entry on real hardware.
//!
//! Point the fault vectors at `LabwiredFaultEntry` (for example from
//! `memory.x`: `HardFault = LabwiredFaultEntry;`) and call [`install`] early in
//! `main`. The trampoline saves the registers the compiler would otherwise
//! clobber, moves onto a private stack and captures into the installed
//! [`FaultStorage`].

use core::arch::global_asm;
use core::cell::{Cell, UnsafeCell};
use core::ptr;

use cortex_m::interrupt::{self, Mutex};

use crate::capture::{ArchProfile, CpuAccess, EntryState, FaultExit, FaultStorage, SystemReset};
use crate::info::FaultRegisters;

const FAULT_STACK_SIZE: usize = 512;

#[repr(C, align(8))]
struct FaultStack(UnsafeCell<[u8; FAULT_STACK_SIZE]>);

// Only the trampoline touches it, through its address.
unsafe impl Sync for FaultStack {}

static FAULT_STACK: FaultStack = FaultStack(UnsafeCell::new([0; FAULT_STACK_SIZE]));

#[repr(transparent)]
struct EntrySlot(UnsafeCell<EntryState>);

unsafe impl Sync for EntrySlot {}

static ENTRY: EntrySlot = EntrySlot(UnsafeCell::new(EntryState {
    exc_return: 0,
    msp: 0,
    psp: 0,
    r4_r11: [0; 8],
    xpsr: 0,
}));

#[derive(Clone, Copy)]
struct Hooks {
    storage: &'static FaultStorage,
    exit: Option<fn() -> !>,
}

static HOOKS: Mutex<Cell<Option<Hooks>>> = Mutex::new(Cell::new(None));

// EntryState offsets: exc_return 0, msp 4, psp 8, r4..r11 12..44, xpsr 44.
// Only low registers are stored directly so the sequence also assembles for ARMv6-M.
global_asm!(
    r#"
    .section .text.LabwiredFaultEntry,"ax",%progbits
    .global LabwiredFaultEntry
    .type LabwiredFaultEntry,%function
    .thumb_func
LabwiredFaultEntry:
    ldr   r0, ={entry}
    mov   r1, lr
    str   r1, [r0, #0]
    mrs   r1, msp
    str   r1, [r0, #4]
    mrs   r1, psp
    str   r1, [r0, #8]
    str   r4, [r0, #12]
    str   r5, [r0, #16]
    str   r6, [r0, #20]
    str   r7, [r0, #24]
    mov   r1, r8
    str   r1, [r0, #28]
    mov   r1, r9
    str   r1, [r0, #32]
    mov   r1, r10
    str   r1, [r0, #36]
    mov   r1, r11
    str   r1, [r0, #40]
    mrs   r1, xpsr
    str   r1, [r0, #44]
    ldr   r0, ={stack}
    ldr   r1, ={size}
    adds  r0, r0, r1
    mov   sp, r0
    bl    {dispatch}
    b     .
    .ltorg
    .size LabwiredFaultEntry, . - LabwiredFaultEntry
"#,
    entry = sym ENTRY,
    stack = sym FAULT_STACK,
    size = const FAULT_STACK_SIZE,
    dispatch = sym dispatch,
);

/// Routes faults into `storage`, then calls `exit` (a system reset when `None`).
pub fn install(storage: &'static FaultStorage, exit: Option<fn() -> !>) {
    interrupt::free(|cs| HOOKS.borrow(cs).set(Some(Hooks { storage, exit })));
}

unsafe extern "C" fn dispatch() -> ! {
    let hooks = interrupt::free(|cs| HOOKS.borrow(cs).get());
    let cpu = HardwareCpu::new();
    match hooks {
        Some(Hooks {
            storage,
            exit: Some(exit),
        }) => {
            storage.save(&cpu);
            exit()
        }
        Some(Hooks { storage, exit: None }) => storage.capture(&cpu, &SystemReset),
        None => SystemReset.exit(),
    }
}

#[allow(dead_code)]
mod scb {
    pub const CFSR: u32 = 0xE000_ED28;
    pub const HFSR: u32 = 0xE000_ED2C;
    pub const DFSR: u32 = 0xE000_ED30;
    pub const MMFAR: u32 = 0xE000_ED34;
    pub const BFAR: u32 = 0xE000_ED38;
    pub const AFSR: u32 = 0xE000_ED3C;
    pub const SFSR: u32 = 0xE000_EDE4;
    pub const SFAR: u32 = 0xE000_EDE8;
    pub const RFSR: u32 = 0xE000_EF04;
    /// Offset of the Non-secure alias of the System Control Space.
    pub const NS_ALIAS: u32 = 0x0002_0000;
}

/// The running core, as seen from the fault handler.
pub struct HardwareCpu {
    _private: (),
}

impl HardwareCpu {
    /// # Safety
    ///
    /// Only meaningful inside `LabwiredFaultEntry`'s dispatcher, after the
    /// entry state was recorded.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    unsafe fn reg(addr: u32) -> u32 {
        ptr::read_volatile(addr as *const u32)
    }
}

impl CpuAccess for HardwareCpu {
    fn profile(&self) -> ArchProfile {
        let profile = if cfg!(armv81m_main) {
            ArchProfile::ARMV81M_MAIN
        } else if cfg!(armv8m_main) {
            ArchProfile::ARMV8M_MAIN
        } else if cfg!(armv8m_base) {
            ArchProfile::ARMV8M_BASE
        } else if cfg!(armv7m) {
            ArchProfile::ARMV7M
        } else {
            ArchProfile::ARMV6M
        };
        if cfg!(feature = "secure") {
            profile.with_secure()
        } else {
            profile
        }
    }

    fn entry(&self) -> EntryState {
        // SAFETY: written by the trampoline before `dispatch` runs.
        unsafe { ptr::read_volatile(ENTRY.0.get()) }
    }

    unsafe fn read_word(&self, addr: u32) -> u32 {
        ptr::read_volatile(addr as *const u32)
    }

    #[cfg(all(feature = "secure", any(armv8m_base, armv8m_main, armv81m_main)))]
    fn non_secure_stack_pointers(&self) -> (u32, u32) {
        let (msp, psp): (u32, u32);
        unsafe {
            core::arch::asm!("mrs {}, MSP_NS", out(reg) msp, options(nomem, nostack, preserves_flags));
            core::arch::asm!("mrs {}, PSP_NS", out(reg) psp, options(nomem, nostack, preserves_flags));
        }
        (msp, psp)
    }

    #[cfg(any(armv8m_main, armv81m_main))]
    fn stack_limits(&self, non_secure: bool) -> Option<(u32, u32)> {
        let (msplim, psplim): (u32, u32);
        unsafe {
            if cfg!(feature = "secure") && non_secure {
                core::arch::asm!("mrs {}, MSPLIM_NS", out(reg) msplim, options(nomem, nostack, preserves_flags));
                core::arch::asm!("mrs {}, PSPLIM_NS", out(reg) psplim, options(nomem, nostack, preserves_flags));
            } else {
                core::arch::asm!("mrs {}, MSPLIM", out(reg) msplim, options(nomem, nostack, preserves_flags));
                core::arch::asm!("mrs {}, PSPLIM", out(reg) psplim, options(nomem, nostack, preserves_flags));
            }
        }
        Some((msplim, psplim))
    }

    // Baseline only has limit registers in the Secure state.
    #[cfg(all(armv8m_base, feature = "secure"))]
    fn stack_limits(&self, non_secure: bool) -> Option<(u32, u32)> {
        if non_secure {
            return None;
        }
        let (msplim, psplim): (u32, u32);
        unsafe {
            core::arch::asm!("mrs {}, MSPLIM", out(reg) msplim, options(nomem, nostack, preserves_flags));
            core::arch::asm!("mrs {}, PSPLIM", out(reg) psplim, options(nomem, nostack, preserves_flags));
        }
        Some((msplim, psplim))
    }

    fn fault_registers(&self, non_secure: bool) -> FaultRegisters {
        let base = if non_secure { scb::NS_ALIAS } else { 0 };
        unsafe {
            FaultRegisters {
                cfsr: Self::reg(scb::CFSR + base),
                hfsr: Self::reg(scb::HFSR + base),
                dfsr: Self::reg(scb::DFSR + base),
                mmfar: Self::reg(scb::MMFAR + base),
                bfar: Self::reg(scb::BFAR + base),
                afsr: Self::reg(scb::AFSR + base),
                ..FaultRegisters::default()
            }
        }
    }

    #[cfg(all(feature = "secure", any(armv8m_main, armv81m_main)))]
    fn secure_fault_registers(&self) -> (u32, u32) {
        unsafe { (Self::reg(scb::SFSR), Self::reg(scb::SFAR)) }
    }

    #[cfg(armv81m_main)]
    fn ras_fault_status(&self) -> u32 {
        unsafe { Self::reg(scb::RFSR) }
    }
}
