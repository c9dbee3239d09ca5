// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! A host-side Cortex-M model for exercising fault capture.

use std::collections::BTreeMap;

use crate::capture::{ArchProfile, CpuAccess, EntryState};
use crate::info::FaultRegisters;
use crate::regs::{INTEGRITY_SIGNATURE, IPSR_MASK};

/// How the simulated core stacks on exception entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stacking {
    /// Interrupted code was in Thread mode.
    pub thread: bool,
    /// Interrupted code ran on PSP. Implies `thread`.
    pub process_stack: bool,
    /// Push the Armv8-M additional state context (R4-R11 plus signature).
    pub callee_context: bool,
    /// Interrupted code was Non-secure.
    pub non_secure: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedCore {
    profile: ArchProfile,
    memory: BTreeMap<u32, u32>,
    entry: EntryState,

    /// R0-R12.
    pub r: [u32; 13],
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
    pub msp: u32,
    pub psp: u32,
    pub ns_msp: u32,
    pub ns_psp: u32,
    /// MSPLIM, PSPLIM.
    pub limits: (u32, u32),
    pub ns_limits: (u32, u32),
    /// CFSR through AFSR. SFSR, SFAR and RFSR live in their own fields.
    pub fault: FaultRegisters,
    pub sfsr: u32,
    pub sfar: u32,
    pub rfsr: u32,
}

impl SimulatedCore {
    pub fn new(profile: ArchProfile) -> Self {
        Self {
            profile,
            memory: BTreeMap::new(),
            entry: EntryState::default(),
            r: [0; 13],
            lr: 0,
            pc: 0,
            xpsr: 0x0100_0000,
            msp: 0,
            psp: 0,
            ns_msp: 0,
            ns_psp: 0,
            limits: (0, 0),
            ns_limits: (0, 0),
            fault: FaultRegisters::default(),
            sfsr: 0,
            sfar: 0,
            rfsr: 0,
        }
    }

    /// Unwritten memory reads as zero.
    pub fn read(&self, addr: u32) -> u32 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    pub fn write(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
    }

    /// Enters exception `number` the way the hardware does and leaves the core
    /// where the fault entry trampoline would find it. Returns EXC_RETURN.
    pub fn take_exception(&mut self, number: u32, stacking: Stacking) -> u32 {
        let process = stacking.process_stack;
        let thread = stacking.thread || process;

        let sp = match (stacking.non_secure, process) {
            (false, false) => self.msp,
            (false, true) => self.psp,
            (true, false) => self.ns_msp,
            (true, true) => self.ns_psp,
        };
        let mut frame = sp.wrapping_sub(32);

        // Stack: R0, R1, R2, R3, R12, LR, PC, xPSR
        let basic = [
            self.r[0], self.r[1], self.r[2], self.r[3], self.r[12], self.lr, self.pc, self.xpsr,
        ];
        for (i, word) in basic.into_iter().enumerate() {
            self.write(frame + 4 * i as u32, word);
        }

        if stacking.callee_context {
            frame = frame.wrapping_sub(40);
            self.write(frame, INTEGRITY_SIGNATURE);
            self.write(frame + 4, 0);
            for i in 0..8 {
                self.write(frame + 8 + 4 * i as u32, self.r[4 + i]);
            }
        }

        match (stacking.non_secure, process) {
            (false, false) => self.msp = frame,
            (false, true) => self.psp = frame,
            (true, false) => self.ns_msp = frame,
            (true, true) => self.ns_psp = frame,
        }

        let mut exc_return = 0xFFFF_FFF1 | (u32::from(thread) << 3) | (u32::from(process) << 2);
        if stacking.callee_context {
            exc_return &= !(1 << 5);
            // The callee registers were saved by hardware and are scrubbed.
            self.r[4..12].fill(0);
        }
        if stacking.non_secure {
            exc_return &= !(1 << 6);
        }

        self.lr = exc_return;
        self.xpsr = (self.xpsr & !IPSR_MASK) | number;
        let mut r4_r11 = [0u32; 8];
        r4_r11.copy_from_slice(&self.r[4..12]);
        self.entry = EntryState {
            exc_return,
            msp: self.msp,
            psp: self.psp,
            r4_r11,
            xpsr: self.xpsr,
        };

        tracing::debug!(
            "Exception {} taken, frame at {:#x}, EXC_RETURN={:#x}",
            number,
            frame,
            exc_return
        );
        exc_return
    }
}

impl CpuAccess for SimulatedCore {
    fn profile(&self) -> ArchProfile {
        self.profile
    }

    fn entry(&self) -> EntryState {
        self.entry
    }

    unsafe fn read_word(&self, addr: u32) -> u32 {
        self.read(addr)
    }

    fn non_secure_stack_pointers(&self) -> (u32, u32) {
        (self.ns_msp, self.ns_psp)
    }

    fn stack_limits(&self, non_secure: bool) -> Option<(u32, u32)> {
        let p = self.profile;
        if p.armv8m_main {
            Some(if non_secure { self.ns_limits } else { self.limits })
        } else if p.armv8m_base && p.secure && !non_secure {
            Some(self.limits)
        } else {
            None
        }
    }

    fn fault_registers(&self, _non_secure: bool) -> FaultRegisters {
        self.fault
    }

    fn secure_fault_registers(&self) -> (u32, u32) {
        (self.sfsr, self.sfar)
    }

    fn ras_fault_status(&self) -> u32 {
        self.rfsr
    }
}
