// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Architectural bit positions of the Cortex-M fault status registers.

pub mod hfsr {
    pub const VECTTBL: u32 = 1 << 1;
    pub const FORCED: u32 = 1 << 30;
    pub const DEBUGEVT: u32 = 1 << 31;
}

/// CFSR, with MMFSR in [7:0], BFSR in [15:8] and UFSR in [31:16].
pub mod cfsr {
    pub const IACCVIOL: u32 = 1 << 0;
    pub const DACCVIOL: u32 = 1 << 1;
    pub const MUNSTKERR: u32 = 1 << 3;
    pub const MSTKERR: u32 = 1 << 4;
    pub const MLSPERR: u32 = 1 << 5;
    pub const MMARVALID: u32 = 1 << 7;

    pub const IBUSERR: u32 = 1 << 8;
    pub const PRECISERR: u32 = 1 << 9;
    pub const IMPRECISERR: u32 = 1 << 10;
    pub const UNSTKERR: u32 = 1 << 11;
    pub const STKERR: u32 = 1 << 12;
    pub const LSPERR: u32 = 1 << 13;
    pub const BFARVALID: u32 = 1 << 15;

    pub const UNDEFINSTR: u32 = 1 << 16;
    pub const INVSTATE: u32 = 1 << 17;
    pub const INVPC: u32 = 1 << 18;
    pub const NOCP: u32 = 1 << 19;
    pub const STKOF: u32 = 1 << 20;
    pub const UNALIGNED: u32 = 1 << 24;
    pub const DIVBYZERO: u32 = 1 << 25;

    /// Any of these means the exception frame was not (completely) pushed.
    pub const STACK_ERROR: u32 = STKERR | MSTKERR | STKOF;
}

pub mod sfsr {
    pub const INVEP: u32 = 1 << 0;
    pub const INVIS: u32 = 1 << 1;
    pub const INVER: u32 = 1 << 2;
    pub const AUVIOL: u32 = 1 << 3;
    pub const INVTRAN: u32 = 1 << 4;
    pub const LSPERR: u32 = 1 << 5;
    pub const SFARVALID: u32 = 1 << 6;
    pub const LSERR: u32 = 1 << 7;
}

/// Armv8.1-M RAS Fault Status Register.
pub mod rfsr {
    pub const VALID: u32 = 1 << 31;
}

/// IPSR field of xPSR: the active exception number.
pub const IPSR_MASK: u32 = 0x1FF;

/// Signature at the bottom of the Armv8-M additional state context.
pub const INTEGRITY_SIGNATURE: u32 = 0xFEFA_125A;

/// Words in the basic exception frame: R0-R3, R12, LR, return address, xPSR.
pub const BASIC_FRAME_WORDS: u32 = 8;
/// Words in the additional state context: signature, reserved, R4-R11.
pub const ADDITIONAL_CONTEXT_WORDS: u32 = 10;

/// The EXC_RETURN value found in LR on exception entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcReturn(pub u32);

impl ExcReturn {
    /// Exception taken to the Secure state (ES).
    pub const fn secure_exception(self) -> bool {
        self.0 & (1 << 0) != 0
    }

    /// Frame pushed on PSP rather than MSP (SPSEL).
    pub const fn process_stack(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// Returning to Thread mode.
    pub const fn thread_mode(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// Default callee register stacking (DCRS). When clear on Armv8-M the
    /// additional state context sits below the basic frame.
    pub const fn default_callee_stacking(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    /// Frame pushed on a Secure stack (S).
    pub const fn secure_stack(self) -> bool {
        self.0 & (1 << 6) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exc_return_thread_psp() {
        let exc = ExcReturn(0xFFFF_FFFD);
        assert!(exc.process_stack());
        assert!(exc.thread_mode());
        assert!(exc.default_callee_stacking());
        assert!(exc.secure_stack());
    }

    #[test]
    fn test_exc_return_handler_msp() {
        let exc = ExcReturn(0xFFFF_FFF1);
        assert!(!exc.process_stack());
        assert!(!exc.thread_mode());
    }

    #[test]
    fn test_non_secure_additional_context() {
        // Secure handler, frame on the Non-secure PSP with callee registers stacked.
        let exc = ExcReturn(0xFFFF_FF9D);
        assert!(!exc.secure_stack());
        assert!(!exc.default_callee_stacking());
        assert!(exc.process_stack());
        assert!(exc.secure_exception());
    }
}
