// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Turns fault status bits into individual causes.

use core::fmt;

use labwired_evr::{component, EventId, Level};

use crate::info::{Content, FaultInfo};
use crate::regs::{cfsr, hfsr, rfsr, sfsr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FaultCategory {
    HardFault,
    MemManage,
    BusFault,
    UsageFault,
    SecureFault,
    Ras,
}

impl FaultCategory {
    pub const fn name(self) -> &'static str {
        match self {
            FaultCategory::HardFault => "HardFault",
            FaultCategory::MemManage => "MemManage",
            FaultCategory::BusFault => "BusFault",
            FaultCategory::UsageFault => "UsageFault",
            FaultCategory::SecureFault => "SecureFault",
            FaultCategory::Ras => "RAS",
        }
    }

    // Valid-address flag for categories that report one.
    fn address_valid(self, info: &FaultInfo) -> Option<u32> {
        let regs = &info.fault_regs;
        match self {
            FaultCategory::MemManage if regs.cfsr & cfsr::MMARVALID != 0 => Some(regs.mmfar),
            FaultCategory::BusFault if regs.cfsr & cfsr::BFARVALID != 0 => Some(regs.bfar),
            FaultCategory::SecureFault if regs.sfsr & sfsr::SFARVALID != 0 => Some(regs.sfar),
            _ => None,
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FaultCause {
    VectorTable,
    Forced,
    DebugEvent,
    InstructionAccess,
    DataAccess,
    MemUnstacking,
    MemStacking,
    MemLazyStacking,
    InstructionBus,
    PreciseData,
    ImpreciseData,
    BusUnstacking,
    BusStacking,
    BusLazyStacking,
    UndefinedInstruction,
    InvalidState,
    InvalidPc,
    NoCoprocessor,
    StackOverflow,
    Unaligned,
    DivideByZero,
    InvalidEntryPoint,
    InvalidIntegritySignature,
    InvalidExceptionReturn,
    AttributionUnitViolation,
    InvalidTransition,
    SecureLazyPreservation,
    SecureLazyState,
    RasError,
}

#[derive(Clone, Copy)]
enum Source {
    Hfsr,
    Cfsr,
    Sfsr,
    Rfsr,
}

struct CauseDef {
    cause: FaultCause,
    category: FaultCategory,
    source: Source,
    mask: u32,
    /// Message number without the context/address offsets.
    message: u8,
    description: &'static str,
}

macro_rules! cause {
    ($cause:ident, $category:ident, $source:ident, $mask:expr, $message:expr, $description:expr) => {
        CauseDef {
            cause: FaultCause::$cause,
            category: FaultCategory::$category,
            source: Source::$source,
            mask: $mask,
            message: $message,
            description: $description,
        }
    };
}

static CAUSES: &[CauseDef] = &[
    cause!(VectorTable, HardFault, Hfsr, hfsr::VECTTBL, 0x02, "Bus error on vector read"),
    cause!(
        Forced,
        HardFault,
        Hfsr,
        hfsr::FORCED,
        0x04,
        "Escalated fault (original fault was disabled or it caused another lower priority fault)"
    ),
    cause!(DebugEvent, HardFault, Hfsr, hfsr::DEBUGEVT, 0x06, "Breakpoint hit with Debug Monitor disabled"),
    cause!(
        InstructionAccess,
        MemManage,
        Cfsr,
        cfsr::IACCVIOL,
        0x08,
        "Instruction execution failure due to MPU violation or fault"
    ),
    cause!(DataAccess, MemManage, Cfsr, cfsr::DACCVIOL, 0x0C, "Data access failure due to MPU violation or fault"),
    cause!(
        MemUnstacking,
        MemManage,
        Cfsr,
        cfsr::MUNSTKERR,
        0x10,
        "Exception exit unstacking failure due to MPU access violation"
    ),
    cause!(
        MemStacking,
        MemManage,
        Cfsr,
        cfsr::MSTKERR,
        0x14,
        "Exception entry stacking failure due to MPU access violation"
    ),
    cause!(
        MemLazyStacking,
        MemManage,
        Cfsr,
        cfsr::MLSPERR,
        0x16,
        "Floating-point lazy stacking failure due to MPU access violation"
    ),
    cause!(InstructionBus, BusFault, Cfsr, cfsr::IBUSERR, 0x1A, "Instruction prefetch failure due to bus fault"),
    cause!(PreciseData, BusFault, Cfsr, cfsr::PRECISERR, 0x1E, "Data access failure due to bus fault (precise)"),
    cause!(
        ImpreciseData,
        BusFault,
        Cfsr,
        cfsr::IMPRECISERR,
        0x22,
        "Data access failure due to bus fault (imprecise)"
    ),
    cause!(BusUnstacking, BusFault, Cfsr, cfsr::UNSTKERR, 0x26, "Exception exit unstacking failure due to bus fault"),
    cause!(BusStacking, BusFault, Cfsr, cfsr::STKERR, 0x2A, "Exception entry stacking failure due to bus fault"),
    cause!(
        BusLazyStacking,
        BusFault,
        Cfsr,
        cfsr::LSPERR,
        0x2C,
        "Floating-point lazy stacking failure due to bus fault"
    ),
    cause!(UndefinedInstruction, UsageFault, Cfsr, cfsr::UNDEFINSTR, 0x30, "Execution of undefined instruction"),
    cause!(
        InvalidState,
        UsageFault,
        Cfsr,
        cfsr::INVSTATE,
        0x32,
        "Execution of Thumb instruction with Thumb mode turned off"
    ),
    cause!(InvalidPc, UsageFault, Cfsr, cfsr::INVPC, 0x34, "Invalid exception return value"),
    cause!(
        NoCoprocessor,
        UsageFault,
        Cfsr,
        cfsr::NOCP,
        0x36,
        "Coprocessor instruction with coprocessor disabled or non-existent"
    ),
    cause!(StackOverflow, UsageFault, Cfsr, cfsr::STKOF, 0x38, "Stack overflow"),
    // 0x39 is also STKOF with a valid state context; decoders rely on this numbering.
    cause!(Unaligned, UsageFault, Cfsr, cfsr::UNALIGNED, 0x39, "Unaligned load/store"),
    cause!(DivideByZero, UsageFault, Cfsr, cfsr::DIVBYZERO, 0x3B, "Divide by 0"),
    cause!(
        InvalidEntryPoint,
        SecureFault,
        Sfsr,
        sfsr::INVEP,
        0x3D,
        "Invalid entry point due to invalid attempt to enter Secure state"
    ),
    cause!(
        InvalidIntegritySignature,
        SecureFault,
        Sfsr,
        sfsr::INVIS,
        0x41,
        "Invalid integrity signature in exception stack frame found on unstacking"
    ),
    cause!(
        InvalidExceptionReturn,
        SecureFault,
        Sfsr,
        sfsr::INVER,
        0x45,
        "Invalid exception return due to mismatch on EXC_RETURN.DCRS or EXC_RETURN.ES"
    ),
    cause!(
        AttributionUnitViolation,
        SecureFault,
        Sfsr,
        sfsr::AUVIOL,
        0x49,
        "Attribution unit violation due to Non-secure access to Secure address space"
    ),
    cause!(
        InvalidTransition,
        SecureFault,
        Sfsr,
        sfsr::INVTRAN,
        0x4D,
        "Invalid transaction caused by domain crossing branch not flagged as such"
    ),
    cause!(
        SecureLazyPreservation,
        SecureFault,
        Sfsr,
        sfsr::LSPERR,
        0x51,
        "Lazy stacking preservation failure due to SAU or IDAU violation"
    ),
    cause!(
        SecureLazyState,
        SecureFault,
        Sfsr,
        sfsr::LSERR,
        0x55,
        "Lazy stacking activation or deactivation failure"
    ),
    cause!(
        RasError,
        Ras,
        Rfsr,
        rfsr::VALID,
        0x59,
        "Reliability, Availability and Serviceability error"
    ),
];

/// One decoded cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FaultEntry {
    pub category: FaultCategory,
    pub cause: FaultCause,
    pub description: &'static str,
    /// Stacked return address, if the state context was saved.
    pub return_address: Option<u32>,
    /// MMFAR, BFAR or SFAR when the matching VALID bit is set.
    pub fault_address: Option<u32>,
    #[cfg_attr(feature = "serde", serde(skip))]
    message: u8,
}

impl FaultEntry {
    /// Event id on the fault component: base message, +1 with a state
    /// context, +2 with a fault address.
    pub fn event_id(&self) -> EventId {
        let mut message = self.message;
        if self.return_address.is_some() {
            message += 1;
        }
        if self.fault_address.is_some() {
            message += 2;
        }
        EventId::new(Level::Error, component::FAULT, message)
    }
}

/// Every cause recorded in `info`, in register order. Sections the record does
/// not hold are skipped. The record's validity is not checked.
pub fn causes(info: &FaultInfo) -> impl Iterator<Item = FaultEntry> + '_ {
    let return_address = info
        .has(Content::STATE_CONTEXT)
        .then_some(info.registers.return_address);

    CAUSES.iter().filter_map(move |def| {
        let (present, value) = match def.source {
            Source::Hfsr => (info.has(Content::FAULT_REGS), info.fault_regs.hfsr),
            Source::Cfsr => (info.has(Content::FAULT_REGS), info.fault_regs.cfsr),
            Source::Sfsr => (info.has(Content::SECURE_FAULT_REGS), info.fault_regs.sfsr),
            Source::Rfsr => (info.has(Content::RAS_FAULT_REG), info.fault_regs.rfsr),
        };
        (present && value & def.mask != 0).then(|| FaultEntry {
            category: def.category,
            cause: def.cause,
            description: def.description,
            return_address,
            fault_address: def.category.address_valid(info),
            message: def.message,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(content: Content, cfsr: u32, hfsr: u32) -> FaultInfo {
        let mut info = FaultInfo::empty();
        info.content = content;
        info.fault_regs.cfsr = cfsr;
        info.fault_regs.hfsr = hfsr;
        info.registers.return_address = 0x0800_0100;
        info
    }

    #[test]
    fn test_forced_hardfault_with_precise_bus_error() {
        let mut info = info(
            Content::FAULT_REGS | Content::STATE_CONTEXT,
            cfsr::PRECISERR | cfsr::BFARVALID,
            hfsr::FORCED,
        );
        info.fault_regs.bfar = 0xE000_0000;

        let entries: Vec<_> = causes(&info).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cause, FaultCause::Forced);
        assert_eq!(entries[0].fault_address, None);
        assert_eq!(entries[0].event_id().raw(), 0x0000_EE05);
        assert_eq!(entries[1].category, FaultCategory::BusFault);
        assert_eq!(entries[1].return_address, Some(0x0800_0100));
        assert_eq!(entries[1].fault_address, Some(0xE000_0000));
        assert_eq!(entries[1].event_id().raw(), 0x0000_EE21);
    }

    #[test]
    fn test_stack_overflow_without_context_collides_with_unaligned_base() {
        let stkof = info(Content::FAULT_REGS | Content::STATE_CONTEXT, cfsr::STKOF, 0);
        let unaligned = info(Content::FAULT_REGS, cfsr::UNALIGNED, 0);
        let a = causes(&stkof).next().map(|e| e.event_id());
        let b = causes(&unaligned).next().map(|e| e.event_id());
        assert_eq!(a, b);
        assert_eq!(a.map(|id| id.message()), Some(0x39));
    }

    #[test]
    fn test_sections_missing_from_content_are_ignored() {
        let mut info = info(Content::empty(), cfsr::DIVBYZERO, hfsr::FORCED);
        info.fault_regs.sfsr = sfsr::AUVIOL;
        info.fault_regs.rfsr = rfsr::VALID;
        assert_eq!(causes(&info).count(), 0);

        info.content = Content::SECURE_FAULT_REGS | Content::RAS_FAULT_REG;
        let found: Vec<_> = causes(&info).map(|e| e.cause).collect();
        assert_eq!(found, vec![FaultCause::AttributionUnitViolation, FaultCause::RasError]);
    }

    #[test]
    fn test_secure_fault_address() {
        let mut info = info(Content::SECURE_FAULT_REGS, 0, 0);
        info.fault_regs.sfsr = sfsr::INVTRAN | sfsr::SFARVALID;
        info.fault_regs.sfar = 0x1000_0000;
        let entry = causes(&info).next().unwrap();
        assert_eq!(entry.fault_address, Some(0x1000_0000));
        assert_eq!(entry.event_id().message(), 0x4F);
    }

    #[test]
    fn test_every_cause_has_a_distinct_base_message() {
        let mut seen: Vec<u8> = CAUSES.iter().map(|def| def.message).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), CAUSES.len());
    }
}
