// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Human-readable fault report.

use core::fmt::{self, Write};

use crate::decode::causes;
use crate::info::{Content, FaultInfo, VERSION_MAJOR, VERSION_MINOR};
use crate::regs::ExcReturn;

const NOT_STACKED: &str = "unknown (was not stacked)";

/// Writes the report for `info` to `out`. An invalid record produces only the
/// header and a notice.
pub fn print<W: Write>(info: &FaultInfo, out: &mut W) -> fmt::Result {
    write!(out, "\n --- Fault (v{}.{}) ---\n\n", VERSION_MAJOR, VERSION_MINOR)?;
    if !info.is_valid() {
        return out.write_str("\n  No fault saved yet or fault information is invalid!\n\n");
    }

    write!(out, "  Fault count:         {}\n\n", info.count)?;
    print_handler(info, out)?;

    for entry in causes(info) {
        write!(out, "  Fault:               {} - {}", entry.category, entry.description)?;
        if let Some(addr) = entry.fault_address {
            write!(out, ", fault address 0x{:08X}", addr)?;
        }
        out.write_char('\n')?;
    }

    let stacked = info.has(Content::STATE_CONTEXT);
    let regs = &info.registers;
    if stacked {
        writeln!(out, "  Program Counter:     0x{:08X}", regs.return_address)?;
    } else {
        writeln!(out, "  Program Counter:     {}", NOT_STACKED)?;
    }

    out.write_str("\n  Registers:\n")?;
    if stacked {
        for (i, r) in regs.r[..4].iter().enumerate() {
            register(out, &format_args!("R{}", i), *r)?;
        }
    } else {
        out.write_str("   - R0 .. R3:         unknown (were not stacked)\n")?;
    }
    for (i, r) in regs.r[4..12].iter().enumerate() {
        register(out, &format_args!("R{}", i + 4), *r)?;
    }
    if stacked {
        register(out, &"R12", regs.r[12])?;
        register(out, &"LR", regs.lr)?;
        register(out, &"Return Address", regs.return_address)?;
        register(out, &"xPSR", regs.xpsr)?;
        out.write_char('\n')?;
    } else {
        for name in ["R12", "LR", "Return Address", "xPSR"] {
            label(out, &name)?;
            writeln!(out, "{}", NOT_STACKED)?;
        }
    }
    register(out, &"MSP", regs.msp)?;
    if info.has(Content::LIMIT_REGS) {
        register(out, &"MSPLIM", regs.msplim)?;
    }
    register(out, &"PSP", regs.psp)?;
    if info.has(Content::LIMIT_REGS) {
        register(out, &"PSPLIM", regs.psplim)?;
    }

    out.write_str("\n  Exception State:\n")?;
    register(out, &"xPSR", info.exception.xpsr)?;
    register(out, &"Exception Return", info.exception.exc_return)?;
    out.write_char('\n')?;

    if !info.has(Content::FAULT_REGS_EXIST) {
        return out.write_str("  Fault Registers do not exist!\n\n");
    }
    if info.has(Content::FAULT_REGS) {
        out.write_str("  Fault Registers:\n")?;
        let f = &info.fault_regs;
        for (name, value) in [
            ("CFSR", f.cfsr),
            ("HFSR", f.hfsr),
            ("DFSR", f.dfsr),
            ("MMFAR", f.mmfar),
            ("BFAR", f.bfar),
            ("AFSR", f.afsr),
        ] {
            register(out, &name, value)?;
        }
        if info.has(Content::SECURE_FAULT_REGS) {
            register(out, &"SFSR", f.sfsr)?;
            register(out, &"SFAR", f.sfar)?;
        }
        if info.has(Content::RAS_FAULT_REG) {
            register(out, &"RFSR", f.rfsr)?;
        }
        out.write_char('\n')?;
    }
    Ok(())
}

fn print_handler<W: Write>(info: &FaultInfo, out: &mut W) -> fmt::Result {
    out.write_str("  Exception Handler:   ")?;
    let tz = info.has(Content::TZ_ENABLED);
    if tz {
        if info.has(Content::TZ_SAVED_SECURE) {
            out.write_str("Secure - ")?;
        } else {
            out.write_str("Non-Secure - ")?;
        }
    }
    match info.exception_number() {
        3 => out.write_str("HardFault")?,
        4 => out.write_str("MemManage fault")?,
        5 => out.write_str("BusFault")?,
        6 => out.write_str("UsageFault")?,
        7 => out.write_str("SecureFault")?,
        n => write!(out, "unknown, exception number = {}", n)?,
    }
    out.write_char('\n')?;

    if tz {
        let state = if info.has(Content::TZ_FAULT_SECURE) {
            "Secure"
        } else {
            "Non-Secure"
        };
        writeln!(out, "  State:               {}", state)?;
    }

    let mode = if ExcReturn(info.exception.exc_return).thread_mode() {
        "Thread"
    } else {
        "Handler"
    };
    writeln!(out, "  Mode:                {}", mode)
}

// "   - NAME:" padded so values line up in column 23.
fn label<W: Write>(out: &mut W, name: &dyn fmt::Display) -> fmt::Result {
    let mut text = Label::default();
    write!(text, "{}:", name)?;
    write!(out, "   - {:<18}", text.as_str())
}

fn register<W: Write>(out: &mut W, name: &dyn fmt::Display, value: u32) -> fmt::Result {
    label(out, name)?;
    writeln!(out, "0x{:08X}", value)
}

// Fixed buffer for a register label, so padding works without an allocator.
#[derive(Default)]
struct Label {
    buf: [u8; 24],
    len: usize,
}

impl Label {
    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl Write for Label {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}
