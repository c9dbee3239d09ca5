#![no_std]
// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.
#![no_main]
#![allow(clippy::empty_loop)]

use core::arch::asm;

use cortex_m::peripheral::scb::Exception;
use cortex_m_rt::entry;
use panic_halt as _;

use labwired_evr::{DwtCycleCounter, EventId, EventRecorder, Level, RecorderConfig, RecorderMemory, RecordingMask};
use labwired_fault::{record_fault, FaultStorage};

const CORE_CLOCK_HZ: u32 = 8_000_000;
const RECORDS: usize = 64;

// Application component and its messages.
const APP: u8 = 0x01;
const MSG_BOOT: u8 = 0x00;
const MSG_TICK: u8 = 0x01;
const MSG_DIVIDE: u8 = 0x02;

const CCR_DIV_0_TRP: u32 = 1 << 4;

// Both survive a warm reset: `.uninit` is neither zeroed nor loaded by the runtime.
#[link_section = ".uninit.labwired.evr"]
static EVR_MEMORY: RecorderMemory<RECORDS> = RecorderMemory::new();

#[link_section = ".uninit.labwired.fault"]
static FAULT: FaultStorage = FaultStorage::new();

static RECORDER: EventRecorder<'static, DwtCycleCounter, RECORDS> =
    EventRecorder::new(&EVR_MEMORY, DwtCycleCounter::new(CORE_CLOCK_HZ), RecorderConfig::new());

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[inline(never)]
fn divide(dividend: u32, divisor: u32) -> u32 {
    let quotient: u32;
    // A plain `/` would panic on zero before the hardware sees it.
    unsafe {
        asm!("udiv {q}, {n}, {d}", q = out(reg) quotient, n = in(reg) dividend, d = in(reg) divisor);
    }
    quotient
}

#[entry]
fn main() -> ! {
    labwired_fault::cortex_m::install(&FAULT, None);

    if RECORDER.initialize(RecordingMask::ALL, true).is_err() {
        halt();
    }

    if FAULT.occurred() {
        // Leave both records in place for the debugger.
        let _ = record_fault(&FAULT.snapshot(), &RECORDER);
        halt();
    }
    // SAFETY: fault handlers cannot run yet, the configurable ones are still disabled.
    unsafe { FAULT.clear() };

    if let Some(mut p) = cortex_m::Peripherals::take() {
        p.SCB.enable(Exception::MemoryManagement);
        p.SCB.enable(Exception::BusFault);
        p.SCB.enable(Exception::UsageFault);
        unsafe { p.SCB.ccr.modify(|ccr| ccr | CCR_DIV_0_TRP) };
    }

    let _ = RECORDER.record_data(EventId::new(Level::Op, APP, MSG_BOOT), b"boot");

    // Count down to a divide by zero, which resets through the fault handler.
    let mut divisor = 8u32;
    let mut tick = 0u32;
    loop {
        for _ in 0..10_000 {
            cortex_m::asm::nop();
        }
        tick = tick.wrapping_add(1);
        let _ = RECORDER.record2(EventId::new(Level::Detail, APP, MSG_TICK), tick, divisor);

        let quotient = divide(1_000, divisor);
        let _ = RECORDER.record2(EventId::new(Level::Op, APP, MSG_DIVIDE), divisor, quotient);
        divisor = divisor.saturating_sub(1);
    }
}
