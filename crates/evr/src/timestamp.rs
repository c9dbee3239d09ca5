// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Free-running counters and wraparound accounting.

use crate::atomic::{clear_flag, compare_and_swap, try_set_flag, AtomicU32, AtomicU8, Ordering};

/// A free-running hardware counter.
pub trait TimestampSource {
    /// The counter keeps running across a warm reset, so the last observed value
    /// and the overflow count stay meaningful.
    const RETAINS_COUNT_ON_RESET: bool = false;

    /// Stored in the recorder descriptor: 0 DWT cycle counter, 3 user timer.
    const SOURCE_ID: u32 = 3;

    /// Starts the counter. Returning `false` aborts recorder initialization.
    fn setup(&self) -> bool {
        true
    }

    fn count(&self) -> u32;

    /// Counter frequency in Hz.
    fn frequency(&self) -> u32;
}

/// A 32-bit counter value together with the number of wraps seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Timestamp {
    pub count: u32,
    pub overflow: u32,
}

impl Timestamp {
    pub const fn as_u64(self) -> u64 {
        ((self.overflow as u64) << 32) | self.count as u64
    }
}

/// Wraparound detection shared by every context that reads the counter.
#[derive(Debug)]
pub struct OverflowTracker {
    last: AtomicU32,
    overflow: AtomicU32,
    lock: AtomicU8,
}

impl OverflowTracker {
    pub const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
            overflow: AtomicU32::new(0),
            lock: AtomicU8::new(0),
        }
    }

    pub fn reset(&self) {
        self.last.store(0, Ordering::Relaxed);
        self.overflow.store(0, Ordering::Relaxed);
        clear_flag(&self.lock);
    }

    /// Clears only the overflow lock, which a reset may have left set.
    pub fn unlock(&self) {
        clear_flag(&self.lock);
    }

    pub fn last(&self) -> u32 {
        self.last.load(Ordering::Acquire)
    }

    pub fn overflow(&self) -> u32 {
        self.overflow.load(Ordering::Acquire)
    }

    /// Reads the counter through `read` and folds in wraparound.
    ///
    /// A decrease relative to the last stored value is a wrap. Only the context that
    /// moves `last` across the wrap, while holding the overflow lock, bumps the
    /// overflow count; everyone else re-reads. A context that finds the lock taken
    /// before the holder moved `last` reports the pending wrap without waiting.
    ///
    /// The overflow count is exact. A read that lands between the holder's store of
    /// `last` and its increment may return the previous overflow value.
    pub fn extend(&self, mut read: impl FnMut() -> u32) -> Timestamp {
        loop {
            let last = self.last.load(Ordering::Acquire);
            let count = read();

            if count < last {
                if !try_set_flag(&self.lock) {
                    let overflow = self.overflow.load(Ordering::Acquire);
                    if self.last.load(Ordering::Acquire) == last {
                        return Timestamp {
                            count,
                            overflow: overflow.wrapping_add(1),
                        };
                    }
                    continue;
                }
                let claimed = compare_and_swap(&self.last, last, count).is_ok();
                let overflow = if claimed {
                    self.overflow.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
                } else {
                    0
                };
                clear_flag(&self.lock);
                if claimed {
                    return Timestamp { count, overflow };
                }
                continue;
            }

            if compare_and_swap(&self.last, last, count).is_ok() {
                let overflow = self.overflow.load(Ordering::Acquire);
                return Timestamp { count, overflow };
            }
        }
    }
}

impl Default for OverflowTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A counter driven by software. Used by host tests and by simulators that own the clock.
#[derive(Debug)]
pub struct ManualClock {
    count: AtomicU32,
    frequency: u32,
}

impl ManualClock {
    pub const fn new(frequency: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            frequency,
        }
    }

    pub fn set(&self, count: u32) {
        self.count.store(count, Ordering::Release);
    }

    pub fn advance(&self, ticks: u32) {
        self.count.fetch_add(ticks, Ordering::AcqRel);
    }
}

impl TimestampSource for ManualClock {
    fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    fn frequency(&self) -> u32 {
        self.frequency
    }
}

impl<T: TimestampSource> TimestampSource for &T {
    const RETAINS_COUNT_ON_RESET: bool = T::RETAINS_COUNT_ON_RESET;
    const SOURCE_ID: u32 = T::SOURCE_ID;

    fn setup(&self) -> bool {
        (**self).setup()
    }

    fn count(&self) -> u32 {
        (**self).count()
    }

    fn frequency(&self) -> u32 {
        (**self).frequency()
    }
}

/// DWT CYCCNT, the core clock cycle counter on ARMv7-M and ARMv8-M Mainline.
#[cfg(all(target_arch = "arm", not(armv6m), not(armv8m_base)))]
#[derive(Debug)]
pub struct DwtCycleCounter {
    core_clock_hz: u32,
}

#[cfg(all(target_arch = "arm", not(armv6m), not(armv8m_base)))]
impl DwtCycleCounter {
    pub const fn new(core_clock_hz: u32) -> Self {
        Self { core_clock_hz }
    }
}

#[cfg(all(target_arch = "arm", not(armv6m), not(armv8m_base)))]
impl TimestampSource for DwtCycleCounter {
    const RETAINS_COUNT_ON_RESET: bool = true;
    const SOURCE_ID: u32 = 0;

    fn setup(&self) -> bool {
        use cortex_m::peripheral::DWT;

        // SAFETY: only DEMCR.TRCENA and DWT_CTRL.CYCCNTENA are touched, both are set-only
        // here and nothing else in the firmware clears them.
        let mut peripherals = unsafe { cortex_m::Peripherals::steal() };
        if !DWT::has_cycle_counter() {
            return false;
        }
        peripherals.DCB.enable_trace();
        peripherals.DWT.enable_cycle_counter();
        DWT::cycle_counter_enabled()
    }

    fn count(&self) -> u32 {
        cortex_m::peripheral::DWT::cycle_count()
    }

    fn frequency(&self) -> u32 {
        self.core_clock_hz
    }
}
