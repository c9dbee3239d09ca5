// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Single-word atomic primitives used by the record store and the status block.
//!
//! On ARMv7-M and later every helper compiles to one LDREX/STREX loop. ARMv6-M has
//! no exclusive monitor, so `portable-atomic` masks interrupts around the one word
//! being touched instead.

pub use portable_atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

/// Increments `word` and returns the value it held before.
#[inline]
pub fn atomic_increment(word: &AtomicU32) -> u32 {
    word.fetch_add(1, Ordering::AcqRel)
}

/// Byte-sized variant of [`atomic_increment`], wraps at 256.
#[inline]
pub fn atomic_increment8(word: &AtomicU8) -> u8 {
    word.fetch_add(1, Ordering::AcqRel)
}

/// Stores `new` into `word` if it still holds `expected`.
///
/// Returns the previous value on success and the observed value on failure.
#[inline]
pub fn compare_and_swap(word: &AtomicU32, expected: u32, new: u32) -> Result<u32, u32> {
    word.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
}

/// Conditional read-modify-write: `f` sees the current value and either returns
/// the value to store or `None` to leave the word untouched.
///
/// Returns the value that was stored. Retries only when another context changed
/// the word between the read and the store.
#[inline]
pub fn update_if(word: &AtomicU32, mut f: impl FnMut(u32) -> Option<u32>) -> Option<u32> {
    let mut current = word.load(Ordering::Acquire);
    loop {
        let new = f(current)?;
        match word.compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return Some(new),
            Err(observed) => current = observed,
        }
    }
}

/// Takes an exclusive byte flag. `true` means the caller now owns it.
#[inline]
pub fn try_set_flag(flag: &AtomicU8) -> bool {
    flag.swap(1, Ordering::Acquire) == 0
}

#[inline]
pub fn clear_flag(flag: &AtomicU8) {
    flag.store(0, Ordering::Release);
}
