// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_evr::{component, EventId, EventRecorder, Level, RecorderResult, TimestampSource};

use crate::decode::causes;
use crate::info::FaultInfo;
use crate::FaultInfoError;

/// No fault was saved.
pub const EMPTY: EventId = EventId::new(Level::Op, component::FAULT, 0x00);
/// A record exists but failed its integrity check.
pub const INVALID: EventId = EventId::new(Level::Error, component::FAULT, 0x01);

/// Replays a saved fault into the event recorder.
///
/// An intact record produces one event per cause carrying the return address
/// and fault address (0 when unknown). Otherwise a single [`EMPTY`] or
/// [`INVALID`] notice is written.
///
/// A dropped event does not stop the others; the first error is returned after
/// every cause has been tried.
pub fn record_fault<T: TimestampSource, const N: usize>(
    info: &FaultInfo,
    recorder: &EventRecorder<'_, T, N>,
) -> RecorderResult {
    match info.validate() {
        Err(FaultInfoError::MissingMagic) => return recorder.record2(EMPTY, 0, 0),
        Err(_err) => {
            #[cfg(feature = "std")]
            tracing::debug!("Discarding fault record: {}", _err);
            return recorder.record2(INVALID, 0, 0);
        }
        Ok(()) => {}
    }

    causes(info).fold(Ok(()), |result, entry| {
        let recorded = recorder.record2(
            entry.event_id(),
            entry.return_address.unwrap_or(0),
            entry.fault_address.unwrap_or(0),
        );
        result.and(recorded)
    })
}
