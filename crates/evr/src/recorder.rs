// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::atomic::{atomic_increment8, Ordering};
use crate::filter::{FilterTable, FILTER_BYTES};
use crate::id::{component, EventId, RecordingMask};
use crate::logfmt::{LogFrame, LogPayload, LogSink, MAX_FRAME_SIZE};
use crate::record::{self, RawRecord, CTX_MASK, CTX_POS, DLEN_MASK, DLEN_POS, FIRST, IRQ, LAST};
use crate::status::{RecorderInfo, RecorderStatus, Stats, STATE_RUNNING, STATE_STOPPED};
use crate::store::RecordStore;
use crate::timestamp::{OverflowTracker, Timestamp, TimestampSource};
use crate::{RecorderError, RecorderResult};

/// Message numbers of the recorder's own events on component 0xFF.
pub mod message {
    pub const INIT: u8 = 0x00;
    pub const START: u8 = 0x01;
    pub const STOP: u8 = 0x02;
    pub const CLOCK: u8 = 0x03;
}

/// Highest component number a filter range may name. 0xFF is reserved for the recorder.
pub const MAX_FILTER_COMPONENT: u8 = 0xFE;

/// Build-time settings.
#[derive(Clone, Copy)]
pub struct RecorderConfig {
    /// Reported instead of the timer's own frequency.
    pub frequency_override: Option<u32>,
    /// Every recorded event is also encoded into this sink.
    pub log_sink: Option<&'static dyn LogSink>,
}

impl RecorderConfig {
    pub const fn new() -> Self {
        Self {
            frequency_override: None,
            log_sink: None,
        }
    }

    pub const fn with_frequency(mut self, hz: u32) -> Self {
        self.frequency_override = Some(hz);
        self
    }

    pub const fn with_log_sink(mut self, sink: &'static dyn LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that must survive a reset. All atomics, so any bit pattern left in
/// uninitialized RAM is a valid value; `initialize` decides whether to trust it.
#[derive(Debug)]
#[repr(C)]
pub struct RecorderMemory<const N: usize> {
    pub(crate) status: RecorderStatus,
    pub(crate) clock: OverflowTracker,
    pub(crate) filter: FilterTable,
    pub(crate) store: RecordStore<N>,
}

impl<const N: usize> RecorderMemory<N> {
    pub const fn new() -> Self {
        Self {
            status: RecorderStatus::new(),
            clock: OverflowTracker::new(),
            filter: FilterTable::new(),
            store: RecordStore::new(),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl<const N: usize> RecorderMemory<N> {
    /// Leaves `slots` locked so writers landing there give up on them.
    pub fn hold_slots(&self, slots: core::ops::Range<usize>) {
        slots.for_each(|slot| self.store.hold(slot));
    }
}

impl<const N: usize> Default for RecorderMemory<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The event recorder: `N` records of 16 bytes, timestamps from `T`.
///
/// Every method takes `&self` and may be called from any thread or interrupt at any
/// time; synchronization is internal.
pub struct EventRecorder<'m, T: TimestampSource, const N: usize> {
    memory: &'m RecorderMemory<N>,
    timer: T,
    config: RecorderConfig,
}

impl<'m, T: TimestampSource, const N: usize> EventRecorder<'m, T, N> {
    /// Longest payload accepted by [`record_data`](Self::record_data).
    pub const MAX_DATA_LEN: usize = if (N / 4) * 8 < 256 { (N / 4) * 8 } else { 256 };

    pub const fn new(memory: &'m RecorderMemory<N>, timer: T, config: RecorderConfig) -> Self {
        Self {
            memory,
            timer,
            config,
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn info(&self) -> RecorderInfo {
        RecorderInfo {
            record_count: N as u32,
            buffer_address: &self.memory.store as *const _ as usize,
            filter_address: &self.memory.filter as *const _ as usize,
            status_address: &self.memory.status as *const _ as usize,
            timestamp_source: T::SOURCE_ID,
        }
    }

    /// Brings the recorder up, deciding between a cold start and a warm restart.
    ///
    /// A warm restart keeps the buffer and counters of the previous run and only
    /// releases slots that the reset caught mid-write.
    pub fn initialize(&self, recording: RecordingMask, start: bool) -> RecorderResult {
        let mem = self.memory;
        mem.status.state.store(STATE_STOPPED, Ordering::Release);
        mem.filter.clear();

        let crc = self.info().crc();
        let warm = mem.status.is_warm(crc);
        if warm {
            let init_count = mem.status.init_count.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
            let released = mem.store.release_stale();
            evr_info!("Event recorder warm restart #{} ({} stale records released)", init_count, released);
        } else {
            mem.status.cold_reset(crc);
            mem.store.clear();
            evr_info!("Event recorder cold start, {} records", N);
        }

        if !self.timer.setup() {
            evr_warn!("Timestamp source setup failed");
            return Err(RecorderError::TimerSetup);
        }
        if warm && T::RETAINS_COUNT_ON_RESET {
            mem.clock.unlock();
        } else {
            mem.clock.reset();
        }
        let frequency = self.refresh_frequency();

        self.enable(recording, 0, MAX_FILTER_COMPONENT)?;
        self.enable(RecordingMask::ALL, component::STATISTICS, component::STATISTICS)?;
        self.enable(RecordingMask::OP, component::PRINTF, component::PRINTF)?;

        let init_count = mem.status.init_count.load(Ordering::Acquire);
        self.record_control(message::INIT, init_count, frequency);

        if start {
            self.start()?;
        }
        Ok(())
    }

    /// Turns on `levels` for components `start..=end`. An empty range succeeds.
    pub fn enable(&self, levels: RecordingMask, start: u8, end: u8) -> RecorderResult {
        self.set_filter(levels, start, end, true)
    }

    pub fn disable(&self, levels: RecordingMask, start: u8, end: u8) -> RecorderResult {
        self.set_filter(levels, start, end, false)
    }

    fn set_filter(&self, levels: RecordingMask, start: u8, end: u8, enable: bool) -> RecorderResult {
        if start > MAX_FILTER_COMPONENT || end > MAX_FILTER_COMPONENT {
            evr_warn!("Rejected filter range {:#04x}..={:#04x}", start, end);
            return Err(RecorderError::InvalidComponentRange { start, end });
        }
        self.memory.filter.set_range(levels, start, end, enable);
        evr_debug!(
            "Filter {} {:?} for components {:#04x}..={:#04x}",
            if enable { "enabled" } else { "disabled" },
            levels,
            start,
            end
        );
        Ok(())
    }

    /// Resumes recording. Already running is not an error.
    pub fn start(&self) -> RecorderResult {
        let status = &self.memory.status;
        if status.state.swap(STATE_RUNNING, Ordering::AcqRel) == STATE_RUNNING {
            return Ok(());
        }
        self.record_control(message::START, 0, 0);
        evr_debug!("Event recorder started");
        Ok(())
    }

    /// Suspends recording. Already stopped is not an error.
    pub fn stop(&self) -> RecorderResult {
        let status = &self.memory.status;
        if status.state.swap(STATE_STOPPED, Ordering::AcqRel) == STATE_STOPPED {
            return Ok(());
        }
        self.record_control(message::STOP, 0, 0);
        evr_debug!("Event recorder stopped");
        Ok(())
    }

    /// Re-reads the timer frequency after a clock change and records it.
    pub fn clock_update(&self) -> RecorderResult {
        let frequency = self.refresh_frequency();
        self.record_control(message::CLOCK, frequency, 0);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.memory.status.is_running()
    }

    /// Running and the (level, component) bit of `id` is set.
    pub fn is_enabled(&self, id: EventId) -> bool {
        self.is_running() && self.memory.filter.allows(id.raw())
    }

    /// One record holding two values.
    pub fn record2(&self, id: EventId, value1: u32, value2: u32) -> RecorderResult {
        if !self.is_enabled(id) {
            return Ok(());
        }
        let ts = self.timestamp64();
        let irq = in_handler_mode();
        self.forward(ts, id, irq, LogPayload::Values2([value1, value2]));
        self.commit(tag(id, irq) | FIRST | LAST, ts.count, value1, value2)
    }

    /// Two chained records sharing one context id.
    pub fn record4(&self, id: EventId, value1: u32, value2: u32, value3: u32, value4: u32) -> RecorderResult {
        self.record4_in(in_handler_mode(), id, [value1, value2, value3, value4])
    }

    // Only the head of a chain carries the IRQ flag.
    fn record4_in(&self, irq: bool, id: EventId, values: [u32; 4]) -> RecorderResult {
        if !self.is_enabled(id) {
            return Ok(());
        }
        let ts = self.timestamp64();
        self.forward(ts, id, irq, LogPayload::Values4(values));

        let ctx = self.next_context();
        self.commit(tag(id, irq) | ctx | FIRST, ts.count, values[0], values[1])?;
        self.commit(1 | ctx | LAST, ts.count, values[2], values[3])
    }

    /// A byte payload, split into 8-byte records when it does not fit one.
    ///
    /// Chained records carry a fresh context id; the middle ones count up from message
    /// 0x01 on component 0xFF, the last one puts the remaining length in the component
    /// field. The first failed record abandons the rest of the chain.
    ///
    /// DLEN is three bits wide, so exactly eight bytes are stored with DLEN 0 and
    /// read back like a [`record2`](Self::record2) event holding two words.
    pub fn record_data(&self, id: EventId, data: &[u8]) -> RecorderResult {
        self.record_data_in(in_handler_mode(), id, data)
    }

    fn record_data_in(&self, irq: bool, id: EventId, data: &[u8]) -> RecorderResult {
        if data.len() > Self::MAX_DATA_LEN {
            return Err(RecorderError::DataTooLong {
                len: data.len(),
                max: Self::MAX_DATA_LEN,
            });
        }
        if !self.is_enabled(id) {
            return Ok(());
        }
        let ts = self.timestamp64();
        self.forward(ts, id, irq, LogPayload::Data(data));

        let bits = tag(id, irq);
        let count = ts.count;
        if data.is_empty() {
            return self.commit(bits, count, 0, 0);
        }
        if data.len() <= 8 {
            let (v1, v2) = pack(data);
            let dlen = ((data.len() as u32) << DLEN_POS) & DLEN_MASK;
            return self.commit(bits | dlen | FIRST | LAST, count, v1, v2);
        }

        let ctx = self.next_context();
        let (head, mut rest) = data.split_at(8);
        let (v1, v2) = pack(head);
        self.commit(bits | ctx | FIRST, count, v1, v2)?;

        let mut chained = 0xFF01 | ctx;
        while rest.len() > 8 {
            let (chunk, tail) = rest.split_at(8);
            let (v1, v2) = pack(chunk);
            self.commit(chained, count, v1, v2)?;
            chained += 1;
            rest = tail;
        }

        let (v1, v2) = pack(rest);
        let last = (chained & !0xFF00) | ((rest.len() as u32) << 8);
        self.commit(last | LAST, count, v1, v2)
    }

    /// The counter value with wraparound folded in.
    pub fn timestamp(&self) -> u32 {
        self.timestamp64().count
    }

    pub fn timestamp64(&self) -> Timestamp {
        self.memory.clock.extend(|| self.timer.count())
    }

    pub fn stats(&self) -> Stats {
        let status = &self.memory.status;
        Stats {
            running: status.is_running(),
            record_index: status.record_index.load(Ordering::Acquire),
            records_written: status.records_written.load(Ordering::Acquire),
            records_dumped: status.records_dumped.load(Ordering::Acquire),
            ts_overflow: self.memory.clock.overflow(),
            ts_frequency: status.ts_frequency.load(Ordering::Acquire),
            ts_last: self.memory.clock.last(),
            init_count: status.init_count.load(Ordering::Acquire),
        }
    }

    pub fn filter_bytes(&self) -> [u8; FILTER_BYTES] {
        self.memory.filter.snapshot()
    }

    /// Raw slot `index & (N - 1)`.
    pub fn record_at(&self, index: usize) -> RawRecord {
        self.memory.store.snapshot(index)
    }

    /// Slots in physical order, ready for [`crate::reader::BufferView`].
    pub fn records(&self) -> impl Iterator<Item = RawRecord> + '_ {
        self.memory.store.records()
    }

    fn commit(&self, id_bits: u32, ts: u32, value1: u32, value2: u32) -> RecorderResult {
        let status = &self.memory.status;
        if self.memory.store.write(&status.record_index, id_bits, ts, value1, value2) {
            status.records_written.fetch_add(1, Ordering::AcqRel);
            Ok(())
        } else {
            status.records_dumped.fetch_add(1, Ordering::AcqRel);
            Err(RecorderError::Dropped)
        }
    }

    /// Recorder events bypass the filter and the running flag.
    fn record_control(&self, msg: u8, value1: u32, value2: u32) {
        let id = ((component::EVENT as u32) << 8) | msg as u32;
        let ts = self.timestamp64();
        self.forward(ts, EventId::from_raw(id), false, LogPayload::Values2([value1, value2]));
        if self.commit(id | FIRST | LAST, ts.count, value1, value2).is_err() {
            evr_warn!("Recorder event {:#04x} dropped", msg);
        }
    }

    fn refresh_frequency(&self) -> u32 {
        let frequency = self.config.frequency_override.unwrap_or_else(|| self.timer.frequency());
        self.memory.status.ts_frequency.store(frequency, Ordering::Release);
        frequency
    }

    fn next_context(&self) -> u32 {
        let ctx = atomic_increment8(&self.memory.status.context) as u32;
        (ctx << CTX_POS) & CTX_MASK
    }

    fn forward(&self, ts: Timestamp, id: EventId, irq: bool, payload: LogPayload<'_>) {
        let Some(sink) = self.config.log_sink else {
            return;
        };
        let frame = LogFrame {
            timestamp: ts.as_u64(),
            id: (id.raw() & record::ID_MASK) as u16,
            irq,
            payload,
        };
        let mut buf = [0u8; MAX_FRAME_SIZE];
        if let Some(len) = frame.encode_into(&mut buf) {
            sink.write(&buf[..len]);
        }
    }
}

fn tag(id: EventId, irq: bool) -> u32 {
    (id.raw() & record::ID_MASK) | if irq { IRQ } else { 0 }
}

/// Up to eight bytes as two little-endian words, zero padded.
fn pack(bytes: &[u8]) -> (u32, u32) {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    (
        u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    )
}

#[cfg(target_arch = "arm")]
fn in_handler_mode() -> bool {
    !matches!(
        cortex_m::peripheral::SCB::vect_active(),
        cortex_m::peripheral::scb::VectActive::ThreadMode
    )
}

#[cfg(not(target_arch = "arm"))]
fn in_handler_mode() -> bool {
    false
}
