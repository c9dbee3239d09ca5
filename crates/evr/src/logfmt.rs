// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Binary event log, a byte stream alternative to reading the ring buffer.
//!
//! ```text
//! head    kind: u16, length: u16          length counts everything after the head
//! record  ts: u64, id: u16, info: u16     info[14:0] data length, info[15] IRQ
//! payload data bytes | 2 x u32 | 4 x u32
//! ```
//!
//! All fields little-endian, no padding.

use thiserror::Error;

pub const KIND_DATA: u16 = 0x0001;
pub const KIND_VALUES2: u16 = 0x0002;
pub const KIND_VALUES4: u16 = 0x0003;

pub const HEAD_SIZE: usize = 4;
pub const RECORD_HEAD_SIZE: usize = 12;
pub const MAX_DATA_LEN: usize = 256;
pub const MAX_FRAME_SIZE: usize = HEAD_SIZE + RECORD_HEAD_SIZE + MAX_DATA_LEN;

const LENGTH_MASK: u16 = 0x7FFF;
const IRQ_FLAG: u16 = 0x8000;

/// Receives encoded frames. Implementations must tolerate being called from interrupts.
pub trait LogSink: Sync {
    fn write(&self, frame: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LogPayload<'a> {
    Data(&'a [u8]),
    Values2([u32; 2]),
    Values4([u32; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogFrame<'a> {
    pub timestamp: u64,
    pub id: u16,
    pub irq: bool,
    pub payload: LogPayload<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("frame truncated: need {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },
    #[error("unknown frame kind {0:#06x}")]
    UnknownKind(u16),
    #[error("frame kind {kind} has inconsistent length {length}")]
    BadLength { kind: u16, length: u16 },
}

impl<'a> LogFrame<'a> {
    fn body_len(&self) -> usize {
        RECORD_HEAD_SIZE
            + match self.payload {
                LogPayload::Data(data) => data.len(),
                LogPayload::Values2(_) => 8,
                LogPayload::Values4(_) => 16,
            }
    }

    pub fn encoded_len(&self) -> usize {
        HEAD_SIZE + self.body_len()
    }

    /// Writes the frame into `out` and returns its length, or `None` if `out` is too short
    /// or the data payload does not fit the 15-bit length field.
    pub fn encode_into(&self, out: &mut [u8]) -> Option<usize> {
        let total = self.encoded_len();
        if out.len() < total {
            return None;
        }
        let (kind, data_len) = match self.payload {
            LogPayload::Data(data) if data.len() <= LENGTH_MASK as usize => (KIND_DATA, data.len() as u16),
            LogPayload::Data(_) => return None,
            LogPayload::Values2(_) => (KIND_VALUES2, 0),
            LogPayload::Values4(_) => (KIND_VALUES4, 0),
        };
        let info = data_len | if self.irq { IRQ_FLAG } else { 0 };

        out[0..2].copy_from_slice(&kind.to_le_bytes());
        out[2..4].copy_from_slice(&(self.body_len() as u16).to_le_bytes());
        out[4..12].copy_from_slice(&self.timestamp.to_le_bytes());
        out[12..14].copy_from_slice(&self.id.to_le_bytes());
        out[14..16].copy_from_slice(&info.to_le_bytes());

        let payload = &mut out[HEAD_SIZE + RECORD_HEAD_SIZE..total];
        match self.payload {
            LogPayload::Data(data) => payload.copy_from_slice(data),
            LogPayload::Values2(values) => write_words(payload, &values),
            LogPayload::Values4(values) => write_words(payload, &values),
        }
        Some(total)
    }

    /// Decodes one frame from the front of `bytes`, returning it and the bytes consumed.
    pub fn decode(bytes: &'a [u8]) -> Result<(Self, usize), LogError> {
        let head = take(bytes, 0, HEAD_SIZE)?;
        let kind = u16::from_le_bytes([head[0], head[1]]);
        let length = u16::from_le_bytes([head[2], head[3]]);
        let body = take(bytes, HEAD_SIZE, length as usize)?;
        if body.len() < RECORD_HEAD_SIZE {
            return Err(LogError::BadLength { kind, length });
        }

        let timestamp = u64::from_le_bytes(body[0..8].try_into().map_err(|_| LogError::BadLength { kind, length })?);
        let id = u16::from_le_bytes([body[8], body[9]]);
        let info = u16::from_le_bytes([body[10], body[11]]);
        let payload = &body[RECORD_HEAD_SIZE..];

        let payload = match kind {
            KIND_DATA if payload.len() == (info & LENGTH_MASK) as usize => LogPayload::Data(payload),
            KIND_VALUES2 if payload.len() == 8 => LogPayload::Values2([word(payload, 0), word(payload, 1)]),
            KIND_VALUES4 if payload.len() == 16 => LogPayload::Values4([
                word(payload, 0),
                word(payload, 1),
                word(payload, 2),
                word(payload, 3),
            ]),
            KIND_DATA | KIND_VALUES2 | KIND_VALUES4 => return Err(LogError::BadLength { kind, length }),
            other => return Err(LogError::UnknownKind(other)),
        };

        let frame = LogFrame {
            timestamp,
            id,
            irq: info & IRQ_FLAG != 0,
            payload,
        };
        Ok((frame, HEAD_SIZE + length as usize))
    }
}

/// Iterates the frames of a complete log. Stops after the first error.
pub struct LogReader<'a> {
    bytes: &'a [u8],
    failed: bool,
}

impl<'a> LogReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, failed: false }
    }
}

impl<'a> Iterator for LogReader<'a> {
    type Item = Result<LogFrame<'a>, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.is_empty() || self.failed {
            return None;
        }
        match LogFrame::decode(self.bytes) {
            Ok((frame, used)) => {
                self.bytes = &self.bytes[used..];
                Some(Ok(frame))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn take(bytes: &[u8], at: usize, len: usize) -> Result<&[u8], LogError> {
    bytes.get(at..at + len).ok_or(LogError::Truncated {
        needed: len,
        available: bytes.len().saturating_sub(at),
    })
}

fn word(bytes: &[u8], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn write_words(out: &mut [u8], values: &[u32]) {
    for (chunk, value) in out.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_values2_frame_layout() {
        let frame = LogFrame {
            timestamp: 0x0000_0001_0000_0002,
            id: 0xFF00,
            irq: true,
            payload: LogPayload::Values2([7, 9]),
        };
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode_into(&mut buf).unwrap();
        assert_eq!(len, 24);
        assert_eq!(&buf[..4], &[0x02, 0x00, 20, 0x00]);
        assert_eq!(&buf[12..16], &[0x00, 0xFF, 0x00, 0x80]);
        assert_eq!(&buf[16..20], &7u32.to_le_bytes());
    }

    #[test]
    fn test_data_frame_carries_length() {
        let data = [1u8, 2, 3];
        let frame = LogFrame {
            timestamp: 5,
            id: 0x0102,
            irq: false,
            payload: LogPayload::Data(&data),
        };
        let mut buf = [0u8; 32];
        let len = frame.encode_into(&mut buf).unwrap();
        assert_eq!(len, HEAD_SIZE + RECORD_HEAD_SIZE + 3);
        assert_eq!(u16::from_le_bytes([buf[14], buf[15]]), 3);
        assert!(frame.encode_into(&mut buf[..10]).is_none());
    }

    #[test]
    fn test_reader_reports_truncation_once() {
        let frame = LogFrame {
            timestamp: 1,
            id: 1,
            irq: false,
            payload: LogPayload::Values4([1, 2, 3, 4]),
        };
        let mut buf = [0u8; 64];
        let len = frame.encode_into(&mut buf).unwrap();

        let mut reader = LogReader::new(&buf[..len + 2]);
        assert_eq!(reader.next(), Some(Ok(frame)));
        assert!(matches!(reader.next(), Some(Err(LogError::Truncated { .. }))));
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut buf = [0u8; 16];
        buf[0] = 9;
        buf[2] = 12;
        assert_eq!(LogFrame::decode(&buf), Err(LogError::UnknownKind(9)));
    }

    proptest! {
        #[test]
        fn prop_data_frames_decode_back(ts: u64, id: u16, irq: bool, data in proptest::collection::vec(any::<u8>(), 0..MAX_DATA_LEN)) {
            let frame = LogFrame { timestamp: ts, id, irq, payload: LogPayload::Data(&data) };
            let mut buf = [0u8; MAX_FRAME_SIZE];
            let len = frame.encode_into(&mut buf).unwrap();
            let (decoded, used) = LogFrame::decode(&buf[..len]).unwrap();
            prop_assert_eq!(used, len);
            prop_assert_eq!(decoded, frame);
        }
    }
}
