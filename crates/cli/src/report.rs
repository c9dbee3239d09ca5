// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Plain-text rendering for the `buffer` and `log` commands.

use std::fmt::Write;

use labwired_evr::component;
use labwired_evr::logfmt::{LogFrame, LogPayload};
use labwired_evr::reader::{Entry, Event, Payload};

use crate::BufferReport;

fn component_name(id: u16) -> Option<&'static str> {
    match (id >> 8) as u8 {
        component::EVENT => Some("EventRecorder"),
        component::PRINTF => Some("printf"),
        component::STATISTICS => Some("Statistics"),
        component::FAULT => Some("Fault"),
        _ => None,
    }
}

fn format_id(id: u16) -> String {
    match component_name(id) {
        Some(name) => format!("{:#06x} ({}:{:#04x})", id, name, id & 0xFF),
        None => format!("{:#06x}", id),
    }
}

fn format_words(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("{:#010x}", w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_data(data: &[u8]) -> String {
    if !data.is_empty() && data.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("{:?}", String::from_utf8_lossy(data))
    } else {
        data.iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn record_line(out: &mut String, entry: &Entry) {
    let rec = &entry.record;
    let mut flags = String::new();
    for (set, c) in [(rec.first(), 'F'), (rec.last(), 'L'), (rec.irq(), 'I')] {
        flags.push(if set { c } else { '-' });
    }
    let _ = writeln!(
        out,
        "  {:>8} {:>5}  {:#010x}  {:#06x}  seq {:>2}  ctx {}  {}  {}",
        entry.position,
        entry.slot,
        rec.timestamp(),
        rec.id(),
        rec.sequence(),
        rec.dlen_or_context(),
        flags,
        format_words(&[rec.value1(), rec.value2()]),
    );
}

fn event_line(out: &mut String, event: &Event) {
    let payload = match &event.payload {
        Payload::Values2(v) => format_words(v),
        Payload::Values4(v) => format_words(v),
        Payload::Data(d) => format_data(d),
    };
    let _ = writeln!(
        out,
        "  {:#010x}{} {}  {}",
        event.timestamp,
        if event.irq { " [irq]" } else { "" },
        format_id(event.id),
        payload
    );
}

pub(crate) fn buffer(report: &BufferReport<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Record index {}{}, {} of {} slots retained",
        report.record_index,
        if report.inferred_index { " (inferred)" } else { "" },
        report.records.len(),
        report.slots
    );
    let _ = writeln!(out, "\nRecords:");
    for entry in report.records {
        record_line(&mut out, entry);
    }
    let _ = writeln!(out, "\nEvents ({}):", report.events.len());
    for event in report.events {
        event_line(&mut out, event);
    }
    out
}

pub(crate) fn log(frames: &[LogFrame<'_>]) -> String {
    let mut out = String::new();
    for frame in frames {
        let payload = match frame.payload {
            LogPayload::Values2(v) => format_words(&v),
            LogPayload::Values4(v) => format_words(&v),
            LogPayload::Data(d) => format_data(d),
        };
        let _ = writeln!(
            out,
            "{:>20}{} {}  {}",
            frame.timestamp,
            if frame.irq { " [irq]" } else { "" },
            format_id(frame.id),
            payload
        );
    }
    out
}
