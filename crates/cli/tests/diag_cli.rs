// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

use labwired_evr::logfmt::{LogFrame, LogPayload, MAX_FRAME_SIZE};
use labwired_evr::{EventId, EventRecorder, Level, ManualClock, RecorderConfig, RecorderMemory, RecordingMask};
use labwired_fault::regs::cfsr;
use labwired_fault::sim::{SimulatedCore, Stacking};
use labwired_fault::{ArchProfile, FaultInfo, FaultStorage};

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn buffer_dump() -> (Vec<u8>, u32) {
    let memory = RecorderMemory::<16>::new();
    let recorder = EventRecorder::new(&memory, ManualClock::new(10), RecorderConfig::new());
    recorder.initialize(RecordingMask::ALL, true).unwrap();
    recorder
        .record2(EventId::new(Level::Op, 0x12, 0x01), 0xCAFE, 0xBEEF)
        .unwrap();
    recorder
        .record_data(EventId::new(Level::Api, 0x12, 0x02), b"hello world")
        .unwrap();

    let bytes = recorder.records().flat_map(|r| r.to_le_bytes()).collect();
    (bytes, recorder.stats().record_index)
}

fn fault_dump() -> Vec<u8> {
    let mut cpu = SimulatedCore::new(ArchProfile::ARMV7M);
    cpu.msp = 0x2000_2000;
    cpu.pc = 0x0800_0440;
    cpu.fault.cfsr = cfsr::DIVBYZERO;
    cpu.take_exception(6, Stacking::default());

    let storage = FaultStorage::new();
    unsafe { storage.save(&cpu) };
    storage.snapshot().to_bytes().to_vec()
}

#[test]
#[allow(deprecated)]
fn test_buffer_text_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let (bytes, index) = buffer_dump();
    let dump = write_fixture(&dir, "ring.bin", &bytes);

    Command::cargo_bin("labwired-diag")?
        .arg("buffer")
        .arg(&dump)
        .arg("--index")
        .arg(index.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("Events (4):"))
        .stdout(predicate::str::contains("0x1201  0x0000cafe 0x0000beef"))
        .stdout(predicate::str::contains("\"hello world\""));
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_buffer_json_infers_index() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let (bytes, index) = buffer_dump();
    let dump = write_fixture(&dir, "ring.bin", &bytes);

    let output = Command::cargo_bin("labwired-diag")?
        .arg("--json")
        .arg("buffer")
        .arg(&dump)
        .output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["record_index"], index);
    assert_eq!(report["inferred_index"], true);
    assert_eq!(report["records"].as_array().unwrap().len(), 5);
    let events = report["events"].as_array().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[2]["id"], 0x1201);
    assert_eq!(
        events[2]["payload"]["Values2"],
        serde_json::json!([0xCAFE, 0xBEEF])
    );
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_buffer_rejects_partial_record() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let dump = write_fixture(&dir, "short.bin", &[0u8; 20]);

    Command::cargo_bin("labwired-diag")?
        .arg("buffer")
        .arg(&dump)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not a multiple"));
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_missing_file_is_input_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    Command::cargo_bin("labwired-diag")?
        .arg("fault")
        .arg(dir.path().join("absent.bin"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read"));
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_log_frames() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let frames = [
        LogFrame {
            timestamp: 100,
            id: 0xFE00,
            irq: false,
            payload: LogPayload::Data(b"boot"),
        },
        LogFrame {
            timestamp: 0x1_0000_0000,
            id: 0x0305,
            irq: true,
            payload: LogPayload::Values4([1, 2, 3, 4]),
        },
    ];
    let mut bytes = Vec::new();
    for frame in &frames {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode_into(&mut buf).unwrap();
        bytes.extend_from_slice(&buf[..len]);
    }
    let log = write_fixture(&dir, "events.log", &bytes);

    Command::cargo_bin("labwired-diag")?
        .arg("log")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("0xfe00 (printf:0x00)  \"boot\""))
        .stdout(predicate::str::contains(
            "4294967296 [irq] 0x0305  0x00000001 0x00000002 0x00000003 0x00000004",
        ));

    // A frame cut short is a decode error.
    let truncated = write_fixture(&dir, "cut.log", &bytes[..bytes.len() - 3]);
    Command::cargo_bin("labwired-diag")?
        .arg("log")
        .arg(&truncated)
        .assert()
        .code(3);
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_fault_report() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let dump = write_fixture(&dir, "fault.bin", &fault_dump());

    Command::cargo_bin("labwired-diag")?
        .arg("fault")
        .arg(&dump)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fault count:         1"))
        .stdout(predicate::str::contains("UsageFault - Divide by 0"))
        .stdout(predicate::str::contains("Program Counter:     0x08000440"));
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_fault_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let dump = write_fixture(&dir, "fault.bin", &fault_dump());

    let output = Command::cargo_bin("labwired-diag")?
        .arg("fault")
        .arg(&dump)
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["valid"], true);
    assert!(report.get("error").is_none());
    assert_eq!(report["info"]["registers"]["return_address"], 0x0800_0440);
    assert_eq!(report["causes"][0]["cause"], "DivideByZero");
    assert_eq!(report["causes"][0]["category"], "UsageFault");
    Ok(())
}

#[test]
#[allow(deprecated)]
fn test_cleared_fault_record_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let dump = write_fixture(&dir, "fault.bin", &FaultInfo::empty().to_bytes());

    Command::cargo_bin("labwired-diag")?
        .arg("fault")
        .arg(&dump)
        .assert()
        .code(3)
        .stdout(predicate::str::contains("No fault saved yet"));

    let mut corrupt = fault_dump();
    corrupt[20] ^= 0xFF;
    let dump = write_fixture(&dir, "corrupt.bin", &corrupt);
    let output = Command::cargo_bin("labwired-diag")?
        .args(["--json", "fault"])
        .arg(&dump)
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["valid"], false);
    assert!(report["error"].as_str().unwrap().contains("CRC"));
    Ok(())
}
