// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info};

use labwired_evr::logfmt::{LogFrame, LogReader};
use labwired_evr::reader::{parse_records, BufferView, Entry, Event};
use labwired_fault::{causes, FaultEntry, FaultInfo};

mod report;

const EXIT_OK: u8 = 0;
const EXIT_INPUT_ERROR: u8 = 2;
const EXIT_DECODE_ERROR: u8 = 3;

fn parse_u32(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid value '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "LabWired event recorder and fault decoder", long_about = None)]
struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a raw dump of the event record ring.
    Buffer(BufferArgs),
    /// Decode a binary event log written by a log sink.
    Log(LogArgs),
    /// Validate and print a fault record dump.
    Fault(FaultArgs),
}

#[derive(Parser, Debug)]
struct BufferArgs {
    /// Memory dump of the record ring (16 bytes per record)
    dump: PathBuf,

    /// Recorder allocation counter at the time of the dump; guessed when omitted
    #[arg(long, value_parser = parse_u32)]
    index: Option<u32>,
}

#[derive(Parser, Debug)]
struct LogArgs {
    /// Event log file
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct FaultArgs {
    /// Memory dump of the fault record (140 bytes)
    dump: PathBuf,
}

/// How a command failed, which decides the exit code.
enum Failure {
    Input(anyhow::Error),
    Decode(anyhow::Error),
}

type CommandResult = Result<(), Failure>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(io::stderr)
            .init();
    }

    let result = match &cli.command {
        Commands::Buffer(args) => run_buffer(args, cli.json),
        Commands::Log(args) => run_log(args, cli.json),
        Commands::Fault(args) => run_fault(args, cli.json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(Failure::Input(e)) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_INPUT_ERROR)
        }
        Err(Failure::Decode(e)) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_DECODE_ERROR)
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, Failure> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {:?}", path))
        .map_err(Failure::Input)?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);
    Ok(bytes)
}

fn emit_json<T: Serialize>(value: &T) -> CommandResult {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)
        .context("Failed to serialize output")
        .map_err(Failure::Decode)?;
    writeln!(out).context("Failed to write output").map_err(Failure::Input)
}

fn emit_text(text: &str) -> CommandResult {
    io::stdout()
        .lock()
        .write_all(text.as_bytes())
        .context("Failed to write output")
        .map_err(Failure::Input)
}

#[derive(Serialize)]
struct BufferReport<'a> {
    slots: usize,
    record_index: u32,
    inferred_index: bool,
    records: &'a [Entry],
    events: &'a [Event],
}

fn run_buffer(args: &BufferArgs, json: bool) -> CommandResult {
    let bytes = read_input(&args.dump)?;
    let records = parse_records(&bytes)
        .with_context(|| format!("Invalid event buffer {:?}", args.dump))
        .map_err(Failure::Decode)?;
    let record_index = args
        .index
        .unwrap_or_else(|| BufferView::infer_index(&records));
    if args.index.is_none() {
        info!("No --index given, assuming record index {}", record_index);
    }

    let view = BufferView::new(&records, record_index)
        .with_context(|| format!("Invalid event buffer {:?}", args.dump))
        .map_err(Failure::Decode)?;
    let events = view.assemble();
    debug!(
        "{} of {} slots retained, {} events",
        view.entries().len(),
        records.len(),
        events.len()
    );

    let report = BufferReport {
        slots: records.len(),
        record_index,
        inferred_index: args.index.is_none(),
        records: view.entries(),
        events: &events,
    };
    if json {
        emit_json(&report)
    } else {
        emit_text(&report::buffer(&report))
    }
}

fn run_log(args: &LogArgs, json: bool) -> CommandResult {
    let bytes = read_input(&args.file)?;
    let frames: Vec<LogFrame<'_>> = LogReader::new(&bytes)
        .collect::<Result<_, _>>()
        .with_context(|| format!("Invalid event log {:?}", args.file))
        .map_err(Failure::Decode)?;
    debug!("Decoded {} frames", frames.len());

    if json {
        emit_json(&frames)
    } else {
        emit_text(&report::log(&frames))
    }
}

#[derive(Serialize)]
struct FaultReport<'a> {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    info: &'a FaultInfo,
    causes: Vec<FaultEntry>,
}

fn run_fault(args: &FaultArgs, json: bool) -> CommandResult {
    let bytes = read_input(&args.dump)?;
    let info = FaultInfo::from_bytes(&bytes)
        .with_context(|| format!("Invalid fault record {:?}", args.dump))
        .map_err(Failure::Decode)?;
    let validity = info.validate();

    if json {
        let report = FaultReport {
            valid: validity.is_ok(),
            error: validity.err().map(|e| e.to_string()),
            info: &info,
            causes: if validity.is_ok() {
                causes(&info).collect()
            } else {
                Vec::new()
            },
        };
        emit_json(&report)?;
    } else {
        let mut text = String::new();
        labwired_fault::print(&info, &mut text)
            .map_err(|e| Failure::Decode(anyhow!("Failed to format fault report: {}", e)))?;
        emit_text(&text)?;
    }

    validity
        .with_context(|| format!("Fault record {:?} is not usable", args.dump))
        .map_err(Failure::Decode)
}
