//! `irtrace decode`: load a capture, decode it, print the trace.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use irtrace_core::decoder::{decode_log, DecodeOptions, Event, DEFAULT_MAX_PACKETS};

use crate::render;

#[derive(Args)]
pub struct DecodeArgs {
    /// Captured transaction log (advertising byte + handshake + packets)
    pub file: PathBuf,

    /// Emit the decoded event list as JSON instead of a readable trace
    #[arg(long)]
    pub json: bool,

    /// Capacity limit on framed packets
    #[arg(long, default_value_t = DEFAULT_MAX_PACKETS)]
    pub max_packets: usize,
}

pub fn run(args: DecodeArgs) -> Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("cannot read capture {}", args.file.display()))?;
    let options = DecodeOptions {
        max_packets: args.max_packets,
    };
    let log = decode_log(&bytes, &options)
        .with_context(|| format!("cannot decode capture {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&log)?);
        return Ok(());
    }

    println!("session id: {}", log.session);
    for event in &log.events {
        match event {
            Event::Run(run) => println!("{}", render::run_report(run)),
            Event::Packet(record) => print!("{}", render::packet_record(record)),
        }
    }
    if let Some(err) = &log.framing_error {
        eprintln!("framing stopped early: {err}");
    }
    println!("finished with {} packets", log.packet_count);
    println!("({} unrecognized)", log.unrecognized);
    Ok(())
}
