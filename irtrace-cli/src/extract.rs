//! `irtrace extract`: copy a byte range out of a memory image.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

#[derive(Args)]
pub struct ExtractArgs {
    /// Memory image to read from
    pub input: PathBuf,

    /// Destination file for the extracted range
    pub output: PathBuf,

    /// Start address, hex (0x..) or decimal
    #[arg(value_parser = parse_number)]
    pub addr: usize,

    /// Number of bytes to copy, hex (0x..) or decimal
    #[arg(value_parser = parse_number)]
    pub len: usize,
}

fn parse_number(s: &str) -> Result<usize, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("cannot read image {}", args.input.display()))?;
    let end = match args.addr.checked_add(args.len) {
        Some(end) if end <= bytes.len() => end,
        _ => bail!(
            "range 0x{:x}+0x{:x} exceeds image size 0x{:x}",
            args.addr,
            args.len,
            bytes.len()
        ),
    };
    eprintln!(
        "copying 0x{:x} bytes from {}:0x{:04x} to {}",
        args.len,
        args.input.display(),
        args.addr,
        args.output.display()
    );
    fs::write(&args.output, &bytes[args.addr..end])
        .with_context(|| format!("cannot write range to {}", args.output.display()))?;
    Ok(())
}
