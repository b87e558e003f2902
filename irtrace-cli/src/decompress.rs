//! `irtrace decompress`: expand one captured compressed write payload.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use irtrace_core::decomp::{decompress, BLOCK_LEN};
use irtrace_core::framer::HEADER_LEN;

#[derive(Args)]
pub struct DecompressArgs {
    /// One captured packet: 8-byte header followed by the compressed payload
    pub input: PathBuf,

    /// Destination for the decompressed block
    pub output: PathBuf,
}

pub fn run(args: DecompressArgs) -> Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("cannot read packet {}", args.input.display()))?;
    if bytes.len() < HEADER_LEN {
        bail!(
            "packet file {} is shorter than the {HEADER_LEN}-byte header",
            args.input.display()
        );
    }
    let block = decompress(&bytes[HEADER_LEN..], BLOCK_LEN)
        .with_context(|| format!("cannot decompress {}", args.input.display()))?;
    fs::write(&args.output, block.as_bytes())
        .with_context(|| format!("cannot write block to {}", args.output.display()))?;
    println!(
        "decompressed {} input bytes to {} bytes",
        bytes.len() - HEADER_LEN,
        block.len()
    );
    Ok(())
}
