//! irtrace - decode captured IR transaction logs between paired handhelds.
//!
//! # Commands
//!
//! - `irtrace decode` - decode a captured transaction log to a readable trace
//! - `irtrace decompress` - expand one captured compressed write payload
//! - `irtrace extract` - copy a byte range out of a memory image

mod decode;
mod decompress;
mod extract;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "irtrace")]
#[command(about = "Decode captured walker IR transaction logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a captured transaction log to a readable trace
    Decode(decode::DecodeArgs),

    /// Expand one captured compressed write payload to a file
    Decompress(decompress::DecompressArgs),

    /// Copy a byte range out of a memory image
    Extract(extract::ExtractArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Decode(args) => decode::run(args),
        Commands::Decompress(args) => decompress::run(args),
        Commands::Extract(args) => extract::run(args),
    }
}
