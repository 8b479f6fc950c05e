//! CLI argument definitions

use crate::domain::Address;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gosymtab",
    about = "Extract symbols, source locations and build metadata from Go binaries",
    after_help = "\
EXAMPLES:
    gosymtab ./server                              Summarize line table and modules
    gosymtab ./server --resolve 0x4a2f10           Resolve an address to file:line
    gosymtab ./server --json > report.json         Machine-readable report
    RUST_LOG=debug gosymtab ./server               Trace every decoding step"
)]
pub struct Args {
    /// Executable to analyze (ELF, Mach-O or PE)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Resolve a program counter (hex with 0x prefix, or decimal); repeatable
    #[arg(short, long, value_name = "ADDR", value_parser = Address::parse)]
    pub resolve: Vec<Address>,

    /// Write the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Suppress file and package listings
    #[arg(short, long)]
    pub quiet: bool,
}
