//! # gosymtab - Main Entry Point
//!
//! Opens a Go binary, decodes its line table and build manifest, and prints
//! a report:
//! - **Text** (default): counts, file and package listings, modules
//! - **JSON** (`--json`): the same report for other tools
//!
//! Addresses passed with `--resolve` are symbolized against the line table.

use anyhow::{Context, Result};
use clap::Parser;
use gosymtab::analysis;
use gosymtab::cli::Args;
use gosymtab::export::Report;
use log::info;
use std::io::{self, BufWriter, Write};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    // clap exits with status 2 on usage errors
    let args = Args::parse();
    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    let analysis = analysis::analyze(&args.file)?;
    info!(
        "Analysis of {} finished with {} diagnostics",
        args.file.display(),
        analysis.diagnostics.records().len()
    );

    let report = Report::new(&analysis, &args.resolve);
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    if args.json {
        report.write_json(&mut writer)?;
        writeln!(writer)?;
    } else {
        report.write_text(&mut writer, args.quiet)?;
    }
    writer.flush().context("Failed to flush report")?;
    Ok(())
}
