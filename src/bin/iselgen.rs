// src/bin/iselgen.rs
//! The selector meta-tool: parses a rule file and writes the compiled,
//! normalized table (rules grouped per operator, in match order, with
//! assigned ids). The output is itself in the rule grammar, so the
//! selector can load either file and the two can never drift apart.
use brine::isel::rules::RuleTable;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Generates the instruction selector's rule table")]
struct Args {
    /// Input rule file (pattern grammar)
    #[arg(value_name = "patterns.in")]
    patterns: PathBuf,

    /// Output path for the compiled table
    #[arg(value_name = "table.out")]
    table: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let text = match std::fs::read_to_string(&args.patterns) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("failed to read '{}': {e}", args.patterns.display());
            return ExitCode::FAILURE;
        }
    };

    let table = match RuleTable::parse(&text) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("{}: {e}", args.patterns.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&args.table, table.render()) {
        eprintln!("failed to write '{}': {e}", args.table.display());
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
