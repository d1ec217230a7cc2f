//! Register allocation trace tool.
//!
//! Reads a unit in the text IR format (from a file or stdin), compiles it and
//! prints the resulting bytecode. Run with `-vv` or `RUST_LOG=trace` to see
//! every allocation and release as it happens.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use log::{info, LevelFilter};

use ssa_bytecode::compiler::UnitCompiler;
use ssa_bytecode::text_ir;

#[derive(Parser, Debug)]
#[command(name = "regtrace", about = "Compile text IR to register bytecode")]
struct Args {
    /// Text IR input; reads stdin when omitted.
    input: Option<PathBuf>,

    /// Print compilation statistics after the bytecode.
    #[arg(long)]
    stats: bool,

    /// Print the parsed IR with addresses and dependents before compiling.
    #[arg(long)]
    ir: bool,

    /// Mark the compiled unit as a REPL unit.
    #[arg(long)]
    repl: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let source = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let unit = text_ir::parse_unit(&source)?;
    info!("parsed {} functions", unit.len());

    if args.ir {
        print!("{}", text_ir::print(&unit));
        println!();
    }

    let (compiled, stats) = UnitCompiler::new(&unit)
        .with_repl(args.repl)
        .compile_with_stats()?;

    for function in &compiled.functions {
        println!(
            "function {} (#{}): {} registers, {} locals",
            function.name, function.id, function.registers, function.locals
        );
        if !function.locals_names.is_empty() {
            println!("  locals: {}", function.locals_names.join(", "));
        }
        for basic_block in &function.basic_blocks {
            println!("  {} (@{}):", basic_block.name, basic_block.id);
            for instruction in &basic_block.instructions {
                println!("    {instruction}");
            }
        }
    }

    if args.stats {
        println!();
        print!("{stats}");
    }

    Ok(())
}
