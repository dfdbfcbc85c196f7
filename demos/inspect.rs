//! Loads a binary and prints a summary of what the core found: symbol
//! count, stub counts per kind, relocation table count, and segment
//! count. Run with `RUST_LOG=trace` to see internal tracing alongside
//! the diagnostic warnings `vitalink_core::Binary::load` reports through
//! `StderrSink`.

use std::env;
use std::process::ExitCode;

use vitalink_core::{Binary, StderrSink};

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: inspect <path-to-elf>");
        return ExitCode::FAILURE;
    };

    let mut sink = StderrSink;
    let binary = match Binary::load(&path, &mut sink) {
        Ok(binary) => binary,
        Err(err) => {
            eprintln!("failed to load {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("symbols:            {}", binary.symbols().len());
    println!("function stubs:     {}", binary.function_stubs().stubs.len());
    println!("variable stubs:     {}", binary.variable_stubs().stubs.len());
    println!("relocation tables:  {}", binary.relocation_tables().len());
    println!("segments:           {}", binary.segments().len());

    ExitCode::SUCCESS
}
