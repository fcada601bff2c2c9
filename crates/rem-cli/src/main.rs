//! Register Execution Machine - CLI
//!
//! Loads a program image, wires up the host environment, and runs the
//! machine to completion.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rem_core::{ExitValue, ProgramImage, RemConfig, VirtualMachine};
use rem_host::{MemoryEnvironment, Println};

#[derive(Parser)]
#[command(name = "rem", about = "Register Execution Machine", version)]
struct Args {
    /// Program image: a flat sequence of 32-bit big-endian words
    image: PathBuf,

    /// Seed an integer environment variable (repeatable)
    #[arg(short = 'D', long = "define", value_name = "KEY=INT")]
    define: Vec<String>,

    /// Execute one instruction at a time, reporting the fetch address
    #[arg(long)]
    step: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Read the program image
    let bytes = match fs::read(&args.image) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: failed to read program image: {}", e);
            process::exit(1);
        }
    };

    let image = match ProgramImage::from_bytes(&bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: invalid program image: {}", e);
            process::exit(1);
        }
    };

    // Wire up the host environment
    let mut env = MemoryEnvironment::new();
    env.define_callable("println", Println::stdout());

    for definition in &args.define {
        match parse_definition(definition) {
            Some((key, value)) => env.define_int(key, value),
            None => {
                eprintln!("Error: invalid definition \"{}\" (expected KEY=INT)", definition);
                process::exit(1);
            }
        }
    }

    // Create and load the machine
    let mut vm = VirtualMachine::new(RemConfig::default(), Box::new(env));
    if let Err(e) = vm.load_program(&image.words) {
        eprintln!("Error: program image does not fit in main memory: {}", e);
        process::exit(1);
    }

    // Execute
    let exit = if args.step {
        run_stepped(&mut vm)
    } else {
        vm.run()
    };

    match exit {
        Ok(ExitValue::Int(n)) => println!("exit: {}", n),
        Ok(ExitValue::Value(value)) => println!("exit: {:?}", value),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn run_stepped(vm: &mut VirtualMachine) -> rem_core::RemResult<ExitValue> {
    loop {
        if let Ok(pc) = vm.peek_register(2) {
            eprintln!("step: pc = {:?}", pc);
        }
        if let Some(exit) = vm.step()? {
            return Ok(exit);
        }
    }
}

fn parse_definition(definition: &str) -> Option<(&str, i32)> {
    let (key, value) = definition.split_once('=')?;
    Some((key, value.parse().ok()?))
}
