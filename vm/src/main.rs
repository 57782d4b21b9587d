use clap::Parser as ClapParser;
use std::fs::File;
use std::io::BufReader;
use std::process;
use std::rc::Rc;

use vm::materialize::materialize_module;
use vm::scheduler::Scheduler;
use vm::Runtime;

/// Exit code for command-line usage errors.
const EX_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(
    name = "lanka",
    version,
    about = "Execute a compiled bytecode image"
)]
struct Cli {
    /// Compiled bytecode image to execute
    #[arg(value_name = "FILE")]
    file: String,

    /// Arguments exposed to the program
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    arguments: Vec<String>,

    /// Fork to the background before executing
    #[arg(short = 'f')]
    fork: bool,
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let code = if err.use_stderr() { EX_USAGE } else { 0 };
        let _ = err.print();
        process::exit(code);
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let file = File::open(&cli.file).unwrap_or_else(|err| {
        eprintln!("unable to open file `{}` for reading: {err}", cli.file);
        process::exit(1);
    });
    let mut reader = BufReader::new(file);
    let modules = bytecode::load(&mut reader).unwrap_or_else(|err| {
        eprintln!("{}: {err}", cli.file);
        process::exit(1);
    });

    let runtime = Runtime::with_arguments(cli.arguments);
    let mut scheduler = Scheduler::new(Rc::clone(&runtime));

    // The first module in the image is the main module; every module is
    // registered for import.
    let mut main_values = None;
    for module in &modules {
        let values = materialize_module(module);
        if main_values.is_none() {
            main_values = Some(values.clone());
        }
        runtime.register_module(&module.name, values);
    }
    if let Some(values) = main_values {
        scheduler.spawn(values);
    }

    if cli.fork {
        detach();
    }

    let mut error_occurred = false;
    while !scheduler.is_finished() {
        if scheduler.step() {
            error_occurred = true;
        }
    }

    process::exit(if error_occurred { 1 } else { 0 });
}

/// Detach to the background: the parent exits immediately and the child
/// keeps the scheduler.
#[cfg(unix)]
fn detach() {
    if unsafe { libc::fork() } != 0 {
        process::exit(0);
    }
}

#[cfg(not(unix))]
fn detach() {
    eprintln!("Forking to background is not supported on this platform.");
}
