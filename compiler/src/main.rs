use clap::Parser as ClapParser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;

use compiler::Unit;

/// Exit code for command-line usage errors.
const EX_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(
    name = "lanka-compile",
    version,
    about = "Compile L source files into a bytecode image"
)]
struct Cli {
    /// Source files to compile, in module order; the first becomes the
    /// main module
    #[arg(required = true, value_name = "FILE")]
    files: Vec<String>,

    /// Where to write the compiled bytecode
    #[arg(short = 'o', value_name = "PATH")]
    output: String,
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

    let mut unit = Unit::new();
    for path in &cli.files {
        if let Err(err) = unit.compile_file(path) {
            eprintln!("{err}");
            process::exit(1);
        }
    }

    let file = File::create(&cli.output).unwrap_or_else(|err| {
        eprintln!(
            "unable to open file `{}` for writing: {err}",
            cli.output
        );
        process::exit(1);
    });
    let mut writer = BufWriter::new(file);
    if let Err(err) = unit.write(&mut writer).and_then(|()| writer.flush()) {
        eprintln!("unable to write `{}`: {err}", cli.output);
        process::exit(1);
    }
}
