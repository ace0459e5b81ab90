//! pzc CLI
//!
//! Thin command-line driver over the [`pzc`] library: read a source file,
//! compile it, write the trace and code streams to the requested
//! destinations, and map any diagnostic to a nonzero exit code.

use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use std::process;

use pzc::CompilerConfig;

#[derive(ClapParser)]
#[command(name = "pzc")]
#[command(about = "Single-pass compiler for the P0 language", long_about = None)]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Enable grammar-rule lines in the trace stream
    #[arg(short, long)]
    debug: bool,

    /// Suppress the trace stream entirely
    #[arg(short, long)]
    quiet: bool,

    /// Write the instruction stream here instead of stdout
    #[arg(long)]
    code_out: Option<PathBuf>,

    /// Write the trace stream here instead of stdout
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: failed to read {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let config = CompilerConfig::new()
        .with_debug(cli.debug)
        .with_suppress(cli.quiet);

    match pzc::compile(&source, &config) {
        Ok(output) => {
            for warning in &output.warnings {
                eprintln!("{}", warning);
            }

            if let Err(e) = write_stream(cli.trace_out.as_deref(), &output.trace) {
                eprintln!("Error: failed to write trace stream: {}", e);
                process::exit(1);
            }
            if let Err(e) = write_stream(cli.code_out.as_deref(), &output.code) {
                eprintln!("Error: failed to write code stream: {}", e);
                process::exit(1);
            }
        }
        Err(diagnostic) => {
            eprintln!("{}", diagnostic);
            process::exit(1);
        }
    }
}

fn write_stream(path: Option<&std::path::Path>, contents: &str) -> std::io::Result<()> {
    match path {
        Some(path) => fs::write(path, contents),
        None => {
            print!("{}", contents);
            Ok(())
        }
    }
}
