//! CLI driver: a `clap::Parser` wraps the core's run-time options, builds a
//! [`transpiler_session::Session`], and hands a translation unit to
//! `transpiler_compile::translate_unit`.
//!
//! The C front end itself is deliberately out of scope (spec §1); this binary cannot parse real C
//! source. `--demo NAME` selects one of `transpiler_compile::fixtures`'s built-in translation units
//! so the pipeline can still be driven end to end from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use transpiler_compile::{fixtures, translate_unit};
use transpiler_session::{Options, Session};

/// Transpile a C translation unit into safe Rust source.
#[derive(Debug, Parser)]
#[command(name = "transpiler")]
struct Cli {
    /// Path to the input translation unit.
    ///
    /// Checked for existence even when `--demo` is used, so the "missing input file" failure mode
    /// is exercised the same way it would be against a real front end.
    input: PathBuf,

    /// Translate one of the built-in demonstration programs instead of parsing `input`.
    #[arg(long, value_name = "NAME")]
    demo: Option<String>,

    /// Print the names of the built-in demonstration programs and exit.
    #[arg(long)]
    list_demos: bool,

    /// Write emitted source to this file instead of the unit's name with a `.rs` extension.
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write emitted source to stdout instead of a file.
    #[arg(long, conflicts_with = "output")]
    stdout: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list_demos {
        for name in fixtures::NAMES {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    if !cli.input.exists() {
        eprintln!("error: input file not found: {}", cli.input.display());
        return ExitCode::FAILURE;
    }

    let Some(demo) = cli.demo.as_deref() else {
        eprintln!(
            "error: no C front end is wired into this build; pass --demo <NAME> to exercise the pipeline \
             (run --list-demos to see available names)"
        );
        return ExitCode::FAILURE;
    };

    let Some(unit) = fixtures::by_name(demo) else {
        eprintln!("error: unknown demo `{demo}` (run --list-demos to see available names)");
        return ExitCode::FAILURE;
    };

    let unit_name = unit.name.clone();
    let mut session = Session::new(unit_name.to_string(), Options::default());
    let translation = match translate_unit(unit, &mut session) {
        Ok(translation) => translation,
        Err(fatal) => {
            eprintln!("error: {fatal}");
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in session.diagnostics.records() {
        eprintln!("{diagnostic}");
    }

    if cli.stdout {
        println!("{}", translation.source);
    } else {
        let output = cli.output.unwrap_or_else(|| PathBuf::from(format!("{unit_name}.rs")));
        if let Err(err) = std::fs::write(&output, &translation.source) {
            eprintln!("error: could not write `{}`: {err}", output.display());
            return ExitCode::FAILURE;
        }
    }

    if session.diagnostics.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
