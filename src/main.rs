// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::{Parser, ValueEnum};
use std::io::Write;
use std::process::ExitCode;
use vcdiff::{Comparator, Options, VcdFile};

#[derive(Parser, Debug)]
#[command(name = "vcdiff")]
#[command(version)]
#[command(about = "Compares two VCD waveform files and reports signals that differ at each timestamp.", long_about = None)]
struct Args {
    /// Compare states instead of transitions.
    #[arg(short = 's')]
    compare_states: bool,

    /// Relax the rules used when mapping variables between the files.
    #[arg(short = 'r', value_name = "FLAG")]
    relax: Vec<RelaxFlag>,

    /// Skip all variables declared inside scopes of the given kind.
    #[arg(short = 'S', value_name = "KIND")]
    skip: Vec<SkipKind>,

    /// Disable a warning category.
    #[arg(short = 'W', value_name = "FLAG")]
    warnings: Vec<WarnFlag>,

    #[arg(value_name = "FILE1")]
    file1: String,
    #[arg(value_name = "FILE2")]
    file2: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RelaxFlag {
    /// Case-sensitive variable matching (names are folded to lower case otherwise).
    Case,
    /// Match different but compatible types (e.g. integer to reg[31:0]).
    Type,
    /// Match variables of the same size but different index ranges (e.g. reg[3:0] to reg[4:1]).
    Index,
    /// All of the above.
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SkipKind {
    Module,
    Function,
    Task,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum WarnFlag {
    /// Do not warn about scopes that do not occur in one of the files.
    NoMissingScope,
    /// Do not warn about variables that do not occur in one of the files.
    NoMissingVar,
    /// Do not warn about timestamps that do not occur in one of the files.
    NoMissingTstamp,
    /// Do not warn about duplicated variables (it is normal in VCD files).
    NoAlias,
    /// Do not warn about unexpected tokens.
    NoUnexpToken,
    /// Do not warn about variables with mismatching sizes.
    NoSizeMismatch,
    /// Do not warn about variables with mismatching types.
    NoTypeMismatch,
    /// Disable all warnings.
    NoAll,
}

fn build_options(args: &Args) -> Options {
    let mut options = Options::default();

    for flag in &args.relax {
        match flag {
            RelaxFlag::Case => options.case_sensitive = true,
            RelaxFlag::Type => options.ignore_var_type = true,
            RelaxFlag::Index => options.ignore_var_index = true,
            RelaxFlag::All => {
                options.case_sensitive = true;
                options.ignore_var_type = true;
                options.ignore_var_index = true;
            }
        }
    }

    for kind in &args.skip {
        match kind {
            SkipKind::Module => options.skip_module = true,
            SkipKind::Function => options.skip_function = true,
            SkipKind::Task => options.skip_task = true,
        }
    }

    for flag in &args.warnings {
        match flag {
            WarnFlag::NoMissingScope => options.warn_missing_scopes = false,
            WarnFlag::NoMissingVar => options.warn_missing_vars = false,
            WarnFlag::NoMissingTstamp => options.warn_missing_tstamps = false,
            WarnFlag::NoAlias => options.warn_alias = false,
            WarnFlag::NoUnexpToken => options.warn_unexpected_tokens = false,
            WarnFlag::NoSizeMismatch => options.warn_size_mismatch = false,
            WarnFlag::NoTypeMismatch => options.warn_type_mismatch = false,
            WarnFlag::NoAll => options.disable_all_warnings(),
        }
    }

    options.compare_states = args.compare_states;

    if std::env::var_os("TEST_VCDIFF").is_some() {
        options.test_mode = true;
        options.disable_all_warnings();
    }

    options
}

fn main() -> ExitCode {
    let args = Args::parse();
    let options = build_options(&args);

    let file1 = match VcdFile::open(&args.file1, options) {
        Ok(f) => f,
        Err(_) => {
            eprintln!("Error opening file {}", args.file1);
            return ExitCode::from(1);
        }
    };
    let file2 = match VcdFile::open(&args.file2, options) {
        Ok(f) => f,
        Err(_) => {
            eprintln!("Error opening file {}", args.file2);
            return ExitCode::from(1);
        }
    };

    let out = std::io::BufWriter::new(std::io::stdout().lock());
    let mut comparator = Comparator::new(file1, file2, options, out);
    match comparator.compare() {
        Ok(()) => {
            let mut out = comparator.into_inner();
            if out.flush().is_err() {
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
