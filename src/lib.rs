// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod comparator;
mod hierarchy;
mod tokenizer;
mod value;
mod vcdfile;

/// Cargo.toml version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Matching, warning and mode switches. Built once from the command line
/// before any file is parsed and treated as read-only afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Match variable names case-sensitively instead of folding them to lower case.
    pub case_sensitive: bool,
    /// Match variables even when their declared types differ.
    pub ignore_var_type: bool,
    /// Match variables of equal size even when their index ranges differ.
    pub ignore_var_index: bool,

    /// Do not register variables declared inside `module` scopes.
    pub skip_module: bool,
    /// Do not register variables declared inside `function` scopes.
    pub skip_function: bool,
    /// Do not register variables declared inside `task` scopes.
    pub skip_task: bool,

    pub warn_missing_scopes: bool,
    pub warn_missing_vars: bool,
    pub warn_missing_tstamps: bool,
    pub warn_alias: bool,
    pub warn_unexpected_tokens: bool,
    pub warn_size_mismatch: bool,
    pub warn_type_mismatch: bool,

    /// Compare states instead of transitions: `prev` keeps the last distinct
    /// value instead of being rolled forward every timestamp.
    pub compare_states: bool,
    /// Emit one `<timestamp>:<hash>` line per advanced timestamp instead of diffs.
    pub test_mode: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            case_sensitive: false,
            ignore_var_type: false,
            ignore_var_index: false,
            skip_module: false,
            skip_function: false,
            skip_task: false,
            warn_missing_scopes: true,
            warn_missing_vars: true,
            warn_missing_tstamps: true,
            warn_alias: true,
            warn_unexpected_tokens: true,
            warn_size_mismatch: true,
            warn_type_mismatch: true,
            compare_states: false,
            test_mode: false,
        }
    }
}

impl Options {
    pub fn disable_all_warnings(&mut self) {
        self.warn_missing_scopes = false;
        self.warn_missing_vars = false;
        self.warn_missing_tstamps = false;
        self.warn_alias = false;
        self.warn_unexpected_tokens = false;
        self.warn_size_mismatch = false;
        self.warn_type_mismatch = false;
    }
}

pub use comparator::{CompareError, Comparator, Link, LinkRef};
pub use hierarchy::{Hierarchy, Scope, ScopeRef, ScopeType, VarKind, VarRef, VarType, Variable};
pub use tokenizer::Tokenizer;
pub use value::{Real, Value, UNINITIALIZED};
pub use vcdfile::{VcdFile, VcdParseError};
