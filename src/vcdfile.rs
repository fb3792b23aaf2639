// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::comparator::LinkRef;
use crate::hierarchy::{Hierarchy, ScopeRef, ScopeType, VarRef, VarType, Variable};
use crate::tokenizer::Tokenizer;
use crate::value::Value;
use crate::Options;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io::BufRead;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VcdParseError {
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("expected $end for ${0} section")]
    MissingEnd(String),
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("$upscope without a matching $scope")]
    UnbalancedUpscope,
    #[error("unknown variable type: {0}")]
    UnknownVarType(String),
    #[error("expected variable size, but found `{0}`")]
    InvalidVarSize(String),
    #[error("invalid timescale base: {0}")]
    InvalidTimescaleBase(String),
    #[error("invalid timescale units: {0}")]
    InvalidTimescaleUnit(String),
    #[error("variable range does not match its size: {0}")]
    RangeSizeMismatch(String),
    #[error("duplicate declaration of variable `{0}`")]
    DuplicateVariable(String),
    #[error("unsupported variable declaration: {0}")]
    UnsupportedVar(String),
}

pub type Result<T> = std::result::Result<T, VcdParseError>;

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// One VCD input: its tokenizer, scope tree, identifier bindings and the
/// one-step timestamp lookahead used by the comparator to merge two streams.
pub struct VcdFile<R: BufRead> {
    filename: String,
    tokenizer: Tokenizer<R>,
    hierarchy: Hierarchy,
    idents: FxHashMap<Vec<u8>, VarRef>,
    /// log10 of one time unit in seconds.
    timescale: i32,
    cur_timestamp: u64,
    next_timestamp: u64,
    cur_scope: ScopeRef,
    /// Depth of the surrounding scopes whose kinds are skipped per options.
    skipped_scopes: u32,
    options: Options,
}

impl VcdFile<std::io::BufReader<std::fs::File>> {
    pub fn open(path: impl AsRef<std::path::Path>, options: Options) -> std::io::Result<Self> {
        let file = std::fs::File::open(&path)?;
        Ok(Self::new(
            path.as_ref().display().to_string(),
            std::io::BufReader::new(file),
            options,
        ))
    }
}

impl<R: BufRead> VcdFile<R> {
    pub fn new(filename: String, input: R, options: Options) -> Self {
        let hierarchy = Hierarchy::new();
        let cur_scope = hierarchy.root();
        VcdFile {
            filename,
            tokenizer: Tokenizer::new(input),
            hierarchy,
            idents: FxHashMap::default(),
            timescale: 0,
            cur_timestamp: 0,
            next_timestamp: 0,
            cur_scope,
            skipped_scopes: 0,
            options,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn valid(&self) -> bool {
        self.tokenizer.valid()
    }

    pub fn line_number(&self) -> u32 {
        self.tokenizer.line_number()
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    pub fn next_timestamp(&self) -> u64 {
        self.next_timestamp
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    /// The variable bound to a value-change identifier.
    pub fn var_by_ident(&self, ident: &[u8]) -> Option<VarRef> {
        self.idents.get(ident).copied()
    }

    fn warn(&self, msg: &str) {
        eprintln!(
            "Warning: {}:{}: {}",
            self.filename,
            self.tokenizer.line_number(),
            msg
        );
    }

    /// Consumes header sections until `$enddefinitions $end`.
    pub fn parse_header(&mut self) -> Result<()> {
        loop {
            let token = match self.tokenizer.next() {
                Some(t) => t.to_vec(),
                None => return Err(VcdParseError::UnexpectedEof),
            };
            match token.as_slice() {
                b"$var" => self.parse_var()?,
                b"$scope" => self.parse_scope()?,
                b"$upscope" => self.parse_upscope()?,
                b"$enddefinitions" => return self.parse_enddefinitions(),
                b"$timescale" => self.parse_timescale()?,
                b"$version" | b"$comment" | b"$date" => self.skip_to_end(&token[1..])?,
                // values are going to be initialized either way
                b"$dumpvars" => {}
                b"$dumpon" | b"$dumpoff" | b"$dumpall" => {
                    if self.options.warn_unexpected_tokens {
                        self.warn(&format!(
                            "section type '{}' is not handled",
                            lossy(&token[1..])
                        ));
                    }
                }
                other => {
                    if self.options.warn_unexpected_tokens {
                        return Err(VcdParseError::UnexpectedToken(lossy(other).into_owned()));
                    }
                }
            }
        }
    }

    fn parse_enddefinitions(&mut self) -> Result<()> {
        if !self.tokenizer.expect(b"$end") {
            return Err(VcdParseError::MissingEnd("enddefinitions".to_string()));
        }
        Ok(())
    }

    /// Skips all tokens until `$end`. A new `$`-section before that is an error.
    fn skip_to_end(&mut self, section: &[u8]) -> Result<()> {
        loop {
            match self.tokenizer.next() {
                None => return Err(VcdParseError::MissingEnd(lossy(section).into_owned())),
                Some(t) if t == b"$end".as_slice() => return Ok(()),
                Some(t) if t.starts_with(b"$") => {
                    return Err(VcdParseError::MissingEnd(lossy(section).into_owned()))
                }
                Some(_) => {}
            }
        }
    }

    fn skip_kind(&self, tpe: ScopeType) -> bool {
        match tpe {
            ScopeType::Module => self.options.skip_module,
            ScopeType::Function => self.options.skip_function,
            ScopeType::Task => self.options.skip_task,
            _ => false,
        }
    }

    fn parse_scope(&mut self) -> Result<()> {
        let tpe = match self.tokenizer.next() {
            Some(t) => parse_scope_type(t),
            None => return Err(VcdParseError::UnexpectedEof),
        };
        let name = match self.tokenizer.next() {
            Some(t) => lossy(t).into_owned(),
            None => return Err(VcdParseError::UnexpectedEof),
        };
        let name = self.fold_case(name);

        if self.skipped_scopes > 0 || self.skip_kind(tpe) {
            self.skipped_scopes += 1;
        } else {
            // simulators re-open scopes, continue in the existing one
            let child = match self.hierarchy.get_scope(self.cur_scope, &name) {
                Some(existing) => existing,
                None => self.hierarchy.make_scope(self.cur_scope, tpe, &name),
            };
            self.cur_scope = child;
        }

        if !self.tokenizer.expect(b"$end") {
            return Err(VcdParseError::MissingEnd("scope".to_string()));
        }
        Ok(())
    }

    fn parse_upscope(&mut self) -> Result<()> {
        if self.skipped_scopes > 0 {
            self.skipped_scopes -= 1;
        } else {
            match self.hierarchy[self.cur_scope].parent() {
                Some(parent) => self.cur_scope = parent,
                None => return Err(VcdParseError::UnbalancedUpscope),
            }
        }
        if !self.tokenizer.expect(b"$end") {
            return Err(VcdParseError::MissingEnd("upscope".to_string()));
        }
        Ok(())
    }

    fn parse_timescale(&mut self) -> Result<()> {
        let token = match self.tokenizer.next() {
            Some(t) => t.to_vec(),
            None => return Err(VcdParseError::UnexpectedEof),
        };
        // `10ns` and `10 ns` are both in use
        let digits = token.iter().take_while(|c| c.is_ascii_digit()).count();
        let base: u32 = lossy(&token[..digits])
            .parse()
            .map_err(|_| VcdParseError::InvalidTimescaleBase(lossy(&token).into_owned()))?;
        let mut timescale = match base {
            1 => 0,
            10 => 1,
            100 => 2,
            _ => return Err(VcdParseError::InvalidTimescaleBase(lossy(&token).into_owned())),
        };
        let unit: Vec<u8> = if digits < token.len() {
            token[digits..].to_vec()
        } else {
            match self.tokenizer.next() {
                Some(t) => t.to_vec(),
                None => return Err(VcdParseError::UnexpectedEof),
            }
        };
        timescale += match unit.as_slice() {
            b"fs" => -15,
            b"ps" => -12,
            b"ns" => -9,
            b"us" => -6,
            b"ms" => -3,
            b"s" => 0,
            _ => {
                return Err(VcdParseError::InvalidTimescaleUnit(
                    lossy(&unit).into_owned(),
                ))
            }
        };
        self.timescale = timescale;
        self.skip_to_end(b"timescale")
    }

    fn parse_var(&mut self) -> Result<()> {
        if self.skipped_scopes > 0 {
            // the declaration is dropped, just consume it
            loop {
                match self.tokenizer.next() {
                    None => return Err(VcdParseError::UnexpectedEof),
                    Some(t) if t == b"$end".as_slice() => return Ok(()),
                    Some(_) => {}
                }
            }
        }

        let tpe = match self.tokenizer.next() {
            Some(t) => {
                parse_var_type(t).ok_or_else(|| VcdParseError::UnknownVarType(lossy(t).into_owned()))?
            }
            None => return Err(VcdParseError::UnexpectedEof),
        };
        let size: i64 = match self.tokenizer.next() {
            Some(t) => lossy(t)
                .parse()
                .map_err(|_| VcdParseError::InvalidVarSize(lossy(t).into_owned()))?,
            None => return Err(VcdParseError::UnexpectedEof),
        };
        if size < 0 || (size == 0 && !matches!(tpe, VarType::Real | VarType::Parameter)) {
            return Err(VcdParseError::InvalidVarSize(size.to_string()));
        }
        let ident = match self.tokenizer.next() {
            Some(t) => t.to_vec(),
            None => return Err(VcdParseError::UnexpectedEof),
        };
        // the name may be spread over several tokens ("x [3:0]")
        let mut name = String::new();
        loop {
            match self.tokenizer.next() {
                None => return Err(VcdParseError::UnexpectedEof),
                Some(t) if t == b"$end".as_slice() => break,
                Some(t) => name.push_str(&lossy(t)),
            }
        }
        let name = self.fold_case(name);

        self.add_variable(&name, ident, size, tpe)
    }

    fn fold_case(&self, name: String) -> String {
        if self.options.case_sensitive {
            name
        } else {
            name.to_lowercase()
        }
    }

    /// Declaration dispatch: scalars, vectors, index chains, aliases and
    /// extensions of sparsely listed buses.
    fn add_variable(&mut self, name: &str, ident: Vec<u8>, size: i64, tpe: VarType) -> Result<()> {
        let (base, suffix) = split_name(name)?;
        if base.is_empty() {
            return Err(VcdParseError::UnsupportedVar(name.to_string()));
        }

        let mut left = if size > 0 { size - 1 } else { 0 };
        let mut right = 0;
        let idxs: Vec<i64> = match suffix {
            NameSuffix::None => Vec::new(),
            NameSuffix::Range(l, r) => {
                if size != (l - r).abs() + 1 {
                    return Err(VcdParseError::RangeSizeMismatch(name.to_string()));
                }
                left = l;
                right = r;
                Vec::new()
            }
            NameSuffix::Indices(v) => v,
        };

        let existing = self.hierarchy.get_variable(self.cur_scope, &base);
        let canonical = self.idents.get(&ident).copied();
        let new_ident = canonical.is_none();
        let mut var_ident: Option<VarRef> = canonical;

        if let Some(target) = canonical {
            // the identifier is already bound, this name is just an alias
            let alias = Variable::alias(base.clone(), target, &self.hierarchy[target]);
            let a = self.hierarchy.add_var(alias);
            self.hierarchy.set_var_scope(a, self.cur_scope);
            if self.options.warn_alias {
                eprintln!(
                    "Info: {}: '{}' is the same signal as '{}', creating an alias.",
                    self.filename,
                    self.hierarchy.display_name(a),
                    self.hierarchy.display_name(target)
                );
            }
            var_ident = Some(a);
        }

        match existing {
            None => {
                let var_name: VarRef;
                if tpe == VarType::Real || (size == 0 && tpe == VarType::Parameter) {
                    // degenerate real valued scalar, the declared size does not apply
                    let vi = match var_ident {
                        Some(v) => v,
                        None => self
                            .hierarchy
                            .add_var(Variable::real_scalar(tpe, base.clone(), ident.clone())),
                    };
                    var_ident = Some(vi);
                    var_name = vi;
                } else if size == 1 && idxs.is_empty() {
                    let vi = match var_ident {
                        Some(v) => v,
                        None => {
                            let var = if tpe.is_real_valued() {
                                Variable::real_scalar(tpe, base.clone(), ident.clone())
                            } else {
                                Variable::bit_scalar(tpe, base.clone(), ident.clone())
                            };
                            self.hierarchy.add_var(var)
                        }
                    };
                    var_ident = Some(vi);
                    var_name = vi;
                } else if size == 1 {
                    // one bit of a wider bus listed as its own variable; bits
                    // declared later merge into the same vector chain
                    let top = self.hierarchy.add_var(Variable::vector(
                        tpe,
                        idxs[0],
                        idxs[0],
                        base.clone(),
                        Vec::new(),
                    ));
                    let mut cur_vec = top;
                    for k in 1..idxs.len() {
                        let v = self.hierarchy.add_var(Variable::vector(
                            tpe,
                            idxs[k],
                            idxs[k],
                            String::new(),
                            Vec::new(),
                        ));
                        self.hierarchy.vector_add_child(cur_vec, idxs[k - 1], v);
                        cur_vec = v;
                    }
                    let vi = match var_ident {
                        Some(v) => v,
                        None => self
                            .hierarchy
                            .add_var(Variable::bit_scalar(tpe, base.clone(), ident.clone())),
                    };
                    self.hierarchy
                        .vector_add_child(cur_vec, idxs[idxs.len() - 1], vi);
                    var_ident = Some(vi);
                    var_name = top;
                } else if !idxs.is_empty() {
                    // single word of a multidimensional array
                    if idxs.len() != 1 {
                        return Err(VcdParseError::UnsupportedVar(name.to_string()));
                    }
                    let idx = idxs[0];
                    let top = self.hierarchy.add_var(Variable::vector(
                        tpe,
                        idx,
                        idx,
                        base.clone(),
                        Vec::new(),
                    ));
                    let vi = match var_ident {
                        Some(v) => v,
                        None => {
                            let word = self.hierarchy.add_var(Variable::vector(
                                tpe,
                                left,
                                right,
                                base.clone(),
                                ident.clone(),
                            ));
                            self.hierarchy.vector_fill(word);
                            word
                        }
                    };
                    self.hierarchy.vector_add_child(top, idx, vi);
                    var_ident = Some(vi);
                    var_name = top;
                } else {
                    // plain vector of scalars, including integers
                    let vi = match var_ident {
                        Some(v) => v,
                        None => {
                            let vec = self.hierarchy.add_var(Variable::vector(
                                tpe,
                                left,
                                right,
                                base.clone(),
                                ident.clone(),
                            ));
                            self.hierarchy.vector_fill(vec);
                            vec
                        }
                    };
                    var_ident = Some(vi);
                    var_name = vi;
                }
                self.hierarchy.add_variable(self.cur_scope, var_name);
            }
            Some(ev) => {
                // the base name exists, so this must extend an indexed vector
                if idxs.is_empty() || !self.hierarchy.is_vector(ev) {
                    let resolved = self.hierarchy.resolve(ev);
                    if idxs.is_empty() && self.hierarchy[resolved].ident() == ident.as_slice() {
                        // exact re-declaration of the same signal
                        return Ok(());
                    }
                    return Err(VcdParseError::DuplicateVariable(name.to_string()));
                }
                let mut vec = self.hierarchy.resolve(ev);
                for k in 0..idxs.len() - 1 {
                    let idx = idxs[k];
                    match self.hierarchy.vector_child(vec, idx) {
                        Some(child) if self.hierarchy.is_vector(child) => {
                            vec = self.hierarchy.resolve(child);
                        }
                        Some(_) => return Err(VcdParseError::UnsupportedVar(name.to_string())),
                        None => {
                            // missing intermediate dimensions are created on demand
                            let v = self.hierarchy.add_var(Variable::vector(
                                tpe,
                                idxs[k + 1],
                                idxs[k + 1],
                                String::new(),
                                Vec::new(),
                            ));
                            self.hierarchy.vector_add_child(vec, idx, v);
                            vec = v;
                        }
                    }
                }
                let last = idxs[idxs.len() - 1];
                if self.hierarchy.vector_child(vec, last).is_some() {
                    return Err(VcdParseError::DuplicateVariable(name.to_string()));
                }
                let vi = match var_ident {
                    Some(v) => v,
                    None if size == 1 => self
                        .hierarchy
                        .add_var(Variable::bit_scalar(tpe, base.clone(), ident.clone())),
                    None => {
                        if idxs.len() != 1 {
                            return Err(VcdParseError::UnsupportedVar(name.to_string()));
                        }
                        let word = self.hierarchy.add_var(Variable::vector(
                            tpe,
                            left,
                            right,
                            base.clone(),
                            ident.clone(),
                        ));
                        self.hierarchy.vector_fill(word);
                        word
                    }
                };
                self.hierarchy.vector_add_child(vec, last, vi);
                var_ident = Some(vi);
            }
        }

        if new_ident {
            if let Some(vi) = var_ident {
                debug_assert!(
                    tpe == VarType::Real || size == 0 || self.hierarchy.size(vi) == size as usize,
                    "declared size must match the constructed variable"
                );
                self.idents.insert(ident, vi);
                self.hierarchy.set_var_scope(vi, self.cur_scope);
            }
        }

        Ok(())
    }

    /// Advances the stream by exactly one timestamp, recording the links of
    /// all variables assigned within it. The initial `#0` block is folded
    /// into the first reported timestamp. Returns false at end of input;
    /// trailing assignments are still recorded in `changes`.
    pub fn next_delta(&mut self, changes: &mut BTreeSet<LinkRef>) -> bool {
        loop {
            let token = match self.tokenizer.next() {
                Some(t) => t.to_vec(),
                None => return false,
            };
            let (new_value, ident): (Value, Vec<u8>) = match token[0] {
                b'#' => {
                    match lossy(&token[1..]).parse::<u64>() {
                        Ok(tstamp) => {
                            if tstamp != 0 {
                                self.cur_timestamp = self.next_timestamp;
                                self.next_timestamp = tstamp;
                                return true;
                            }
                            continue;
                        }
                        Err(_) => {
                            if self.options.warn_unexpected_tokens {
                                self.warn(&format!("invalid timestamp: {}", lossy(&token)));
                            }
                            continue;
                        }
                    }
                }
                b'$' => {
                    // Modelsim and Icarus put $dumpvars right after #0
                    if self.options.warn_unexpected_tokens
                        && token.as_slice() != b"$dumpvars"
                        && self.cur_timestamp == 0
                    {
                        self.warn(&format!("unexpected section token: {}", lossy(&token)));
                    }
                    continue;
                }
                b'b' => {
                    let value = Value::vector(&token[1..]);
                    match self.tokenizer.next() {
                        Some(id) => (value, id.to_vec()),
                        None => return false,
                    }
                }
                b'r' => {
                    let value = Value::real(lossy(&token[1..]).parse().unwrap_or(0.0));
                    match self.tokenizer.next() {
                        Some(id) => (value, id.to_vec()),
                        None => return false,
                    }
                }
                b'0' | b'1' | b'x' | b'z' | b'X' | b'Z' => {
                    if token.len() < 2 {
                        self.warn(&format!("invalid entry: {}", lossy(&token)));
                        continue;
                    }
                    (Value::bit(token[0]), token[1..].to_vec())
                }
                _ => {
                    self.warn(&format!("invalid entry: {}", lossy(&token)));
                    continue;
                }
            };

            // unknown identifiers are dropped, they may belong to skipped scopes
            let Some(&var) = self.idents.get(&ident) else {
                continue;
            };
            self.hierarchy.set_value(var, new_value);
            if let Some(link) = self.hierarchy.change_link(var) {
                changes.insert(link);
            }
        }
    }
}

#[derive(Debug)]
enum NameSuffix {
    None,
    Range(i64, i64),
    Indices(Vec<i64>),
}

/// Splits a declared name into its base and the bracket suffix: either one
/// `[L:R]` range or a sequence of `[i]` indices.
fn split_name(name: &str) -> Result<(String, NameSuffix)> {
    let Some(bracket) = name.find('[') else {
        return Ok((name.to_string(), NameSuffix::None));
    };
    let base = name[..bracket].to_string();
    let unsupported = || VcdParseError::UnsupportedVar(name.to_string());

    let mut groups = Vec::new();
    for part in name[bracket..].split('[').skip(1) {
        let part = part.strip_suffix(']').ok_or_else(unsupported)?;
        groups.push(part);
    }
    if groups.is_empty() {
        return Err(unsupported());
    }

    if let Some((l, r)) = groups[0].split_once(':') {
        let l: i64 = l.parse().map_err(|_| unsupported())?;
        let r: i64 = r.parse().map_err(|_| unsupported())?;
        return Ok((base, NameSuffix::Range(l, r)));
    }

    let mut idxs = Vec::with_capacity(groups.len());
    for g in groups {
        // a trailing range group only contributes its first index
        let lead = g.split(':').next().unwrap_or(g);
        idxs.push(lead.parse().map_err(|_| unsupported())?);
    }
    Ok((base, NameSuffix::Indices(idxs)))
}

fn parse_scope_type(token: &[u8]) -> ScopeType {
    match token.to_ascii_lowercase().as_slice() {
        b"module" => ScopeType::Module,
        b"begin" => ScopeType::Begin,
        b"function" => ScopeType::Function,
        b"task" => ScopeType::Task,
        b"fork" => ScopeType::Fork,
        _ => ScopeType::Unknown,
    }
}

fn parse_var_type(token: &[u8]) -> Option<VarType> {
    let tpe = match token.to_ascii_lowercase().as_slice() {
        b"reg" => VarType::Reg,
        b"wire" => VarType::Wire,
        b"integer" => VarType::Integer,
        b"real" => VarType::Real,
        b"parameter" => VarType::Parameter,
        b"time" => VarType::Time,
        b"supply0" => VarType::Supply0,
        b"supply1" => VarType::Supply1,
        b"tri" => VarType::Tri,
        b"triand" => VarType::TriAnd,
        b"trior" => VarType::TriOr,
        b"trireg" => VarType::TriReg,
        b"tri0" => VarType::Tri0,
        b"tri1" => VarType::Tri1,
        b"wand" => VarType::WAnd,
        b"wor" => VarType::WOr,
        b"event" => VarType::Event,
        _ => return None,
    };
    Some(tpe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn open(input: &str) -> VcdFile<Cursor<Vec<u8>>> {
        open_with(input, Options::default())
    }

    fn open_with(input: &str, options: Options) -> VcdFile<Cursor<Vec<u8>>> {
        VcdFile::new(
            "test.vcd".to_string(),
            Cursor::new(input.as_bytes().to_vec()),
            options,
        )
    }

    fn parse(input: &str) -> VcdFile<Cursor<Vec<u8>>> {
        let mut file = open(input);
        file.parse_header().expect("header should parse");
        file
    }

    const SMALL_HEADER: &str = r#"
$date today $end
$version some simulator $end
$comment nothing to see here $end
$timescale 1ns $end
$scope module TOP $end
$var wire 1 ! clk $end
$var wire 4 " data [3:0] $end
$scope begin blk $end
$var reg 1 # state $end
$upscope $end
$upscope $end
$enddefinitions $end
"#;

    #[test]
    fn test_parse_small_header() {
        let f = parse(SMALL_HEADER);
        assert_eq!(f.timescale(), -9);
        let h = f.hierarchy();
        // scope names fold to lower case by default
        let top = h.get_scope(h.root(), "top").expect("top exists");
        assert_eq!(h[top].scope_type(), ScopeType::Module);
        let blk = h.get_scope(top, "blk").expect("blk exists");
        assert_eq!(h[blk].scope_type(), ScopeType::Begin);

        let clk = h.get_variable(top, "clk").unwrap();
        assert_eq!(h.size(clk), 1);
        assert_eq!(h[clk].var_type(), VarType::Wire);
        let data = h.get_variable(top, "data").unwrap();
        assert_eq!(h.size(data), 4);
        assert_eq!(h.vector_range(data), Some((3, 0)));
        assert!(h.get_variable(blk, "state").is_some());

        assert_eq!(f.var_by_ident(b"!"), Some(clk));
        assert_eq!(f.var_by_ident(b"\""), Some(data));
    }

    #[test]
    fn test_case_sensitive_option() {
        let mut options = Options::default();
        options.case_sensitive = true;
        let mut f = open_with(SMALL_HEADER, options);
        f.parse_header().unwrap();
        let h = f.hierarchy();
        assert!(h.get_scope(h.root(), "TOP").is_some());
        assert!(h.get_scope(h.root(), "top").is_none());
    }

    #[test]
    fn test_timescale_forms() {
        for (text, expected) in [
            ("$timescale 10 ns $end", -8),
            ("$timescale 100ps $end", -10),
            ("$timescale 1 s $end", 0),
            ("$timescale 1 fs $end", -15),
        ] {
            let input = format!("{text}\n$enddefinitions $end");
            let f = parse(&input);
            assert_eq!(f.timescale(), expected, "{text}");
        }
        let mut f = open("$timescale 2 ns $end $enddefinitions $end");
        assert!(matches!(
            f.parse_header(),
            Err(VcdParseError::InvalidTimescaleBase(_))
        ));
        let mut f = open("$timescale 10 lightyears $end $enddefinitions $end");
        assert!(matches!(
            f.parse_header(),
            Err(VcdParseError::InvalidTimescaleUnit(_))
        ));
    }

    #[test]
    fn test_unknown_var_type_is_fatal() {
        let mut f = open("$var superwire 1 ! x $end $enddefinitions $end");
        assert!(matches!(
            f.parse_header(),
            Err(VcdParseError::UnknownVarType(_))
        ));
    }

    #[test]
    fn test_unexpected_section_is_fatal_unless_suppressed() {
        let input = "$fancysection stuff $end $enddefinitions $end";
        let mut f = open(input);
        assert!(matches!(
            f.parse_header(),
            Err(VcdParseError::UnexpectedToken(_))
        ));
        let mut options = Options::default();
        options.warn_unexpected_tokens = false;
        let mut f = open_with(input, options);
        assert!(f.parse_header().is_ok());
    }

    #[test]
    fn test_alias_declaration() {
        let input = r#"
$scope module top $end
$var wire 1 ! a $end
$var wire 1 ! b $end
$upscope $end
$enddefinitions $end
"#;
        let f = parse(input);
        let h = f.hierarchy();
        let top = h.get_scope(h.root(), "top").unwrap();
        let a = h.get_variable(top, "a").unwrap();
        let b = h.get_variable(top, "b").unwrap();
        assert_eq!(h.resolve(b), a, "b forwards to a");
        assert_eq!(h[b].ident(), h[a].ident());
        // only the canonical variable is bound to the identifier
        assert_eq!(f.var_by_ident(b"!"), Some(a));
    }

    #[test]
    fn test_sparse_vector_merging() {
        let input = r#"
$scope module top $end
$var wire 1 ! bus[0] $end
$var wire 1 " bus[2] $end
$upscope $end
$enddefinitions $end
"#;
        let f = parse(input);
        let h = f.hierarchy();
        let top = h.get_scope(h.root(), "top").unwrap();
        let bus = h.get_variable(top, "bus").unwrap();
        assert!(h.is_vector(bus));
        assert_eq!(h.vector_range(bus), Some((0, 2)));
        let bit0 = h.vector_child(bus, 0).unwrap();
        let bit2 = h.vector_child(bus, 2).unwrap();
        assert_eq!(f.var_by_ident(b"!"), Some(bit0));
        assert_eq!(f.var_by_ident(b"\""), Some(bit2));
        assert!(h.vector_child(bus, 1).is_none());
    }

    #[test]
    fn test_multidimensional_word() {
        let input = r#"
$scope module top $end
$var wire 8 ! mem[2] $end
$upscope $end
$enddefinitions $end
"#;
        let f = parse(input);
        let h = f.hierarchy();
        let top = h.get_scope(h.root(), "top").unwrap();
        let mem = h.get_variable(top, "mem").unwrap();
        assert!(h.is_vector(mem));
        assert_eq!(h.vector_range(mem), Some((2, 2)));
        let word = h.vector_child(mem, 2).unwrap();
        assert_eq!(h.size(word), 8);
        assert_eq!(h.vector_range(word), Some((7, 0)));
        assert_eq!(f.var_by_ident(b"!"), Some(word));
        assert_eq!(h.full_var_name(word), "mem[2][7:0]");
    }

    #[test]
    fn test_nested_index_chain() {
        let input = r#"
$scope module top $end
$var reg 1 ! arr[1][3] $end
$var reg 1 " arr[1][4] $end
$upscope $end
$enddefinitions $end
"#;
        let f = parse(input);
        let h = f.hierarchy();
        let top = h.get_scope(h.root(), "top").unwrap();
        let arr = h.get_variable(top, "arr").unwrap();
        let mid = h.vector_child(arr, 1).unwrap();
        assert!(h.is_vector(mid));
        let b3 = h.vector_child(mid, 3).unwrap();
        let b4 = h.vector_child(mid, 4).unwrap();
        assert_eq!(f.var_by_ident(b"!"), Some(b3));
        assert_eq!(f.var_by_ident(b"\""), Some(b4));
    }

    #[test]
    fn test_zero_size_parameter() {
        let input = r#"
$scope module top $end
$var parameter 0 ! width $end
$upscope $end
$enddefinitions $end
"#;
        let f = parse(input);
        let h = f.hierarchy();
        let top = h.get_scope(h.root(), "top").unwrap();
        let width = h.get_variable(top, "width").unwrap();
        assert_eq!(h.size(width), 1);
        assert_eq!(f.var_by_ident(b"!"), Some(width));
    }

    #[test]
    fn test_range_size_mismatch_is_fatal() {
        let mut f = open("$var wire 4 ! x[2:0] $end $enddefinitions $end");
        assert!(matches!(
            f.parse_header(),
            Err(VcdParseError::RangeSizeMismatch(_))
        ));
    }

    #[test]
    fn test_skip_module_scopes() {
        let mut options = Options::default();
        options.skip_module = true;
        let input = r#"
$scope module top $end
$var wire 1 ! a $end
$upscope $end
$scope begin blk $end
$var wire 1 " b $end
$upscope $end
$enddefinitions $end
"#;
        let mut f = open_with(input, options);
        f.parse_header().unwrap();
        assert_eq!(f.var_by_ident(b"!"), None);
        assert!(f.var_by_ident(b"\"").is_some());
        let h = f.hierarchy();
        assert!(h.get_scope(h.root(), "top").is_none());
        assert!(h.get_scope(h.root(), "blk").is_some());
    }

    #[test]
    fn test_next_delta_pumps_one_timestamp_at_a_time() {
        let input = r#"
$scope module top $end
$var wire 1 ! a $end
$var wire 4 " x[3:0] $end
$upscope $end
$enddefinitions $end
#0
$dumpvars
0!
b0000 "
$end
#10
1!
b0101 "
#20
0!
"#;
        let mut f = parse(input);
        let a = f.var_by_ident(b"!").unwrap();
        let x = f.var_by_ident(b"\"").unwrap();
        let mut changes = BTreeSet::new();

        // the #0 block is folded into the first advance
        assert!(f.next_delta(&mut changes));
        assert_eq!(f.next_timestamp(), 10);
        assert_eq!(f.hierarchy().value_str(a), "0");
        assert_eq!(f.hierarchy().value_str(x), "0000");

        assert!(f.next_delta(&mut changes));
        assert_eq!(f.next_timestamp(), 20);
        assert_eq!(f.hierarchy().value_str(a), "1");
        assert_eq!(f.hierarchy().value_str(x), "0101");

        // the trailing block ends the stream but its assignments still land
        assert!(!f.next_delta(&mut changes));
        assert_eq!(f.hierarchy().value_str(a), "0");
        assert!(!f.valid());
    }

    #[test]
    fn test_unknown_ident_assignments_are_dropped() {
        let input = r#"
$scope module top $end
$var wire 1 ! a $end
$upscope $end
$enddefinitions $end
#0
1?
0!
#10
"#;
        let mut f = parse(input);
        let a = f.var_by_ident(b"!").unwrap();
        let mut changes = BTreeSet::new();
        assert!(f.next_delta(&mut changes));
        assert_eq!(f.hierarchy().value_str(a), "0");
    }

    #[test]
    fn test_split_name() {
        assert!(matches!(split_name("x"), Ok((b, NameSuffix::None)) if b == "x"));
        assert!(matches!(split_name("x[3:0]"), Ok((b, NameSuffix::Range(3, 0))) if b == "x"));
        assert!(matches!(split_name("x[0:3]"), Ok((b, NameSuffix::Range(0, 3))) if b == "x"));
        match split_name("mem[2][5]") {
            Ok((b, NameSuffix::Indices(idxs))) => {
                assert_eq!(b, "mem");
                assert_eq!(idxs, vec![2, 5]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(split_name("x[oops]").is_err());
    }
}
