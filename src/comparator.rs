// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::hierarchy::{ScopeRef, VarRef};
use crate::vcdfile::{VcdFile, VcdParseError};
use crate::Options;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::num::NonZeroU32;

/// Uniquely identifies a link in the comparator. Ordered by creation, so
/// change sets iterate links in structural mapping order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LinkRef(NonZeroU32);

impl LinkRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A pair of matched variables, `first` from file 1 and `second` from file 2.
/// Both always have the same size.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub first: VarRef,
    pub second: VarRef,
}

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("{filename}:{line}: {source}")]
    Header {
        filename: String,
        line: u32,
        source: VcdParseError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Drives two VCD files against each other: maps their hierarchies into
/// links, then pumps both value-change streams in merged timestamp order
/// and reports the links whose values disagree.
pub struct Comparator<R: BufRead, W: Write> {
    file1: VcdFile<R>,
    file2: VcdFile<R>,
    links: Vec<Link>,
    options: Options,
    out: W,
}

impl<R: BufRead, W: Write> Comparator<R, W> {
    pub fn new(file1: VcdFile<R>, file2: VcdFile<R>, options: Options, out: W) -> Self {
        Comparator {
            file1,
            file2,
            links: Vec::new(),
            options,
            out,
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn file1(&self) -> &VcdFile<R> {
        &self.file1
    }

    pub fn file2(&self) -> &VcdFile<R> {
        &self.file2
    }

    /// Consumes the comparator and hands back the output writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Parses both headers, maps the hierarchies and walks the merged
    /// value-change streams until both files are exhausted.
    pub fn compare(&mut self) -> Result<(), CompareError> {
        self.parse_headers()?;

        // TODO adapt timescales when they differ
        if self.file1.timescale() != self.file2.timescale() {
            eprintln!("Warning: Compared files use different timescales.");
        }

        let root1 = self.file1.hierarchy().root();
        let root2 = self.file2.hierarchy().root();
        self.map_signals(root1, root2);
        self.check_value_changes()?;
        Ok(())
    }

    fn parse_headers(&mut self) -> Result<(), CompareError> {
        if let Err(source) = self.file1.parse_header() {
            return Err(CompareError::Header {
                filename: self.file1.filename().to_string(),
                line: self.file1.line_number(),
                source,
            });
        }
        if let Err(source) = self.file2.parse_header() {
            return Err(CompareError::Header {
                filename: self.file2.filename().to_string(),
                line: self.file2.line_number(),
                source,
            });
        }
        Ok(())
    }

    /// Walks both scope trees as a lexicographic sorted merge, recursing
    /// into matching child scopes and offering same-named variables to
    /// [`Comparator::compare_and_match`].
    fn map_signals(&mut self, s1: ScopeRef, s2: ScopeRef) {
        let subs1: Vec<(String, ScopeRef)> = self.file1.hierarchy()[s1]
            .scopes()
            .iter()
            .map(|(n, r)| (n.clone(), *r))
            .collect();
        let subs2: Vec<(String, ScopeRef)> = self.file2.hierarchy()[s2]
            .scopes()
            .iter()
            .map(|(n, r)| (n.clone(), *r))
            .collect();

        let (mut i, mut j) = (0, 0);
        while i < subs1.len() && j < subs2.len() {
            match subs1[i].0.cmp(&subs2[j].0) {
                Ordering::Equal => {
                    self.map_signals(subs1[i].1, subs2[j].1);
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    self.warn_missing_scope(subs1[i].1, true);
                    i += 1;
                }
                Ordering::Greater => {
                    self.warn_missing_scope(subs2[j].1, false);
                    j += 1;
                }
            }
        }
        while i < subs1.len() {
            self.warn_missing_scope(subs1[i].1, true);
            i += 1;
        }
        while j < subs2.len() {
            self.warn_missing_scope(subs2[j].1, false);
            j += 1;
        }

        let vars1: Vec<(String, VarRef)> = self.file1.hierarchy()[s1]
            .variables()
            .iter()
            .map(|(n, r)| (n.clone(), *r))
            .collect();
        let vars2: Vec<(String, VarRef)> = self.file2.hierarchy()[s2]
            .variables()
            .iter()
            .map(|(n, r)| (n.clone(), *r))
            .collect();

        let (mut i, mut j) = (0, 0);
        while i < vars1.len() && j < vars2.len() {
            match vars1[i].0.cmp(&vars2[j].0) {
                Ordering::Equal => {
                    self.compare_and_match(vars1[i].1, vars2[j].1);
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    self.warn_missing_var(vars1[i].1, true);
                    i += 1;
                }
                Ordering::Greater => {
                    self.warn_missing_var(vars2[j].1, false);
                    j += 1;
                }
            }
        }
        while i < vars1.len() {
            self.warn_missing_var(vars1[i].1, true);
            i += 1;
        }
        while j < vars2.len() {
            self.warn_missing_var(vars2[j].1, false);
            j += 1;
        }
    }

    fn warn_missing_scope(&self, scope: ScopeRef, in_file1: bool) {
        if !self.options.warn_missing_scopes {
            return;
        }
        let (h, missing_from) = if in_file1 {
            (self.file1.hierarchy(), self.file2.filename())
        } else {
            (self.file2.hierarchy(), self.file1.filename())
        };
        eprintln!(
            "Warning: There is no scope '{}' in {}, skipping.",
            h.full_scope_name(scope),
            missing_from
        );
    }

    fn warn_missing_var(&self, var: VarRef, in_file1: bool) {
        if !self.options.warn_missing_vars {
            return;
        }
        let (h, missing_from) = if in_file1 {
            (self.file1.hierarchy(), self.file2.filename())
        } else {
            (self.file2.hierarchy(), self.file1.filename())
        };
        eprintln!(
            "Warning: There is no variable '{}' in {}.",
            h.display_name(var),
            missing_from
        );
    }

    /// Checks whether two same-named variables are structurally equivalent
    /// and creates a link if at least one of them receives value changes.
    /// Vectors with opposite range directions are reconciled by reversing
    /// one side in place, preferring the descending order.
    fn compare_and_match(&mut self, v1: VarRef, v2: VarRef) -> bool {
        if self.file1.hierarchy().size(v1) != self.file2.hierarchy().size(v2) {
            if self.options.warn_size_mismatch {
                eprintln!(
                    "Warning: {} and {} have different sizes, they are not matched",
                    self.name1(v1),
                    self.name2(v2)
                );
            }
            return false;
        }

        if !self.options.ignore_var_type
            && self.file1.hierarchy()[v1].var_type() != self.file2.hierarchy()[v2].var_type()
        {
            if self.options.warn_type_mismatch {
                eprintln!(
                    "Warning: {} and {} have different types, they are not matched",
                    self.name1(v1),
                    self.name2(v2)
                );
            }
            return false;
        }

        if !self.options.ignore_var_index {
            let both_vectors =
                self.file1.hierarchy().is_vector(v1) && self.file2.hierarchy().is_vector(v2);
            if !both_vectors {
                if self.file1.hierarchy()[v1].index() != self.file2.hierarchy()[v2].index() {
                    eprintln!(
                        "Warning: {} and {} have different indexes, they are not matched",
                        self.name1(v1),
                        self.name2(v2)
                    );
                    return false;
                }
            } else {
                let Some((l1, r1)) = self.file1.hierarchy().vector_range(v1) else {
                    return false;
                };
                let Some((l2, r2)) = self.file2.hierarchy().vector_range(v2) else {
                    return false;
                };
                if l1.min(r1) != l2.min(r2) || l1.max(r1) != l2.max(r2) {
                    eprintln!(
                        "Warning: {} and {} have different ranges, they are not matched",
                        self.name1(v1),
                        self.name2(v2)
                    );
                    return false;
                }

                // line up inverted ranges, preferring the descending order
                if l1 != l2 || r1 != r2 {
                    if self.file1.hierarchy().range_desc(v1) {
                        self.file2.hierarchy_mut().reverse_range(v2);
                    } else {
                        self.file1.hierarchy_mut().reverse_range(v1);
                    }
                }

                // pair the elements by index
                for i in l1.min(r1)..=l1.max(r1) {
                    let c1 = self.file1.hierarchy().vector_child(v1, i);
                    let c2 = self.file2.hierarchy().vector_child(v2, i);
                    if let (Some(c1), Some(c2)) = (c1, c2) {
                        self.compare_and_match(c1, c2);
                    }
                }
            }
        }

        // a link only pays off if at least one side receives value changes
        if !self.file1.hierarchy()[v1].ident().is_empty()
            || !self.file2.hierarchy()[v2].ident().is_empty()
        {
            let link = LinkRef::from_index(self.links.len()).unwrap();
            self.links.push(Link {
                first: v1,
                second: v2,
            });
            self.file1.hierarchy_mut().set_link(v1, link);
            self.file2.hierarchy_mut().set_link(v2, link);
        }

        true
    }

    fn name1(&self, var: VarRef) -> String {
        self.file1.hierarchy().display_name(var)
    }

    fn name2(&self, var: VarRef) -> String {
        self.file2.hierarchy().display_name(var)
    }

    /// The merged stream walk: always advance the file with the smaller
    /// lookahead timestamp (both when they agree) and report the union of
    /// the affected links at that time.
    fn check_value_changes(&mut self) -> std::io::Result<()> {
        let mut file1_ok = self.file1.valid();
        let mut file2_ok = self.file2.valid();

        while file1_ok || file2_ok {
            // a finished file no longer constrains the merge
            let next1 = if file1_ok {
                self.file1.next_timestamp()
            } else {
                u64::MAX
            };
            let next2 = if file2_ok {
                self.file2.next_timestamp()
            } else {
                u64::MAX
            };

            let mut changes = BTreeSet::new();
            let current_time;

            match next1.cmp(&next2) {
                Ordering::Equal => {
                    file1_ok = self.file1.next_delta(&mut changes);
                    file2_ok = self.file2.next_delta(&mut changes);
                    current_time = next1;
                }
                Ordering::Greater => {
                    file2_ok = self.file2.next_delta(&mut changes);
                    current_time = next2;
                    if self.options.warn_missing_tstamps {
                        eprintln!(
                            "Warning: There is no timestamp #{} in {}.",
                            current_time,
                            self.file1.filename()
                        );
                    }
                }
                Ordering::Less => {
                    file1_ok = self.file1.next_delta(&mut changes);
                    current_time = next1;
                    if self.options.warn_missing_tstamps {
                        eprintln!(
                            "Warning: There is no timestamp #{} in {}.",
                            current_time,
                            self.file2.filename()
                        );
                    }
                }
            }

            if self.options.test_mode {
                self.emit_hashes(current_time, &changes)?;
            } else {
                self.emit_diffs(current_time, &changes)?;
            }

            if !self.options.compare_states {
                for lr in &changes {
                    let link = self.links[lr.index()];
                    self.file1.hierarchy_mut().clear_transition(link.first);
                    self.file2.hierarchy_mut().clear_transition(link.second);
                }
            }
        }
        Ok(())
    }

    /// Test mode: one `<time>:<hash>` line per advanced timestamp. Equal
    /// endpoints cancel out, so a file against itself always prints 0.
    fn emit_hashes(&mut self, time: u64, changes: &BTreeSet<LinkRef>) -> std::io::Result<()> {
        let mut hash = 0u64;
        for lr in changes {
            let link = self.links[lr.index()];
            let link_hash =
                self.file1.hierarchy().hash(link.first) ^ self.file2.hierarchy().hash(link.second);
            hash = hash.wrapping_add(link_hash);
            self.file1.hierarchy_mut().clear_transition(link.first);
            self.file2.hierarchy_mut().clear_transition(link.second);
        }
        writeln!(self.out, "{time}:{hash}")
    }

    fn emit_diffs(&mut self, time: u64, changes: &BTreeSet<LinkRef>) -> std::io::Result<()> {
        let mut emitted_header = false;
        for lr in changes {
            let link = self.links[lr.index()];
            if self.link_equal(link) {
                continue;
            }
            if !emitted_header {
                writeln!(self.out, "diff #{time}")?;
                writeln!(self.out, "==================")?;
                emitted_header = true;
            }
            let line1 = self.render_side(link.first, true);
            let line2 = self.render_side(link.second, false);
            writeln!(self.out, "{line1}")?;
            writeln!(self.out, "{line2}")?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Equality over current values; state comparison additionally requires
    /// the previous values to agree.
    fn link_equal(&self, link: Link) -> bool {
        let h1 = self.file1.hierarchy();
        let h2 = self.file2.hierarchy();
        if h1.value_str(link.first) != h2.value_str(link.second) {
            return false;
        }
        if self.options.compare_states {
            h1.prev_value_str(link.first) == h2.prev_value_str(link.second)
        } else {
            true
        }
    }

    fn render_side(&self, var: VarRef, first: bool) -> String {
        let h = if first {
            self.file1.hierarchy()
        } else {
            self.file2.hierarchy()
        };
        let value = if !self.options.compare_states && h.changed(var) {
            format!("{} -> {}", h.prev_value_str(var), h.value_str(var))
        } else {
            h.value_str(var)
        };
        format!("{}\t= {}", h.display_name(var), value)
    }
}
