// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::comparator::LinkRef;
use crate::value::{Value, UNINITIALIZED};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::ops::Index;

/// Uniquely identifies a scope in the hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ScopeRef(NonZeroU32);

impl ScopeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Uniquely identifies a variable in the hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct VarRef(NonZeroU32);

impl VarRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Scope kinds that appear in VCD files.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScopeType {
    Begin,
    Fork,
    Function,
    Module,
    Task,
    Unknown,
}

/// Verilog wire kinds that appear in `$var` declarations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum VarType {
    Event,
    Integer,
    Parameter,
    Real,
    Reg,
    Supply0,
    Supply1,
    Time,
    Tri,
    Tri0,
    Tri1,
    TriAnd,
    TriOr,
    TriReg,
    WAnd,
    Wire,
    WOr,
    Unknown,
}

impl VarType {
    /// Types whose scalars carry real numbers instead of bits.
    pub fn is_real_valued(&self) -> bool {
        matches!(self, VarType::Real | VarType::Parameter)
    }
}

/// A named node of the scope tree. Children and local variables are kept in
/// lexicographic order so that structural mapping can run as a sorted merge.
#[derive(Debug)]
pub struct Scope {
    name: String,
    tpe: ScopeType,
    parent: Option<ScopeRef>,
    scopes: BTreeMap<String, ScopeRef>,
    vars: BTreeMap<String, VarRef>,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope_type(&self) -> ScopeType {
        self.tpe
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }

    /// Child scopes by name, in lexicographic order.
    pub fn scopes(&self) -> &BTreeMap<String, ScopeRef> {
        &self.scopes
    }

    /// Local variables by name, in lexicographic order.
    pub fn variables(&self) -> &BTreeMap<String, VarRef> {
        &self.vars
    }
}

/// Storage of a variable: a single bit with change tracking, an indexed
/// collection of child variables, or a forwarder to another variable.
#[derive(Debug)]
pub enum VarKind {
    Scalar {
        value: Value,
        prev: Value,
        changed: bool,
    },
    Vector {
        /// Declared range bounds; `left` may be smaller (ascending) or larger
        /// (descending) than `right`.
        left: i64,
        right: i64,
        /// Set when the declared direction was flipped to line up with the
        /// peer variable of the other file.
        reversed: bool,
        children: BTreeMap<i64, VarRef>,
    },
    Alias {
        target: VarRef,
    },
}

/// A declared signal. Value state lives in [`VarKind`]; everything else
/// (name, identifier, position in the tree) is shared by all variants.
#[derive(Debug)]
pub struct Variable {
    name: String,
    /// Short identifier binding value changes, empty for purely structural nodes.
    ident: Vec<u8>,
    tpe: VarType,
    scope: Option<ScopeRef>,
    parent: Option<VarRef>,
    index: Option<i64>,
    link: Option<LinkRef>,
    kind: VarKind,
}

impl Variable {
    /// A one bit variable. Supplies initialize to their driven value,
    /// everything else starts uninitialized.
    pub fn bit_scalar(tpe: VarType, name: String, ident: Vec<u8>) -> Self {
        let init = match tpe {
            VarType::Supply0 => Value::Bit(b'0'),
            VarType::Supply1 => Value::Bit(b'1'),
            _ => Value::Bit(UNINITIALIZED),
        };
        Variable {
            name,
            ident,
            tpe,
            scope: None,
            parent: None,
            index: None,
            link: None,
            kind: VarKind::Scalar {
                value: init,
                prev: Value::Bit(UNINITIALIZED),
                changed: false,
            },
        }
    }

    /// A real-valued scalar (reals and scalar parameters).
    pub fn real_scalar(tpe: VarType, name: String, ident: Vec<u8>) -> Self {
        Variable {
            name,
            ident,
            tpe,
            scope: None,
            parent: None,
            index: None,
            link: None,
            kind: VarKind::Scalar {
                value: Value::Undefined,
                prev: Value::Undefined,
                changed: false,
            },
        }
    }

    /// An empty vector over `[left:right]`.
    pub fn vector(tpe: VarType, left: i64, right: i64, name: String, ident: Vec<u8>) -> Self {
        Variable {
            name,
            ident,
            tpe,
            scope: None,
            parent: None,
            index: None,
            link: None,
            kind: VarKind::Vector {
                left,
                right,
                reversed: false,
                children: BTreeMap::new(),
            },
        }
    }

    /// A forwarder carrying no state of its own. Type and identifier are
    /// inherited from the target.
    pub fn alias(name: String, target: VarRef, target_var: &Variable) -> Self {
        Variable {
            name,
            ident: target_var.ident.clone(),
            tpe: target_var.tpe,
            scope: None,
            parent: None,
            index: None,
            link: None,
            kind: VarKind::Alias { target },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ident(&self) -> &[u8] {
        &self.ident
    }

    pub fn var_type(&self) -> VarType {
        self.tpe
    }

    pub fn scope(&self) -> Option<ScopeRef> {
        self.scope
    }

    pub fn index(&self) -> Option<i64> {
        self.index
    }

    pub fn kind(&self) -> &VarKind {
        &self.kind
    }
}

/// Arena of all scopes and variables of one VCD file. Every tree edge is an
/// integer handle, so links into a foreign hierarchy never dangle.
#[derive(Debug)]
pub struct Hierarchy {
    scopes: Vec<Scope>,
    vars: Vec<Variable>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<ScopeRef> for Hierarchy {
    type Output = Scope;

    fn index(&self, r: ScopeRef) -> &Scope {
        &self.scopes[r.index()]
    }
}

impl Index<VarRef> for Hierarchy {
    type Output = Variable;

    fn index(&self, r: VarRef) -> &Variable {
        &self.vars[r.index()]
    }
}

impl Hierarchy {
    /// Creates a hierarchy holding only the unnamed root scope.
    pub fn new() -> Self {
        let root = Scope {
            name: String::new(),
            tpe: ScopeType::Begin,
            parent: None,
            scopes: BTreeMap::new(),
            vars: BTreeMap::new(),
        };
        Hierarchy {
            scopes: vec![root],
            vars: Vec::new(),
        }
    }

    pub fn root(&self) -> ScopeRef {
        ScopeRef::from_index(0).unwrap()
    }

    /// Inserts a new child scope. Sibling names must be unique.
    pub fn make_scope(&mut self, parent: ScopeRef, tpe: ScopeType, name: &str) -> ScopeRef {
        assert!(
            !self[parent].scopes.contains_key(name),
            "scope names must be unique among siblings: {name}"
        );
        let r = ScopeRef::from_index(self.scopes.len()).unwrap();
        self.scopes.push(Scope {
            name: name.to_string(),
            tpe,
            parent: Some(parent),
            scopes: BTreeMap::new(),
            vars: BTreeMap::new(),
        });
        self.scopes[parent.index()]
            .scopes
            .insert(name.to_string(), r);
        r
    }

    pub fn get_scope(&self, parent: ScopeRef, name: &str) -> Option<ScopeRef> {
        self[parent].scopes.get(name).copied()
    }

    /// Puts a variable into the arena without attaching it anywhere.
    pub fn add_var(&mut self, var: Variable) -> VarRef {
        let r = VarRef::from_index(self.vars.len()).unwrap();
        self.vars.push(var);
        r
    }

    /// Assigns the owning scope. Can only be done once per variable.
    pub fn set_var_scope(&mut self, var: VarRef, scope: ScopeRef) {
        let v = &mut self.vars[var.index()];
        assert!(
            v.scope.is_none() || v.scope == Some(scope),
            "the scope of a variable can only be assigned once"
        );
        v.scope = Some(scope);
    }

    /// Registers `var` under its name in `scope` and binds its scope field.
    pub fn add_variable(&mut self, scope: ScopeRef, var: VarRef) {
        let name = self[var].name.clone();
        assert!(!name.is_empty(), "scope level variables must be named");
        assert!(
            !self[scope].vars.contains_key(&name),
            "variable names must be unique within a scope: {name}"
        );
        self.scopes[scope.index()].vars.insert(name, var);
        self.set_var_scope(var, scope);
    }

    pub fn get_variable(&self, scope: ScopeRef, name: &str) -> Option<VarRef> {
        self[scope].vars.get(name).copied()
    }

    /// Follows alias forwarding to the variable that actually carries state.
    pub fn resolve(&self, var: VarRef) -> VarRef {
        match &self[var].kind {
            VarKind::Alias { target } => self.resolve(*target),
            _ => var,
        }
    }

    fn parent_of(&self, var: VarRef) -> Option<VarRef> {
        match &self[var].kind {
            VarKind::Alias { target } => self[*target].parent,
            _ => self[var].parent,
        }
    }

    pub fn is_vector(&self, var: VarRef) -> bool {
        matches!(self[self.resolve(var)].kind, VarKind::Vector { .. })
    }

    /// Number of bits, 1 for scalars.
    pub fn size(&self, var: VarRef) -> usize {
        match &self[var].kind {
            VarKind::Scalar { .. } => 1,
            VarKind::Vector {
                left,
                right,
                children,
                ..
            } => {
                let n = (*left - *right).unsigned_abs() as usize + 1;
                debug_assert_eq!(n, children.len(), "vector range must be fully populated");
                n
            }
            VarKind::Alias { target } => self.size(*target),
        }
    }

    /// Declared `(left, right)` bounds of a vector.
    pub fn vector_range(&self, var: VarRef) -> Option<(i64, i64)> {
        match &self[self.resolve(var)].kind {
            VarKind::Vector { left, right, .. } => Some((*left, *right)),
            _ => None,
        }
    }

    pub fn range_desc(&self, var: VarRef) -> bool {
        matches!(self.vector_range(var), Some((l, r)) if l > r)
    }

    pub fn vector_child(&self, var: VarRef, idx: i64) -> Option<VarRef> {
        match &self[self.resolve(var)].kind {
            VarKind::Vector { children, .. } => children.get(&idx).copied(),
            _ => None,
        }
    }

    /// Adds `child` at index `idx`, growing the declared range to cover the
    /// index while keeping its direction. Sets the child's parent and index.
    pub fn vector_add_child(&mut self, vec: VarRef, idx: i64, child: VarRef) {
        {
            let c = &mut self.vars[child.index()];
            assert!(c.parent.is_none(), "a variable can only join one vector");
            c.parent = Some(vec);
            c.index = Some(idx);
        }
        match &mut self.vars[vec.index()].kind {
            VarKind::Vector {
                left,
                right,
                children,
                ..
            } => {
                assert!(
                    !children.contains_key(&idx),
                    "vector index {idx} is already occupied"
                );
                if *left > *right {
                    if idx > *left {
                        *left = idx;
                    } else if idx < *right {
                        *right = idx;
                    }
                } else {
                    if idx > *right {
                        *right = idx;
                    } else if idx < *left {
                        *left = idx;
                    }
                }
                children.insert(idx, child);
            }
            _ => panic!("children can only be added to vectors"),
        }
    }

    /// Populates the declared range of an empty vector with fresh scalars.
    pub fn vector_fill(&mut self, vec: VarRef) {
        let (tpe, name, min, max) = match &self[vec].kind {
            VarKind::Vector { left, right, .. } => {
                let v = &self[vec];
                (
                    v.tpe,
                    v.name.clone(),
                    (*left).min(*right),
                    (*left).max(*right),
                )
            }
            _ => panic!("only vectors can be filled"),
        };
        for i in min..=max {
            let s = self.add_var(Variable::bit_scalar(tpe, name.clone(), Vec::new()));
            self.vector_add_child(vec, i, s);
        }
    }

    /// Swaps the range bounds. Used to line up two peers that declared
    /// opposite range directions; assignments keep using the declared order.
    pub fn reverse_range(&mut self, var: VarRef) {
        let var = self.resolve(var);
        match &mut self.vars[var.index()].kind {
            VarKind::Vector {
                left,
                right,
                reversed,
                ..
            } => {
                std::mem::swap(left, right);
                *reversed = !*reversed;
            }
            _ => panic!("only vectors have a range to reverse"),
        }
    }

    /// Stores a new value. Scalars remember the previous value and raise
    /// their change flag; vectors distribute bits over their children.
    pub fn set_value(&mut self, var: VarRef, value: Value) {
        let var = self.resolve(var);
        if matches!(self.vars[var.index()].kind, VarKind::Vector { .. }) {
            self.set_vector_value(var, &value);
            return;
        }
        match &mut self.vars[var.index()].kind {
            VarKind::Scalar {
                value: cur,
                prev,
                changed,
            } => {
                *prev = cur.clone();
                *cur = value;
                *changed = *prev != *cur;
            }
            _ => unreachable!("aliases are resolved above"),
        }
    }

    fn set_vector_value(&mut self, vec: VarRef, value: &Value) {
        let bits: Vec<u8> = match value {
            Value::Vector(b) => b.clone(),
            Value::Bit(b) => vec![*b],
            _ => return,
        };
        if bits.is_empty() {
            return;
        }
        let (orig_left, orig_right, children) = match &self[vec].kind {
            VarKind::Vector {
                left,
                right,
                reversed,
                children,
            } => {
                // assignment follows the declared order, not a reversed one
                let (l, r) = if *reversed {
                    (*right, *left)
                } else {
                    (*left, *right)
                };
                (l, r, children.clone())
            }
            _ => unreachable!(),
        };
        let size = (orig_left - orig_right).unsigned_abs() + 1;
        let asc = orig_left < orig_right;
        // bits not covered by the incoming value default to the leading bit,
        // except that a leading '1' extends with '0'
        let default_val = if bits[0] == b'1' { b'0' } else { bits[0] };
        let mut new_idx = bits.len() as i64 - 1;
        let mut idx = orig_right;
        for _ in 0..size {
            let bit = if new_idx >= 0 {
                bits[new_idx as usize]
            } else {
                default_val
            };
            if let Some(child) = children.get(&idx) {
                self.set_value(*child, Value::bit(bit));
            }
            new_idx -= 1;
            idx += if asc { -1 } else { 1 };
        }
    }

    /// True if the variable changed in the current time step.
    pub fn changed(&self, var: VarRef) -> bool {
        match &self[var].kind {
            VarKind::Scalar { changed, .. } => *changed,
            VarKind::Vector { children, .. } => children.values().any(|c| self.changed(*c)),
            VarKind::Alias { target } => self.changed(*target),
        }
    }

    /// Rolls the current value into the previous one and clears change flags.
    pub fn clear_transition(&mut self, var: VarRef) {
        let var = self.resolve(var);
        let children: Option<Vec<VarRef>> = match &mut self.vars[var.index()].kind {
            VarKind::Scalar {
                value,
                prev,
                changed,
            } => {
                *prev = value.clone();
                *changed = false;
                None
            }
            VarKind::Vector { children, .. } => Some(children.values().copied().collect()),
            VarKind::Alias { .. } => unreachable!("aliases are resolved above"),
        };
        if let Some(children) = children {
            for c in children {
                self.clear_transition(c);
            }
        }
    }

    /// Fingerprint of the current value, consistent with [`Hierarchy::value_str`]
    /// equality between linked peers.
    pub fn hash(&self, var: VarRef) -> u64 {
        match &self[var].kind {
            VarKind::Scalar { value, .. } => value.hash(),
            VarKind::Vector { children, .. } => children
                .values()
                .fold(0u64, |h, c| (h ^ self.hash(*c)).wrapping_shl(1)),
            VarKind::Alias { target } => self.hash(*target),
        }
    }

    pub fn prev_hash(&self, var: VarRef) -> u64 {
        match &self[var].kind {
            VarKind::Scalar { prev, .. } => prev.hash(),
            VarKind::Vector { children, .. } => children
                .values()
                .fold(0u64, |h, c| (h ^ self.prev_hash(*c)).wrapping_shl(1)),
            VarKind::Alias { target } => self.prev_hash(*target),
        }
    }

    /// Current value rendered as text. Vectors render in their current
    /// left-to-right range order, so reconciled peers line up bit by bit.
    pub fn value_str(&self, var: VarRef) -> String {
        self.render(var, false)
    }

    pub fn prev_value_str(&self, var: VarRef) -> String {
        self.render(var, true)
    }

    fn render(&self, var: VarRef, prev: bool) -> String {
        match &self[var].kind {
            VarKind::Scalar {
                value, prev: p, ..
            } => {
                if prev {
                    p.to_string()
                } else {
                    value.to_string()
                }
            }
            VarKind::Vector {
                left,
                right,
                children,
                ..
            } => {
                let step: i64 = if *left <= *right { 1 } else { -1 };
                let mut out = String::with_capacity(children.len());
                let mut idx = *left;
                loop {
                    match children.get(&idx) {
                        Some(c) => out.push_str(&self.render(*c, prev)),
                        None => out.push(UNINITIALIZED as char),
                    }
                    if idx == *right {
                        break;
                    }
                    idx += step;
                }
                out
            }
            VarKind::Alias { target } => self.render(*target, prev),
        }
    }

    pub fn link(&self, var: VarRef) -> Option<LinkRef> {
        match &self[var].kind {
            VarKind::Alias { target } => self.link(*target),
            _ => self[var].link,
        }
    }

    /// Binds the peer link. Can only be done once per variable.
    pub fn set_link(&mut self, var: VarRef, link: LinkRef) {
        let v = &mut self.vars[var.index()];
        assert!(v.link.is_none(), "a variable can only be linked once");
        v.link = Some(link);
    }

    /// The link affected by an assignment to `var`: the nearest linked
    /// ancestor composite wins over the variable's own link.
    pub fn change_link(&self, var: VarRef) -> Option<LinkRef> {
        let mut p = self.parent_of(var);
        while let Some(pr) = p {
            if let Some(l) = self.link(pr) {
                return Some(l);
            }
            p = self[pr].parent;
        }
        self.link(var)
    }

    /// Dotted scope path; the unnamed root contributes nothing.
    pub fn full_scope_name(&self, scope: ScopeRef) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if !self[s].name.is_empty() {
                parts.push(self[s].name.as_str());
            }
            cur = self[s].parent;
        }
        parts.reverse();
        parts.join(".")
    }

    fn index_str(&self, var: VarRef) -> String {
        match &self[var].kind {
            VarKind::Scalar { .. } => match self[var].index {
                Some(i) => format!("[{i}]"),
                None => String::new(),
            },
            VarKind::Vector { left, right, .. } => {
                let mut out = String::new();
                if let Some(i) = self[var].index {
                    out.push_str(&format!("[{i}]"));
                }
                if left == right {
                    out.push_str(&format!("[{left}]"));
                } else {
                    out.push_str(&format!("[{left}:{right}]"));
                }
                out
            }
            VarKind::Alias { target } => self.index_str(*target),
        }
    }

    /// Name with ancestor composite indices followed by this variable's own
    /// indices or range, e.g. `mem[2][7:0]`.
    pub fn full_var_name(&self, var: VarRef) -> String {
        let mut ancestors = Vec::new();
        let mut p = self.parent_of(var);
        while let Some(pr) = p {
            if let Some(i) = self[pr].index {
                ancestors.push(i);
            }
            p = self[pr].parent;
        }
        let mut out = self[var].name.clone();
        for i in ancestors.iter().rev() {
            out.push_str(&format!("[{i}]"));
        }
        out.push_str(&self.index_str(var));
        out
    }

    /// Full hierarchical name used in diagnostics and diff output.
    pub fn display_name(&self, var: VarRef) -> String {
        let mut scope = self[var].scope;
        if scope.is_none() {
            // scalars inside composites inherit the composite's scope
            let mut p = self.parent_of(var);
            while let Some(pr) = p {
                if self[pr].scope.is_some() {
                    scope = self[pr].scope;
                    break;
                }
                p = self[pr].parent;
            }
        }
        match scope.map(|s| self.full_scope_name(s)) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{prefix}.{}", self.full_var_name(var))
            }
            _ => self.full_var_name(var),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_vector(h: &mut Hierarchy, left: i64, right: i64) -> VarRef {
        let v = h.add_var(Variable::vector(
            VarType::Wire,
            left,
            right,
            "v".to_string(),
            b"!".to_vec(),
        ));
        h.vector_fill(v);
        v
    }

    #[test]
    fn test_scalar_change_tracking() {
        let mut h = Hierarchy::new();
        let s = h.add_var(Variable::bit_scalar(
            VarType::Wire,
            "a".to_string(),
            b"!".to_vec(),
        ));
        assert_eq!(h.value_str(s), "?");
        assert!(!h.changed(s));

        h.set_value(s, Value::bit(b'1'));
        assert_eq!(h.value_str(s), "1");
        assert_eq!(h.prev_value_str(s), "?");
        assert!(h.changed(s));

        h.clear_transition(s);
        assert_eq!(h.prev_value_str(s), "1");
        assert!(!h.changed(s));

        // re-assigning the same value is not a change
        h.set_value(s, Value::bit(b'1'));
        assert!(!h.changed(s));
    }

    #[test]
    fn test_supply_initialization() {
        let mut h = Hierarchy::new();
        let s0 = h.add_var(Variable::bit_scalar(
            VarType::Supply0,
            "gnd".to_string(),
            vec![],
        ));
        let s1 = h.add_var(Variable::bit_scalar(
            VarType::Supply1,
            "vdd".to_string(),
            vec![],
        ));
        assert_eq!(h.value_str(s0), "0");
        assert_eq!(h.value_str(s1), "1");
        assert!(!h.changed(s0));
    }

    #[test]
    fn test_vector_fill_and_size() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 3, 0);
        assert_eq!(h.size(v), 4);
        assert!(h.is_vector(v));
        assert_eq!(h.value_str(v), "????");
        for i in 0..4 {
            assert!(h.vector_child(v, i).is_some());
        }
    }

    #[test]
    fn test_vector_assignment_descending_range() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 3, 0);
        h.set_value(v, Value::vector(b"0101"));
        assert_eq!(h.value_str(v), "0101");
        // rightmost incoming bit lands on index 0
        let lsb = h.vector_child(v, 0).unwrap();
        assert_eq!(h.value_str(lsb), "1");
        let msb = h.vector_child(v, 3).unwrap();
        assert_eq!(h.value_str(msb), "0");
        assert!(h.changed(v));
    }

    #[test]
    fn test_vector_assignment_ascending_range() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 0, 3);
        h.set_value(v, Value::vector(b"0101"));
        assert_eq!(h.value_str(v), "0101");
        // in an ascending range the rightmost incoming bit lands on the highest index
        assert_eq!(h.value_str(h.vector_child(v, 3).unwrap()), "1");
        assert_eq!(h.value_str(h.vector_child(v, 0).unwrap()), "0");
    }

    #[test]
    fn test_vector_widening_defaults() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 3, 0);
        // a leading '1' zero-extends
        h.set_value(v, Value::vector(b"10"));
        assert_eq!(h.value_str(v), "0010");
        // any other leading bit is replicated
        h.set_value(v, Value::vector(b"x1"));
        assert_eq!(h.value_str(v), "XXX1");
        h.set_value(v, Value::vector(b"01"));
        assert_eq!(h.value_str(v), "0001");
    }

    #[test]
    fn test_vector_change_flag_folds_over_children() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 1, 0);
        h.set_value(v, Value::vector(b"00"));
        h.clear_transition(v);
        assert!(!h.changed(v));
        h.set_value(v, Value::vector(b"01"));
        assert!(h.changed(v));
        h.clear_transition(v);
        assert!(!h.changed(v));
        assert_eq!(h.prev_value_str(v), "01");
    }

    #[test]
    fn test_reverse_range_keeps_assignment_order() {
        let mut h = Hierarchy::new();
        let v = filled_vector(&mut h, 0, 3);
        h.reverse_range(v);
        assert_eq!(h.vector_range(v), Some((3, 0)));
        assert!(h.range_desc(v));
        // assignment still follows the declared [0:3] orientation
        h.set_value(v, Value::vector(b"0101"));
        assert_eq!(h.value_str(h.vector_child(v, 3).unwrap()), "1");
        // but rendering follows the reversed direction
        assert_eq!(h.value_str(v), "1010");
    }

    #[test]
    fn test_vector_hash_is_ascending_and_direction_independent() {
        let mut h = Hierarchy::new();
        let a = filled_vector(&mut h, 3, 0);
        let b = filled_vector(&mut h, 0, 3);
        // same per-index bit values must hash identically, whatever the direction
        h.set_value(a, Value::vector(b"0101"));
        h.set_value(b, Value::vector(b"1010"));
        for i in 0..4 {
            assert_eq!(
                h.value_str(h.vector_child(a, i).unwrap()),
                h.value_str(h.vector_child(b, i).unwrap())
            );
        }
        assert_eq!(h.hash(a), h.hash(b));
    }

    #[test]
    fn test_alias_forwards_everything() {
        let mut h = Hierarchy::new();
        let target = h.add_var(Variable::bit_scalar(
            VarType::Wire,
            "a".to_string(),
            b"!".to_vec(),
        ));
        let alias_var = Variable::alias("b".to_string(), target, &h[target]);
        assert_eq!(alias_var.ident(), b"!");
        assert_eq!(alias_var.var_type(), VarType::Wire);
        let alias = h.add_var(alias_var);

        h.set_value(alias, Value::bit(b'0'));
        assert_eq!(h.value_str(target), "0");
        assert_eq!(h.value_str(alias), "0");
        assert!(h.changed(alias));
        assert_eq!(h.hash(alias), h.hash(target));
        assert_eq!(h.size(alias), 1);

        h.clear_transition(alias);
        assert!(!h.changed(target));
    }

    #[test]
    fn test_scope_tree_and_names() {
        let mut h = Hierarchy::new();
        let top = h.make_scope(h.root(), ScopeType::Module, "top");
        let sub = h.make_scope(top, ScopeType::Function, "sub");
        assert_eq!(h.full_scope_name(sub), "top.sub");
        assert_eq!(h.get_scope(h.root(), "top"), Some(top));
        assert_eq!(h.get_scope(top, "nope"), None);

        let v = h.add_var(Variable::vector(
            VarType::Reg,
            3,
            0,
            "x".to_string(),
            b"!".to_vec(),
        ));
        h.vector_fill(v);
        h.add_variable(top, v);
        assert_eq!(h.get_variable(top, "x"), Some(v));
        assert_eq!(h.display_name(v), "top.x[3:0]");
        // children inherit the scope of the composite for display purposes
        let bit = h.vector_child(v, 2).unwrap();
        assert_eq!(h.display_name(bit), "top.x[2]");
    }

    #[test]
    fn test_nested_vector_names() {
        let mut h = Hierarchy::new();
        let top = h.add_var(Variable::vector(
            VarType::Wire,
            2,
            2,
            "mem".to_string(),
            vec![],
        ));
        let word = h.add_var(Variable::vector(
            VarType::Wire,
            7,
            0,
            "mem".to_string(),
            b"#".to_vec(),
        ));
        h.vector_fill(word);
        h.vector_add_child(top, 2, word);
        assert_eq!(h.full_var_name(top), "mem[2]");
        assert_eq!(h.full_var_name(word), "mem[2][7:0]");
        let bit = h.vector_child(word, 5).unwrap();
        assert_eq!(h.full_var_name(bit), "mem[2][5]");
    }

    #[test]
    fn test_vector_add_child_grows_the_range() {
        let mut h = Hierarchy::new();
        let v = h.add_var(Variable::vector(
            VarType::Wire,
            2,
            2,
            "x".to_string(),
            vec![],
        ));
        let a = h.add_var(Variable::bit_scalar(VarType::Wire, "x".to_string(), vec![]));
        let b = h.add_var(Variable::bit_scalar(VarType::Wire, "x".to_string(), vec![]));
        let c = h.add_var(Variable::bit_scalar(VarType::Wire, "x".to_string(), vec![]));
        h.vector_add_child(v, 2, a);
        h.vector_add_child(v, 0, b);
        h.vector_add_child(v, 1, c);
        assert_eq!(h.vector_range(v), Some((0, 2)));
        assert_eq!(h.size(v), 3);
    }

    #[test]
    #[should_panic(expected = "unique within a scope")]
    fn test_duplicate_variable_names_are_rejected() {
        let mut h = Hierarchy::new();
        let a = h.add_var(Variable::bit_scalar(VarType::Wire, "a".to_string(), vec![]));
        let b = h.add_var(Variable::bit_scalar(VarType::Wire, "a".to_string(), vec![]));
        let root = h.root();
        h.add_variable(root, a);
        h.add_variable(root, b);
    }

    #[test]
    #[should_panic(expected = "unique among siblings")]
    fn test_duplicate_scope_names_are_rejected() {
        let mut h = Hierarchy::new();
        let root = h.root();
        h.make_scope(root, ScopeType::Module, "top");
        h.make_scope(root, ScopeType::Module, "top");
    }
}
