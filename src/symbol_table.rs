//! Scoped symbol tables.
//!
//! One [`Scope`] per lexical region, chained in a [`ScopeStack`]. Redeclaration is
//! checked against the innermost scope only; uses are resolved innermost-first
//! across the whole stack, so inner declarations shadow outer ones.

use crate::diagnostics::SemanticError;
use crate::types::Type;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Bytes per stack slot.
pub const SLOT_SIZE: i32 = 4;

/// Name under which a method body scope records that a `return` with a value was seen.
/// Not a legal identifier, so it can never clash with a declaration.
pub(crate) const RETURN_MARKER: &str = "@return";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Storage {
    /// Field, addressed by its name.
    Global,
    /// Formal parameter, at a positive offset from the frame pointer.
    Formal(i32),
    /// Local variable, below the saved registers.
    Local(i32),
}

impl Storage {
    /// Address of the slot relative to `$fp`, for formals and locals.
    ///
    /// `0($fp)` holds the return address and `-4($fp)` the caller's frame pointer.
    pub fn frame_offset(self) -> Option<i32> {
        match self {
            Storage::Global => None,
            Storage::Formal(offset) => Some(offset),
            Storage::Local(offset) => Some(-(offset + SLOT_SIZE)),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodInfo {
    pub formal_types: Vec<Type>,
    pub param_count: usize,
    pub local_count: usize,
}

impl MethodInfo {
    pub fn new(formal_types: Vec<Type>, local_count: usize) -> Self {
        MethodInfo {
            param_count: formal_types.len(),
            formal_types,
            local_count,
        }
    }

    /// Bytes the prologue reserves below the saved registers.
    pub fn frame_size(&self) -> i32 {
        self.local_count as i32 * SLOT_SIZE
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Symbol {
    pub name: String,
    pub type_: Type,
    pub storage: Storage,
    pub method: Option<MethodInfo>,
}

/// What a declaration is, which decides the storage class of its symbol.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeclKind {
    Class,
    Field,
    Method,
    Formal,
    Local,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScopeKind {
    Program,
    Class,
    Formals,
    MethodBody,
    Block,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    table: HashMap<String, Rc<Symbol>>,
    next_offset: i32,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope::seeded(kind, 0)
    }

    /// A scope whose slots continue after `offset` bytes already in use.
    pub fn seeded(kind: ScopeKind, offset: i32) -> Self {
        Scope {
            kind,
            table: HashMap::new(),
            next_offset: offset,
        }
    }

    /// Claims the next slot. The first slot of an unseeded scope is at offset 4.
    pub fn next_slot(&mut self) -> i32 {
        self.next_offset += SLOT_SIZE;
        self.next_offset
    }

    /// Bytes of slots handed out so far, seed included.
    pub fn slots_used(&self) -> i32 {
        self.next_offset
    }

    pub fn lookup(&self, name: &str) -> Option<&Rc<Symbol>> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn declare(
        &mut self,
        name: &str,
        type_: Type,
        kind: DeclKind,
        method: Option<MethodInfo>,
    ) -> Result<Rc<Symbol>, SemanticError> {
        if self.table.contains_key(name) {
            return Err(SemanticError::DuplicateDeclaration(name.to_string()));
        }

        let storage = match kind {
            DeclKind::Class | DeclKind::Field | DeclKind::Method => Storage::Global,
            DeclKind::Formal => Storage::Formal(self.next_slot()),
            DeclKind::Local => Storage::Local(self.next_slot()),
        };

        let symbol = Rc::new(Symbol {
            name: name.to_string(),
            type_,
            storage,
            method,
        });
        self.table.insert(name.to_string(), Rc::clone(&symbol));
        Ok(symbol)
    }

    /// Records the return marker; repeated marks are no-ops.
    pub(crate) fn mark_return(&mut self) {
        self.table
            .entry(RETURN_MARKER.to_string())
            .or_insert_with(|| {
                Rc::new(Symbol {
                    name: RETURN_MARKER.to_string(),
                    type_: Type::ReturnInt,
                    storage: Storage::Global,
                    method: None,
                })
            });
    }

    pub(crate) fn has_return(&self) -> bool {
        self.table.contains_key(RETURN_MARKER)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut names = self.table.values().collect::<Vec<_>>();
        names.sort_by(|a, b| a.name.cmp(&b.name));
        write!(f, "{:?} {{", self.kind)?;
        for (i, symbol) in names.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{}: {}", symbol.name, symbol.type_)?;
            if let Some(offset) = symbol.storage.frame_offset() {
                write!(f, " @{offset}")?;
            }
        }
        write!(f, " }}")
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Runs `f` inside a fresh scope of `kind`, popping it afterwards. Returns the
    /// popped scope so the caller can inspect what was declared in it.
    pub fn with_scope<R>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut ScopeStack) -> R,
    ) -> (R, Scope) {
        let seed = match kind {
            // Nested blocks get their own slots after the enclosing scope's.
            ScopeKind::Block => self.scopes.last().map_or(0, Scope::slots_used),
            _ => 0,
        };
        self.scopes.push(Scope::seeded(kind, seed));
        log::debug!("Entering {kind:?} scope (depth {})", self.scopes.len());
        let result = f(self);
        let scope = self.pop();
        log::debug!("Leaving {scope}");
        (result, scope)
    }

    fn pop(&mut self) -> Scope {
        self.scopes
            .pop()
            .expect("scope stack underflow: pop without matching push")
    }

    pub fn innermost(&mut self) -> &mut Scope {
        self.scopes
            .last_mut()
            .expect("no active scope: declaration outside of any scope")
    }

    pub fn declare(
        &mut self,
        name: &str,
        type_: Type,
        kind: DeclKind,
        method: Option<MethodInfo>,
    ) -> Result<Rc<Symbol>, SemanticError> {
        self.innermost().declare(name, type_, kind, method)
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<Symbol>, SemanticError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.lookup(name))
            .cloned()
            .ok_or_else(|| SemanticError::UndeclaredIdentifier(name.to_string()))
    }

    /// Marks the enclosing method body as containing a `return` with a value.
    pub(crate) fn mark_return(&mut self) {
        if let Some(scope) = self
            .scopes
            .iter_mut()
            .rev()
            .find(|scope| scope.kind == ScopeKind::MethodBody)
        {
            scope.mark_return();
        }
    }
}
