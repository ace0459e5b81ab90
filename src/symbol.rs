//! The symbol table: a stack of lexical scopes.
//!
//! Entries are a tagged union rather than one struct with optional fields —
//! a `SimpleVar` entry simply has no `bounds` field to be `None` at the type
//! level, matching the shape of the data the parser actually produces.
//!
//! Tracking which procedure/program frame is currently open is a separate
//! concern from name lookup (see `parser::Frame`) — a frame stays identified
//! by the activation it belongs to even if a local happens to shadow its
//! own name, which a name-keyed stack here could not guarantee.

use std::collections::HashMap;

use crate::types::Type;

/// The 20 reserved linkage slots at the base of every activation frame.
pub const FRAME_PROLOGUE: i64 = 20;

/// The label of the first user-declared procedure/program entry point.
/// `L.0`, `L.1`, `L.2` are reserved for the BSS region, the stack region,
/// and the program entry jump respectively.
pub const FIRST_USER_LABEL: u32 = 3;

/// One declared name. Which fields are populated is determined entirely by
/// the variant, enforced by this being an enum rather than a struct of
/// Options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolEntry {
    Program {
        label: String,
        level: u32,
    },
    Procedure {
        label: String,
        level: u32,
    },
    SimpleVar {
        var_type: Type,
        level: u32,
        offset: i64,
    },
    ArrayVar {
        base_type: Type,
        left: i64,
        right: i64,
        level: u32,
        offset: i64,
    },
}

impl SymbolEntry {
    /// The type this entry contributes to an expression — `Type::Array` for
    /// an unindexed array variable, its base type once indexed (callers
    /// apply that narrowing themselves, this just reports the declared type).
    pub fn ty(&self) -> Type {
        match self {
            SymbolEntry::Program { .. } => Type::Program,
            SymbolEntry::Procedure { .. } => Type::Procedure,
            SymbolEntry::SimpleVar { var_type, .. } => *var_type,
            SymbolEntry::ArrayVar { .. } => Type::Array,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            SymbolEntry::Program { level, .. }
            | SymbolEntry::Procedure { level, .. }
            | SymbolEntry::SimpleVar { level, .. }
            | SymbolEntry::ArrayVar { level, .. } => *level,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        match self {
            SymbolEntry::SimpleVar { offset, .. } | SymbolEntry::ArrayVar { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Number of frame slots this variable occupies (1 for simple vars,
    /// `right - left + 1` for arrays). Panics on non-variable entries.
    pub fn slot_count(&self) -> i64 {
        match self {
            SymbolEntry::SimpleVar { .. } => 1,
            SymbolEntry::ArrayVar { left, right, .. } => right - left + 1,
            _ => unreachable!("slot_count is only meaningful for variables"),
        }
    }
}

/// A single lexical scope: names visible only within one block, unique
/// among themselves but free to shadow an enclosing scope's names.
#[derive(Debug, Default)]
pub struct Scope {
    entries: HashMap<String, SymbolEntry>,
}

impl Scope {
    fn new() -> Self {
        Scope {
            entries: HashMap::new(),
        }
    }
}

/// Innermost-first stack of scopes. `lookup` walks top to bottom and stops
/// at the first hit; `declare` only ever touches the top scope.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack { scopes: Vec::new() }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn close_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Insert `entry` under `name` in the innermost scope. `Err(())` if the
    /// name is already declared in that same scope — the caller is
    /// responsible for turning this into a `Diagnostic::MultiplyDefined`.
    pub fn declare(&mut self, name: &str, entry: SymbolEntry) -> Result<(), ()> {
        let scope = self.scopes.last_mut().expect("declare with no open scope");
        if scope.entries.contains_key(name) {
            return Err(());
        }
        scope.entries.insert(name.to_string(), entry);
        Ok(())
    }

    /// Search from innermost to outermost scope for `name`.
    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.entries.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let mut stack = ScopeStack::new();
        stack.open_scope();
        stack
            .declare(
                "x",
                SymbolEntry::SimpleVar {
                    var_type: Type::Integer,
                    level: 0,
                    offset: 20,
                },
            )
            .unwrap();
        stack.open_scope();
        stack
            .declare(
                "x",
                SymbolEntry::SimpleVar {
                    var_type: Type::Char,
                    level: 1,
                    offset: 20,
                },
            )
            .unwrap();
        assert_eq!(stack.lookup("x").unwrap().ty(), Type::Char);
        stack.close_scope();
        assert_eq!(stack.lookup("x").unwrap().ty(), Type::Integer);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut stack = ScopeStack::new();
        stack.open_scope();
        let entry = SymbolEntry::SimpleVar {
            var_type: Type::Integer,
            level: 0,
            offset: 20,
        };
        stack.declare("x", entry.clone()).unwrap();
        assert_eq!(stack.declare("x", entry), Err(()));
    }

    #[test]
    fn lookup_does_not_cross_closed_scope() {
        let mut stack = ScopeStack::new();
        stack.open_scope();
        stack.open_scope();
        stack
            .declare(
                "inner",
                SymbolEntry::SimpleVar {
                    var_type: Type::Integer,
                    level: 1,
                    offset: 20,
                },
            )
            .unwrap();
        stack.close_scope();
        assert!(stack.lookup("inner").is_none());
    }

    #[test]
    fn array_slot_count_matches_bounds() {
        let entry = SymbolEntry::ArrayVar {
            base_type: Type::Integer,
            left: 1,
            right: 5,
            level: 0,
            offset: 20,
        };
        assert_eq!(entry.slot_count(), 5);
    }
}
