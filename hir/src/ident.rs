use std::fmt;

use compact_str::CompactString;

/// A name-resolved identifier.
///
/// Construction from the AST uniquifies every binding: two C declarations named `i` in disjoint
/// (or shadowing) scopes get distinct [`Ident`]s sharing the same `name`, distinguished by
/// `disambiguator`. Downstream passes therefore never need to re-derive scoping; every [`Ident`]
/// already denotes exactly one declaration.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: CompactString,
    /// `0` for the first binding of `name` introduced during construction, incremented for each
    /// later shadowing binding. Two `Ident`s are the same binding iff both fields match.
    pub disambiguator: u32,
}

impl Ident {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            disambiguator: 0,
        }
    }

    pub fn shadow(&self) -> Self {
        Self {
            name: self.name.clone(),
            disambiguator: self.disambiguator + 1,
        }
    }

    pub fn as_str(&self) -> &str {
        self.name.as_str()
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disambiguator == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}#{}", self.name, self.disambiguator)
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

/// Resolves uses of a name to the [`Ident`] they bind to, folding K&R-style scoping (including
/// shadowing and anonymous block scopes) into a single unique identifier per binding, as required
/// by spec §4.1.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<rustc_hash::FxHashMap<CompactString, Ident>>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![rustc_hash::FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(rustc_hash::FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the top-level scope");
    }

    /// Introduces a new binding for `name` in the innermost scope, uniquifying it against any
    /// binding of the same name already visible (shadowing).
    pub fn bind(&mut self, name: impl Into<CompactString>) -> Ident {
        let name = name.into();
        let disambiguator = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .map(|existing| existing.disambiguator + 1)
            .unwrap_or(0);
        let ident = Ident {
            name: name.clone(),
            disambiguator,
        };
        self.scopes
            .last_mut()
            .expect("at least one scope is always open")
            .insert(name, ident.clone());
        ident
    }

    /// Resolves a use of `name` to the innermost visible binding.
    pub fn resolve(&self, name: &str) -> Option<&Ident> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_produces_distinct_idents() {
        let mut scopes = ScopeTree::new();
        let outer = scopes.bind("x");
        scopes.push_scope();
        let inner = scopes.bind("x");
        assert_ne!(outer, inner);
        assert_eq!(scopes.resolve("x"), Some(&inner));
        scopes.pop_scope();
        assert_eq!(scopes.resolve("x"), Some(&outer));
    }
}
