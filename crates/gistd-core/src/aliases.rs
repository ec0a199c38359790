// ABOUTME: Model-name alias resolution with run-scoped overlay support.
// ABOUTME: The base table is never mutated; merges produce a fresh resolver.

use std::collections::BTreeMap;

/// Resolves model-name aliases. Unknown names resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasResolver {
    table: BTreeMap<String, String>,
}

impl AliasResolver {
    pub fn new(table: BTreeMap<String, String>) -> Self {
        Self { table }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve an alias to its target model name, or return the input
    /// unchanged when no alias matches.
    pub fn resolve(&self, model: &str) -> String {
        match self.table.get(model) {
            Some(target) => target.clone(),
            None => model.to_string(),
        }
    }

    /// Layer run-scoped aliases over this table, returning a new resolver.
    /// Run entries win on key collision; `self` is left untouched.
    pub fn merged(&self, overrides: &BTreeMap<String, String>) -> AliasResolver {
        let mut table = self.table.clone();
        for (alias, target) in overrides {
            table.insert(alias.clone(), target.clone());
        }
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
