//! Alias maps - per-query component metadata
//!
//! The alias map lists every query component in declaration order: the root
//! first, then each joined component after its parent. The table alias map
//! translates the physical SQL table aliases found in result columns back to
//! component aliases.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::descriptor::EntityDescriptor;
use crate::error::{HydrateError, HydrateResult};

/// Cardinality of a relation as seen from its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    OneToOne,
    ToMany,
}

/// Relation from a parent component to a child component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Field name under which the child is attached to the parent
    pub alias_name: String,
    pub cardinality: Cardinality,
}

impl Relation {
    pub fn new(alias_name: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            alias_name: alias_name.into(),
            cardinality,
        }
    }

    pub fn one_to_one(alias_name: impl Into<String>) -> Self {
        Self::new(alias_name, Cardinality::OneToOne)
    }

    pub fn to_many(alias_name: impl Into<String>) -> Self {
        Self::new(alias_name, Cardinality::ToMany)
    }

    pub fn is_one_to_one(&self) -> bool {
        self.cardinality == Cardinality::OneToOne
    }
}

/// One component of a query
#[derive(Debug, Clone)]
pub struct AliasEntry {
    pub alias: String,
    pub table: Arc<dyn EntityDescriptor>,
    pub relation: Option<Relation>,
    pub parent: Option<String>,
}

impl AliasEntry {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Ordered component metadata of a query
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    entries: Vec<AliasEntry>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the root component
    pub fn with_root(mut self, alias: impl Into<String>, table: impl EntityDescriptor + 'static) -> Self {
        self.entries.push(AliasEntry {
            alias: alias.into(),
            table: Arc::new(table),
            relation: None,
            parent: None,
        });
        self
    }

    /// Declare a component joined onto `parent` through `relation`
    pub fn with_join(
        mut self,
        alias: impl Into<String>,
        parent: impl Into<String>,
        relation: Relation,
        table: impl EntityDescriptor + 'static,
    ) -> Self {
        self.entries.push(AliasEntry {
            alias: alias.into(),
            table: Arc::new(table),
            relation: Some(relation),
            parent: Some(parent.into()),
        });
        self
    }

    pub fn push(&mut self, entry: AliasEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, alias: &str) -> Option<&AliasEntry> {
        self.entries.iter().find(|entry| entry.alias == alias)
    }

    pub fn root(&self) -> Option<&AliasEntry> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that the entries form a tree rooted at the first entry with
    /// every parent declared before its children
    pub fn validate(&self) -> HydrateResult<()> {
        let root = self.root().ok_or(HydrateError::EmptyAliasMap)?;
        if !root.is_root() {
            return Err(HydrateError::InvalidAliasMap(format!(
                "first alias '{}' must be the root but declares a parent",
                root.alias
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if let Some(parent) = &entry.parent {
                if !seen.contains(parent.as_str()) {
                    return Err(HydrateError::InvalidAliasMap(format!(
                        "alias '{}' references parent '{}' that is not declared before it",
                        entry.alias, parent
                    )));
                }
                if entry.relation.is_none() {
                    return Err(HydrateError::InvalidAliasMap(format!(
                        "alias '{}' has a parent but no relation",
                        entry.alias
                    )));
                }
            } else if !seen.is_empty() {
                return Err(HydrateError::InvalidAliasMap(format!(
                    "alias '{}' is a second root",
                    entry.alias
                )));
            }

            if !seen.insert(entry.alias.as_str()) {
                return Err(HydrateError::InvalidAliasMap(format!(
                    "alias '{}' is declared twice",
                    entry.alias
                )));
            }
        }

        Ok(())
    }
}

/// Physical table alias to component alias translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAliasMap {
    aliases: BTreeMap<String, String>,
}

impl TableAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table aliases are matched case-insensitively, as result keys are
    /// lower-cased by the parser
    pub fn with_alias(mut self, table_alias: impl Into<String>, component_alias: impl Into<String>) -> Self {
        self.insert(table_alias, component_alias);
        self
    }

    pub fn insert(&mut self, table_alias: impl Into<String>, component_alias: impl Into<String>) {
        self.aliases
            .insert(table_alias.into().to_lowercase(), component_alias.into());
    }

    pub fn resolve(&self, table_alias: &str) -> Option<&str> {
        self.aliases.get(table_alias).map(String::as_str)
    }

    /// Reverse lookup: the table alias used for `component_alias`
    ///
    /// When several table aliases target the component the lexically first
    /// one is returned.
    pub fn table_alias_of(&self, component_alias: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(_, component)| component.as_str() == component_alias)
            .map(|(table, _)| table.as_str())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
