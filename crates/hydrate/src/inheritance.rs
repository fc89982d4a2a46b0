//! Column aggregation inheritance filters
//!
//! Subtype tables are recognised by discriminator columns. The first table of
//! a query must match its discriminators exactly; later (outer-joined) tables
//! may also be absent, so their constraints tolerate NULL.

use crate::alias_map::{AliasMap, TableAliasMap};
use crate::query::QueryType;
use crate::value::Value;

/// Discriminator column constraints of one subtype, in declaration order
pub type DiscriminatorMap = Vec<(String, Value)>;

/// Builds the WHERE fragment enforcing discriminator values
#[derive(Debug, Clone, Copy)]
pub struct InheritanceFilterBuilder {
    query_type: QueryType,
}

impl Default for InheritanceFilterBuilder {
    fn default() -> Self {
        Self::new(QueryType::Select)
    }
}

impl InheritanceFilterBuilder {
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type }
    }

    /// Build the predicate for `tables`, given as `(table alias, maps)` in
    /// join order
    pub fn build(&self, tables: &[(String, Vec<DiscriminatorMap>)]) -> String {
        let mut clauses = Vec::new();

        for (index, (table_alias, maps)) in tables.iter().enumerate() {
            // non-select statements cannot reference table aliases
            let prefix = if self.query_type == QueryType::Select {
                format!("{}.", table_alias)
            } else {
                String::new()
            };

            let per_map: Vec<String> = maps
                .iter()
                .filter(|map| !map.is_empty())
                .map(|map| {
                    map.iter()
                        .map(|(field, value)| {
                            let value = value.to_sql_literal();
                            if index > 0 {
                                format!("({0}{1} = {2} OR {0}{1} IS NULL)", prefix, field, value)
                            } else {
                                format!("{}{} = {}", prefix, field, value)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(" AND ")
                })
                .collect();

            if !per_map.is_empty() {
                clauses.push(per_map.join(" AND "));
            }
        }

        clauses.join(" AND ")
    }

    /// Build the predicate from the entity descriptors of an alias map
    ///
    /// Components without a physical table alias use their component alias.
    pub fn build_for(&self, alias_map: &AliasMap, table_aliases: &TableAliasMap) -> String {
        let tables: Vec<(String, Vec<DiscriminatorMap>)> = alias_map
            .iter()
            .map(|entry| {
                let table_alias = table_aliases
                    .table_alias_of(&entry.alias)
                    .unwrap_or(entry.alias.as_str())
                    .to_string();
                (table_alias, vec![entry.table.inheritance_map().to_vec()])
            })
            .collect();

        self.build(&tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias_map::Relation;
    use crate::descriptor::Table;

    fn table(alias: &str, maps: &[&[(&str, Value)]]) -> (String, Vec<DiscriminatorMap>) {
        (
            alias.to_string(),
            maps.iter()
                .map(|map| map.iter().map(|(f, v)| (f.to_string(), v.clone())).collect())
                .collect(),
        )
    }

    #[test]
    fn test_first_table_strict_later_tables_tolerant() {
        let tables = vec![
            table("a", &[&[("type", Value::from(1))]]),
            table("b", &[&[("type", Value::from(2))]]),
        ];

        assert_eq!(
            InheritanceFilterBuilder::default().build(&tables),
            "a.type = 1 AND (b.type = 2 OR b.type IS NULL)"
        );
    }

    #[test]
    fn test_multiple_fields_and_maps_are_conjoined() {
        let tables = vec![table(
            "e",
            &[&[("type", Value::from(1)), ("kind", Value::from("x"))], &[("level", Value::from(3))]],
        )];

        assert_eq!(
            InheritanceFilterBuilder::default().build(&tables),
            "e.type = 1 AND e.kind = 'x' AND e.level = 3"
        );
    }

    #[test]
    fn test_non_select_omits_aliases() {
        let tables = vec![
            table("a", &[&[("type", Value::from(1))]]),
            table("b", &[&[("type", Value::from(2))]]),
        ];

        assert_eq!(
            InheritanceFilterBuilder::new(QueryType::Delete).build(&tables),
            "type = 1 AND (type = 2 OR type IS NULL)"
        );
    }

    #[test]
    fn test_tables_without_maps_still_count_as_positions() {
        let tables = vec![table("a", &[]), table("b", &[&[("type", Value::from(2))]])];

        assert_eq!(
            InheritanceFilterBuilder::default().build(&tables),
            "(b.type = 2 OR b.type IS NULL)"
        );
        assert_eq!(InheritanceFilterBuilder::default().build(&[]), "");
    }

    #[test]
    fn test_build_for_alias_map() {
        let map = AliasMap::new()
            .with_root("Entity", Table::new("Entity").with_discriminator("type", 1))
            .with_join(
                "Entity.group",
                "Entity",
                Relation::one_to_one("group"),
                Table::new("Group").with_discriminator("type", 2),
            );
        let aliases = TableAliasMap::new().with_alias("e", "Entity").with_alias("g", "Entity.group");

        assert_eq!(
            InheritanceFilterBuilder::default().build_for(&map, &aliases),
            "e.type = 1 AND (g.type = 2 OR g.type IS NULL)"
        );
    }

    #[test]
    fn test_build_for_picks_first_table_alias_of_component() {
        let map = AliasMap::new().with_root("Entity", Table::new("Entity").with_discriminator("type", 1));
        let aliases = TableAliasMap::new().with_alias("e2", "Entity").with_alias("e1", "Entity");

        assert_eq!(InheritanceFilterBuilder::default().build_for(&map, &aliases), "e1.type = 1");
    }
}
