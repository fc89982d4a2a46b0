//! Hydrator - folds flat join rows into an object graph
//!
//! Rows are consumed one at a time. For every component alias the hydrator
//! remembers the last raw sub-row (to recognise join fan-out duplicates) and
//! the current record or collection (to find the parent of the next child).
//! Nothing is pooled by primary key: identity is "the most recent distinct
//! sub-row for this alias".

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::aggregate::{AggregateMapper, AggregateSpec};
use crate::alias_map::{AliasEntry, AliasMap, Relation, TableAliasMap};
use crate::backends::Cursor;
use crate::config::HydrationConfig;
use crate::error::{HydrateError, HydrateResult};
use crate::parser::ResultRowParser;
use crate::record::{Collection, Record};
use crate::row::{ParsedRow, SubRow};

/// The last known graph node for an alias
#[derive(Debug, Clone)]
enum Current {
    Record(Record),
    Collection(Collection),
}

impl Current {
    /// The record children of this alias attach to
    fn as_parent(&self) -> Option<Record> {
        match self {
            Current::Record(record) => Some(record.clone()),
            Current::Collection(collection) => collection.last(),
        }
    }
}

/// Counters for one hydration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationStats {
    pub rows: usize,
    pub records: usize,
    pub duplicates: usize,
    pub orphans: usize,
}

struct HydrationState {
    root: Collection,
    current: HashMap<String, Current>,
    last_sub_row: HashMap<String, SubRow>,
    /// Last record instantiated per alias, possibly from an earlier row
    last_record: HashMap<String, Record>,
    stats: HydrationStats,
}

/// Builds the object graph of one result set
#[derive(Debug, Clone)]
pub struct Hydrator<'a> {
    alias_map: &'a AliasMap,
    table_aliases: &'a TableAliasMap,
    aggregates: Option<&'a AggregateSpec>,
    config: HydrationConfig,
}

impl<'a> Hydrator<'a> {
    pub fn new(alias_map: &'a AliasMap, table_aliases: &'a TableAliasMap) -> Self {
        Self {
            alias_map,
            table_aliases,
            aggregates: None,
            config: HydrationConfig::default(),
        }
    }

    pub fn with_aggregates(mut self, aggregates: &'a AggregateSpec) -> Self {
        self.aggregates = Some(aggregates);
        self
    }

    pub fn with_config(mut self, config: HydrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Consume `cursor` and return the root collection
    ///
    /// The cursor is closed exactly once, whether hydration succeeds or not.
    /// An empty alias map fails before the cursor is touched.
    pub fn hydrate<C>(&self, cursor: &mut C) -> HydrateResult<Collection>
    where
        C: Cursor + ?Sized,
    {
        self.hydrate_with_stats(cursor).map(|(root, _)| root)
    }

    pub fn hydrate_with_stats<C>(&self, cursor: &mut C) -> HydrateResult<(Collection, HydrationStats)>
    where
        C: Cursor + ?Sized,
    {
        if self.alias_map.is_empty() {
            return Err(HydrateError::EmptyAliasMap);
        }

        let result = self
            .alias_map
            .validate()
            .and_then(|_| self.consume(cursor));
        let closed = cursor.close();

        let (root, stats) = match result {
            Ok(done) => done,
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!("Failed to close cursor after hydration error: {}", close_err);
                }
                return Err(err);
            }
        };
        closed?;

        debug!(
            "Hydrated {} rows into {} root records ({} records, {} duplicate sub-rows, {} orphans)",
            stats.rows,
            root.len(),
            stats.records,
            stats.duplicates,
            stats.orphans
        );
        Ok((root, stats))
    }

    fn consume<C>(&self, cursor: &mut C) -> HydrateResult<(Collection, HydrationStats)>
    where
        C: Cursor + ?Sized,
    {
        let root_entry = self.alias_map.root().ok_or(HydrateError::EmptyAliasMap)?;
        let parser = ResultRowParser::new(self.config.key_separator.clone());

        let root = Collection::new(root_entry.table.name());
        let mut state = HydrationState {
            root: root.clone(),
            current: HashMap::new(),
            last_sub_row: HashMap::new(),
            last_record: HashMap::new(),
            stats: HydrationStats::default(),
        };
        state
            .current
            .insert(root_entry.alias.clone(), Current::Collection(root));

        debug!("Hydrating result set for root alias '{}'", root_entry.alias);

        while let Some(row) = cursor.next_row()? {
            let parsed = parser.parse(&row);
            self.hydrate_row(&parsed, &mut state)?;
            state.stats.rows += 1;
        }

        Ok((state.root, state.stats))
    }

    fn hydrate_row(&self, parsed: &ParsedRow, state: &mut HydrationState) -> HydrateResult<()> {
        let mut by_alias: HashMap<&str, (&str, &SubRow)> = HashMap::new();
        let mut row_aggregates = None;

        for (table_alias, sub_row) in parsed.iter() {
            if table_alias.is_empty() && self.table_aliases.resolve(table_alias).is_none() {
                row_aggregates = Some(sub_row);
                continue;
            }
            if sub_row.is_empty() {
                continue;
            }
            // the target component must be part of this query's alias map
            let alias = self
                .table_aliases
                .resolve(table_alias)
                .filter(|alias| self.alias_map.get(alias).is_some())
                .ok_or_else(|| HydrateError::UnknownTableAlias(table_alias.to_string()))?;
            if let Some((other, _)) = by_alias.insert(alias, (table_alias, sub_row)) {
                return Err(HydrateError::InvalidAliasMap(format!(
                    "table aliases '{}' and '{}' both resolve to '{}'",
                    other, table_alias, alias
                )));
            }
        }

        for entry in self.alias_map.iter() {
            let fresh = match by_alias.get(entry.alias.as_str()) {
                Some((_, sub_row)) => self.hydrate_alias(entry, sub_row, state),
                None => None,
            };

            if entry.is_root() {
                if let Some(sub_row) = row_aggregates {
                    self.map_aggregates(entry, fresh.as_ref(), sub_row, state);
                }
            }
        }

        Ok(())
    }

    /// Process one alias of one row; returns the record instantiated from it
    fn hydrate_alias(&self, entry: &AliasEntry, sub_row: &SubRow, state: &mut HydrationState) -> Option<Record> {
        let alias = entry.alias.as_str();

        if state.last_sub_row.get(alias) == Some(sub_row) {
            trace!("Skipping duplicate sub-row for alias '{}'", alias);
            state.stats.duplicates += 1;
            return None;
        }

        let fresh = if entry.table.identifier().is_identifiable(sub_row) {
            let record = entry.table.create_record(sub_row);
            state.last_record.insert(alias.to_string(), record.clone());
            state.stats.records += 1;
            Some(record)
        } else {
            trace!("Sub-row for alias '{}' is not identifiable", alias);
            None
        };

        self.map_aggregates(entry, fresh.as_ref(), sub_row, state);

        match (&entry.parent, &entry.relation) {
            (None, _) => {
                if let Some(record) = &fresh {
                    state.root.add(record.clone());
                    if self.config.reset_on_new_root {
                        state.last_sub_row.clear();
                    }
                }
            }
            (Some(parent_alias), Some(relation)) => {
                self.attach(entry, parent_alias, relation, fresh.as_ref(), state);
            }
            (Some(_), None) => {
                warn!("Alias '{}' has a parent but no relation, not attached", alias);
            }
        }

        state.last_sub_row.insert(alias.to_string(), sub_row.clone());
        fresh
    }

    fn attach(
        &self,
        entry: &AliasEntry,
        parent_alias: &str,
        relation: &Relation,
        fresh: Option<&Record>,
        state: &mut HydrationState,
    ) {
        let alias = entry.alias.as_str();
        let Some(parent) = state.current.get(parent_alias).and_then(Current::as_parent) else {
            debug!(
                "No '{}' record to attach '{}' to, sub-row skipped",
                parent_alias, alias
            );
            state.stats.orphans += 1;
            return;
        };

        if relation.is_one_to_one() {
            let Some(record) = fresh else {
                return;
            };
            parent.set(relation.alias_name.as_str(), record.clone());
            state
                .current
                .insert(alias.to_string(), Current::Record(record.clone()));
            return;
        }

        let collection = match parent.collection(&relation.alias_name) {
            Some(existing) => existing,
            None => {
                let collection = Collection::new(entry.table.name());
                collection.set_reference(&parent, relation.clone());
                collection
            }
        };

        if let Some(record) = fresh {
            collection.add(record.clone());
        }
        parent.set(relation.alias_name.as_str(), collection.clone());
        state
            .current
            .insert(alias.to_string(), Current::Collection(collection));
    }

    fn map_aggregates(&self, entry: &AliasEntry, fresh: Option<&Record>, sub_row: &SubRow, state: &HydrationState) {
        let Some(spec) = self.aggregates else {
            return;
        };
        let mapper = AggregateMapper::new(spec, self.config.aggregate_policy);
        let target = fresh.or_else(|| state.last_record.get(&entry.alias));
        mapper.apply(target, fresh.is_some(), &entry.alias, sub_row, entry.table.as_ref());
    }
}
