//! Aggregate value mapping
//!
//! Computed columns (`COUNT(...)`, `MAX(...)`, subquery results) are selected
//! positionally: `<tableAlias>__<n>`. `AggregateSpec` translates an
//! `(alias, position)` pair back into the name the caller asked for.

use std::collections::HashMap;

use tracing::trace;

use crate::config::AggregatePolicy;
use crate::descriptor::EntityDescriptor;
use crate::record::Record;
use crate::row::SubRow;

/// An aggregate expression selected by the query itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAggregate {
    /// Source expression, e.g. `COUNT(p.id)`
    pub expression: String,
    /// Name the value is mapped under on the record
    pub name: String,
}

impl PendingAggregate {
    pub fn new(expression: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            name: name.into(),
        }
    }
}

/// Positional aggregate names per component alias
#[derive(Debug, Clone, Default)]
pub struct AggregateSpec {
    pending: HashMap<String, HashMap<usize, PendingAggregate>>,
    subquery: HashMap<String, HashMap<usize, String>>,
}

impl AggregateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending(mut self, alias: impl Into<String>, position: usize, aggregate: PendingAggregate) -> Self {
        self.pending
            .entry(alias.into())
            .or_default()
            .insert(position, aggregate);
        self
    }

    pub fn with_subquery(mut self, alias: impl Into<String>, position: usize, name: impl Into<String>) -> Self {
        self.subquery
            .entry(alias.into())
            .or_default()
            .insert(position, name.into());
        self
    }

    /// Resolve the mapped name; query-local aggregates win over subquery ones
    pub fn resolve(&self, alias: &str, position: usize) -> Option<&str> {
        if let Some(aggregate) = self.pending.get(alias).and_then(|p| p.get(&position)) {
            return Some(&aggregate.name);
        }
        self.subquery
            .get(alias)
            .and_then(|s| s.get(&position))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.subquery.is_empty()
    }
}

/// Applies positional aggregate columns to records
#[derive(Debug, Clone, Copy)]
pub struct AggregateMapper<'a> {
    spec: &'a AggregateSpec,
    policy: AggregatePolicy,
}

impl<'a> AggregateMapper<'a> {
    pub fn new(spec: &'a AggregateSpec, policy: AggregatePolicy) -> Self {
        Self { spec, policy }
    }

    /// Map the aggregate columns of `row` onto `record`
    ///
    /// `fresh` tells whether `record` was instantiated from this very row.
    /// Returns the number of values mapped.
    pub fn apply(
        &self,
        record: Option<&Record>,
        fresh: bool,
        alias: &str,
        row: &SubRow,
        table: &dyn EntityDescriptor,
    ) -> usize {
        let Some(record) = record else {
            return 0;
        };
        if !fresh && self.policy == AggregatePolicy::FreshOnly {
            return 0;
        }

        let mut mapped = 0;
        for (key, value) in row.iter() {
            if table.is_field(key) {
                continue;
            }
            let Ok(position) = key.parse::<usize>() else {
                continue;
            };
            match self.spec.resolve(alias, position) {
                Some(name) => {
                    record.map_value(name, value.clone());
                    mapped += 1;
                }
                None => trace!("No aggregate mapped for {}[{}], value dropped", alias, position),
            }
        }
        mapped
    }
}
