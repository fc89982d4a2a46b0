//! Row types - flat cursor rows and their per-alias sub-rows

use std::collections::BTreeMap;

use crate::value::Value;

/// One row from the underlying cursor, keys in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRow {
    columns: Vec<(String, Value)>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append
    pub fn with_column(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for FlatRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// The columns of one flat row that belong to a single table alias
///
/// Field names are lower-case. Equality is content equality, independent of
/// column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubRow {
    fields: BTreeMap<String, Value>,
}

impl SubRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether `field` is present with a non-null value
    pub fn has_value(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|value| !value.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// A sub-row with no non-null value, e.g. the missing side of a LEFT JOIN
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Value::is_null)
    }
}

/// A flat row split by table alias, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRow {
    sub_rows: Vec<(String, SubRow)>,
}

impl ParsedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table_alias: &str) -> Option<&SubRow> {
        self.sub_rows
            .iter()
            .find(|(alias, _)| alias == table_alias)
            .map(|(_, sub_row)| sub_row)
    }

    /// Get or create the sub-row for `table_alias`
    pub fn entry(&mut self, table_alias: &str) -> &mut SubRow {
        let index = match self.sub_rows.iter().position(|(alias, _)| alias == table_alias) {
            Some(index) => index,
            None => {
                self.sub_rows.push((table_alias.to_string(), SubRow::new()));
                self.sub_rows.len() - 1
            }
        };
        &mut self.sub_rows[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubRow)> {
        self.sub_rows.iter().map(|(alias, sub_row)| (alias.as_str(), sub_row))
    }

    pub fn len(&self) -> usize {
        self.sub_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_rows.is_empty()
    }
}
