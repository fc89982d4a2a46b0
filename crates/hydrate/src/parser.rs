//! Result row parsing
//!
//! Column keys are encoded as `<tableAlias><separator><field>`. The key is
//! split on the last separator; both halves are lower-cased. Columns without a
//! separator are positional aggregates and land under the empty alias, keyed
//! by their position among the unprefixed columns.

use crate::row::{FlatRow, ParsedRow};

pub const DEFAULT_KEY_SEPARATOR: &str = "__";

/// Splits flat cursor rows into per-table-alias sub-rows
#[derive(Debug, Clone)]
pub struct ResultRowParser {
    separator: String,
}

impl Default for ResultRowParser {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_SEPARATOR)
    }
}

impl ResultRowParser {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Split a column key into `(table_alias, field)`
    ///
    /// Returns `None` for keys without a separator.
    pub fn split_key(&self, key: &str) -> Option<(String, String)> {
        key.rsplit_once(self.separator.as_str())
            .map(|(prefix, field)| (prefix.to_lowercase(), field.to_lowercase()))
    }

    pub fn parse(&self, row: &FlatRow) -> ParsedRow {
        let mut parsed = ParsedRow::new();
        let mut position = 0usize;

        for (key, value) in row.iter() {
            match self.split_key(key) {
                Some((table_alias, field)) => {
                    parsed.entry(&table_alias).insert(field, value.clone());
                }
                None => {
                    parsed.entry("").insert(position.to_string(), value.clone());
                    position += 1;
                }
            }
        }

        parsed
    }
}
