//! Entity descriptors - identity, fields and record construction for an alias
//!
//! The hydrator only needs three things from an entity: its primary key
//! field(s), which sub-row keys are real columns, and a way to build a record.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::row::SubRow;
use crate::value::Value;

/// Primary key declaration of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identifier {
    /// Single-column key
    Single(String),
    /// Composite key (multiple fields)
    Composite(Vec<String>),
}

impl Identifier {
    pub fn single(field: impl Into<String>) -> Self {
        Identifier::Single(field.into())
    }

    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Identifier::Composite(fields.into_iter().map(Into::into).collect())
    }

    pub fn fields(&self) -> Vec<&str> {
        match self {
            Identifier::Single(field) => vec![field.as_str()],
            Identifier::Composite(fields) => fields.iter().map(String::as_str).collect(),
        }
    }

    /// A sub-row is identifiable when every key field is present and non-null
    pub fn is_identifiable(&self, row: &SubRow) -> bool {
        match self {
            Identifier::Single(field) => row.has_value(field),
            Identifier::Composite(fields) => fields.iter().all(|field| row.has_value(field)),
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::Single("id".to_string())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fields().join(","))
    }
}

/// Metadata and record factory for one entity type
pub trait EntityDescriptor: Debug + Send + Sync {
    /// Component (entity) name
    fn name(&self) -> &str;

    /// Primary key field name(s)
    fn identifier(&self) -> &Identifier;

    /// Whether `field` is a declared column of this entity
    fn is_field(&self, field: &str) -> bool;

    /// Discriminator column values for column aggregation inheritance
    fn inheritance_map(&self) -> &[(String, Value)] {
        &[]
    }

    /// Build a fresh record from an identifiable sub-row
    fn create_record(&self, row: &SubRow) -> Record {
        let record = Record::new(self.name());
        for (field, value) in row.iter() {
            if self.is_field(field) {
                record.set(field, value.clone());
            }
        }
        record
    }
}

/// Table-backed entity descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    identifier: Identifier,
    fields: Vec<String>,
    inheritance_map: Vec<(String, Value)>,
}

impl Table {
    /// Create a table whose key is `id`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: Identifier::default(),
            fields: Vec::new(),
            inheritance_map: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = identifier;
        self
    }

    /// Declare the column set; field names are stored lower-case
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(|f| f.into().to_lowercase()).collect();
        self
    }

    /// Add a discriminator constraint
    pub fn with_discriminator(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inheritance_map.push((field.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl EntityDescriptor for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Without an explicit column list every named (non-positional) key is a
    /// column
    fn is_field(&self, field: &str) -> bool {
        if self.fields.is_empty() {
            return field.parse::<usize>().is_err();
        }
        self.fields.iter().any(|declared| declared == field)
    }

    fn inheritance_map(&self) -> &[(String, Value)] {
        &self.inheritance_map
    }
}
