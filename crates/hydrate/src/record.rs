//! Records and collections - the nodes of a hydrated object graph
//!
//! `Record` and `Collection` are cheap-to-clone handles onto shared nodes.
//! A collection created for a to-many relation keeps a weak back-reference to
//! its owning record, so the graph never holds a strong cycle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value as JsonValue};

use crate::alias_map::Relation;
use crate::value::Value;

/// What a record field holds
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(Value),
    One(Record),
    Many(Collection),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::One(record)
    }
}

impl From<Collection> for FieldValue {
    fn from(collection: Collection) -> Self {
        FieldValue::Many(collection)
    }
}

#[derive(Debug)]
struct RecordData {
    entity: String,
    data: BTreeMap<String, Value>,
    references: BTreeMap<String, FieldValue>,
    mapped: BTreeMap<String, Value>,
}

/// An entity instance
#[derive(Debug, Clone)]
pub struct Record(Rc<RefCell<RecordData>>);

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(RecordData {
            entity: entity.into(),
            data: BTreeMap::new(),
            references: BTreeMap::new(),
            mapped: BTreeMap::new(),
        })))
    }

    pub fn entity(&self) -> String {
        self.0.borrow().entity.clone()
    }

    /// Read a field: scalar data first, then relation references
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        let inner = self.0.borrow();
        if let Some(value) = inner.data.get(field) {
            return Some(FieldValue::Scalar(value.clone()));
        }
        inner.references.get(field).cloned()
    }

    /// Write a field; records and collections are stored as references
    pub fn set(&self, field: impl Into<String>, value: impl Into<FieldValue>) {
        let field = field.into();
        let mut inner = self.0.borrow_mut();
        match value.into() {
            FieldValue::Scalar(value) => {
                inner.data.insert(field, value);
            }
            reference => {
                inner.references.insert(field, reference);
            }
        }
    }

    /// Whether a relation named `name` has been bound on this record
    pub fn has_reference(&self, name: &str) -> bool {
        self.0.borrow().references.contains_key(name)
    }

    /// Scalar value of a data field
    pub fn value(&self, field: &str) -> Option<Value> {
        self.0.borrow().data.get(field).cloned()
    }

    pub fn related(&self, name: &str) -> Option<Record> {
        match self.0.borrow().references.get(name) {
            Some(FieldValue::One(record)) => Some(record.clone()),
            _ => None,
        }
    }

    pub fn collection(&self, name: &str) -> Option<Collection> {
        match self.0.borrow().references.get(name) {
            Some(FieldValue::Many(collection)) => Some(collection.clone()),
            _ => None,
        }
    }

    /// Store a computed (non-column) value such as an aggregate
    pub fn map_value(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().mapped.insert(name.into(), value);
    }

    pub fn mapped_value(&self, name: &str) -> Option<Value> {
        self.0.borrow().mapped.get(name).cloned()
    }

    /// Identity comparison of two handles
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> Weak<RefCell<RecordData>> {
        Rc::downgrade(&self.0)
    }

    /// Render the record and everything reachable below it
    pub fn to_json(&self) -> JsonValue {
        let inner = self.0.borrow();
        let mut object = Map::new();

        for (field, value) in inner.data.iter().chain(inner.mapped.iter()) {
            object.insert(field.clone(), value.to_json());
        }
        for (name, reference) in &inner.references {
            let rendered = match reference {
                FieldValue::Scalar(value) => value.to_json(),
                FieldValue::One(record) => record.to_json(),
                FieldValue::Many(collection) => collection.to_json(),
            };
            object.insert(name.clone(), rendered);
        }

        JsonValue::Object(object)
    }
}

#[derive(Debug)]
struct CollectionReference {
    owner: Weak<RefCell<RecordData>>,
    relation: Relation,
}

#[derive(Debug)]
struct CollectionData {
    entity: String,
    records: Vec<Record>,
    reference: Option<CollectionReference>,
}

/// An ordered list of records
#[derive(Debug, Clone)]
pub struct Collection(Rc<RefCell<CollectionData>>);

impl Collection {
    pub fn new(entity: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(CollectionData {
            entity: entity.into(),
            records: Vec::new(),
            reference: None,
        })))
    }

    pub fn entity(&self) -> String {
        self.0.borrow().entity.clone()
    }

    pub fn add(&self, record: Record) {
        self.0.borrow_mut().records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<Record> {
        self.0.borrow().records.get(index).cloned()
    }

    /// The most recently appended record
    pub fn last(&self) -> Option<Record> {
        self.0.borrow().records.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().records.is_empty()
    }

    /// Snapshot of the records in insertion order
    pub fn records(&self) -> Vec<Record> {
        self.0.borrow().records.clone()
    }

    /// Record the owning record and relation for reverse navigation
    pub fn set_reference(&self, owner: &Record, relation: Relation) {
        self.0.borrow_mut().reference = Some(CollectionReference {
            owner: owner.downgrade(),
            relation,
        });
    }

    /// The record owning this collection, while it is still alive
    pub fn owner(&self) -> Option<Record> {
        self.0
            .borrow()
            .reference
            .as_ref()
            .and_then(|reference| reference.owner.upgrade())
            .map(Record)
    }

    pub fn relation(&self) -> Option<Relation> {
        self.0
            .borrow()
            .reference
            .as_ref()
            .map(|reference| reference.relation.clone())
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.0.borrow().records.iter().map(Record::to_json).collect())
    }
}
