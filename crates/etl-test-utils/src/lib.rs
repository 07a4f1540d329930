//! Testing utilities for the ETL workspace
//!
//! Shared schema fixture, row builders, a store that injects save failures and
//! an error log for listener assertions.

#![allow(missing_docs)]

use etl_model::{
    DomainObject, FieldDescriptor, ObjectRef, SchemaRegistry, TypeDescriptor, ValueRow,
};
use etl_store::{MemoryRowSource, MemoryStore, ObjectStore, Query, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const SPECIES: &str = "lookup.species";
pub const BREED: &str = "lookup.breed";
pub const SPECIES_BREED: &str = "lookupRelationship.speciesBreed";

/// Pets, people, contacts and the species/breed vocabulary
pub fn pet_schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_type(
            TypeDescriptor::new("person")
                .with_field(FieldDescriptor::text("name"))
                .with_field(FieldDescriptor::boolean("active").with_default_value("true"))
                .with_field(
                    FieldDescriptor::collection("contacts", "contact")
                        .with_default_children(["contact".to_string()]),
                )
                .with_field(FieldDescriptor::collection("pets", "pet"))
                .with_field(FieldDescriptor::reference("referrer", "person")),
        )
        .with_type(
            TypeDescriptor::new("contact")
                .with_field(FieldDescriptor::text("kind").with_default_value("HOME"))
                .with_field(FieldDescriptor::text("address")),
        )
        .with_type(
            TypeDescriptor::new("pet")
                .with_field(FieldDescriptor::text("name"))
                .with_field(FieldDescriptor::lookup("species", SPECIES))
                .with_field(FieldDescriptor::target_lookup(
                    "breed",
                    Some(SPECIES_BREED),
                    "/species",
                ))
                .with_field(FieldDescriptor::reference("owner", "person"))
                .with_field(FieldDescriptor::date("dob"))
                .with_field(FieldDescriptor::int("age"))
                .with_field(FieldDescriptor::text("description").with_derived("{name} ({species})")),
        )
        .with_type(
            TypeDescriptor::new("party.customerperson").with_field(FieldDescriptor::text("name")),
        )
        .with_type(
            TypeDescriptor::new("party.customerorganisation")
                .with_field(FieldDescriptor::text("name")),
        )
        .with_type(lookup_type(SPECIES))
        .with_type(lookup_type(BREED))
        .with_type(
            TypeDescriptor::new(SPECIES_BREED)
                .with_field(FieldDescriptor::reference("source", SPECIES))
                .with_field(FieldDescriptor::reference("target", BREED)),
        )
}

fn lookup_type(name: &str) -> TypeDescriptor {
    TypeDescriptor::new(name)
        .with_field(FieldDescriptor::text("code"))
        .with_field(FieldDescriptor::text("name"))
}

/// Schema, store and source over a set of rows
#[derive(Debug, Clone)]
pub struct Fixture {
    pub schema: Arc<SchemaRegistry>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<MemoryRowSource>,
}

impl Fixture {
    pub fn new(rows: Vec<ValueRow>) -> Self {
        let schema = Arc::new(pet_schema());
        let store = Arc::new(MemoryStore::new(schema.clone()));
        Self {
            schema,
            store,
            source: Arc::new(MemoryRowSource::new(rows)),
        }
    }

    /// Fixture sharing this one's schema and store, over new rows
    pub fn with_rows(&self, rows: Vec<ValueRow>) -> Self {
        Self {
            schema: self.schema.clone(),
            store: self.store.clone(),
            source: Arc::new(MemoryRowSource::new(rows)),
        }
    }

    /// Persist a pet named `name`, bypassing validation
    pub fn persist_pet(&self, name: &str) -> ObjectRef {
        let mut pet = self.store.create("pet").unwrap();
        pet.set("name", name);
        let reference = pet.reference().clone();
        self.store.insert(pet);
        reference
    }

    /// Persisted objects of a type
    pub fn saved(&self, type_name: &str) -> Vec<DomainObject> {
        self.store.objects_of(type_name)
    }

    /// Codes of persisted lookups of a type, sorted
    pub fn codes(&self, type_name: &str) -> Vec<String> {
        let mut codes: Vec<String> = self
            .saved(type_name)
            .iter()
            .filter_map(|lookup| lookup.text("code").map(str::to_string))
            .collect();
        codes.sort();
        codes
    }
}

/// `count` single-row pet records `pet0000`, `pet0001`, ...
pub fn numbered_pets(count: usize) -> Vec<ValueRow> {
    (0..count)
        .map(|i| ValueRow::new(format!("pet{i:04}"), "pet", "name", format!("Pet {i}")))
        .collect()
}

/// `count` people, each referred by the next: `person0000 <- person0001 <- ...`
pub fn referral_chain(count: usize) -> Vec<ValueRow> {
    let mut rows = Vec::with_capacity(count * 2);
    for i in 0..count {
        let id = format!("person{i:04}");
        rows.push(ValueRow::new(&id, "person", "name", format!("Person {i}")));
        if i + 1 < count {
            rows.push(ValueRow::reference(&id, "person", "referrer", format!("#person{:04}", i + 1)));
        }
    }
    rows
}

/// Rows for one pet with species and breed
pub fn pet_with_breed(record_id: &str, name: &str, species: &str, breed: &str) -> Vec<ValueRow> {
    vec![
        ValueRow::new(record_id, "pet", "name", name),
        ValueRow::new(record_id, "pet", "species", species),
        ValueRow::new(record_id, "pet", "breed", breed),
    ]
}

/// Store wrapper that can fail batch saves and individual lookup saves
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_batches: AtomicBool,
    fail_codes: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_batches: AtomicBool::new(false),
            fail_codes: Mutex::new(HashSet::new()),
        }
    }

    /// Fail every `save_all` call
    pub fn fail_batches(self) -> Self {
        self.fail_batches.store(true, Ordering::Relaxed);
        self
    }

    /// Fail saving any object whose `code` field equals `code`
    pub fn fail_code(self, code: &str) -> Self {
        self.fail_codes.lock().insert(code.to_string());
        self
    }

    fn check(&self, object: &DomainObject) -> Result<(), StoreError> {
        match object.text("code") {
            Some(code) if self.fail_codes.lock().contains(code) => {
                Err(StoreError::Backend(format!("refusing to save code {code}")))
            }
            _ => Ok(()),
        }
    }
}

impl ObjectStore for FailingStore {
    fn create(&self, type_name: &str) -> Option<DomainObject> {
        self.inner.create(type_name)
    }

    fn query(&self, query: &Query) -> Result<Vec<DomainObject>, StoreError> {
        self.inner.query(query)
    }

    fn get(&self, reference: &ObjectRef) -> Result<Option<DomainObject>, StoreError> {
        self.inner.get(reference)
    }

    fn save(&self, object: &DomainObject, validate: bool) -> Result<(), StoreError> {
        self.check(object)?;
        self.inner.save(object, validate)
    }

    fn save_all(&self, objects: &[DomainObject], validate: bool) -> Result<(), StoreError> {
        if self.fail_batches.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("batch save disabled".into()));
        }
        for object in objects {
            self.check(object)?;
        }
        self.inner.save_all(objects, validate)
    }

    fn derive_computed_fields(&self, object: &mut DomainObject) {
        self.inner.derive_computed_fields(object);
    }
}

/// Thread-safe record of `(identifier, message)` reports
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<(String, String)>>,
}

impl ErrorLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, identifier: &str, error: impl Display) {
        self.entries
            .lock()
            .push((identifier.to_string(), error.to_string()));
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}
