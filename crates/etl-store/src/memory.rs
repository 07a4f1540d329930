//! In-memory object store
//!
//! Backs the CLI and the test suites. Objects are keyed by id in a [`DashMap`];
//! saving with validation rejects undeclared fields and derives computed fields.

use crate::error::StoreError;
use crate::store::{ObjectStore, Query};
use dashmap::DashMap;
use etl_model::{
    DomainObject, FieldDescriptor, FieldKind, ObjectId, ObjectRef, Schema, TypeDescriptor, Value,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("valid regex"));

/// Object store held entirely in memory
pub struct MemoryStore {
    schema: Arc<dyn Schema>,
    objects: DashMap<ObjectId, DomainObject>,
    save_calls: AtomicUsize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("objects", &self.objects.len())
            .field("save_calls", &self.save_calls())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create empty store over a schema
    #[must_use]
    pub fn new(schema: Arc<dyn Schema>) -> Self {
        Self {
            schema,
            objects: DashMap::new(),
            save_calls: AtomicUsize::new(0),
        }
    }

    /// Insert an object directly, bypassing validation and save accounting
    pub fn insert(&self, object: DomainObject) {
        self.objects.insert(object.reference().id(), object);
    }

    /// Number of persisted objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is persisted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of `save`/`save_all` calls made so far
    #[inline]
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::Relaxed)
    }

    /// All persisted objects of a type
    #[must_use]
    pub fn objects_of(&self, type_name: &str) -> Vec<DomainObject> {
        let mut found: Vec<DomainObject> = self
            .objects
            .iter()
            .filter(|entry| entry.type_name() == type_name)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.reference().cmp(b.reference()));
        found
    }

    fn instantiate(&self, descriptor: &TypeDescriptor, with_children: bool) -> DomainObject {
        let mut object = DomainObject::new(ObjectRef::generate(descriptor.name.clone()));
        for field in &descriptor.fields {
            if let Some(default) = &field.default_value {
                object.set(field.name.clone(), default_value(field, default));
            }
            if with_children && field.collection {
                for child_type in &field.default_children {
                    if let Some(child) = self.schema.type_descriptor(child_type) {
                        let child = self.instantiate(child, false);
                        object.push(&field.name, Value::Object(Box::new(child)));
                    }
                }
            }
        }
        object
    }

    fn prepare(&self, object: &DomainObject, validate: bool) -> Result<DomainObject, StoreError> {
        let mut prepared = object.clone();
        if !validate {
            return Ok(prepared);
        }
        let descriptor = self
            .schema
            .type_descriptor(object.type_name())
            .ok_or_else(|| StoreError::UnknownType(object.type_name().to_string()))?;
        if let Some((name, _)) = object.fields().find(|(name, _)| descriptor.field(name).is_none()) {
            return Err(StoreError::validation(
                object.type_name(),
                format!("undeclared field '{name}'"),
            ));
        }
        self.derive_computed_fields(&mut prepared);
        Ok(prepared)
    }
}

fn default_value(field: &FieldDescriptor, literal: &str) -> Value {
    match field.kind {
        FieldKind::Bool => literal
            .parse::<bool>()
            .map_or_else(|_| Value::from(literal), Value::Bool),
        FieldKind::Int => literal
            .parse::<i64>()
            .map_or_else(|_| Value::from(literal), Value::Int),
        _ => Value::from(literal),
    }
}

fn render(template: &str, object: &DomainObject) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            object
                .get(&caps[1])
                .map(ToString::to_string)
                .unwrap_or_default()
        })
        .into_owned()
}

impl ObjectStore for MemoryStore {
    fn create(&self, type_name: &str) -> Option<DomainObject> {
        self.schema
            .type_descriptor(type_name)
            .map(|descriptor| self.instantiate(descriptor, true))
    }

    fn query(&self, query: &Query) -> Result<Vec<DomainObject>, StoreError> {
        let mut found: Vec<DomainObject> = self
            .objects
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.reference().cmp(b.reference()));
        if let Some(max) = query.max_results() {
            found.truncate(max);
        }
        Ok(found)
    }

    fn get(&self, reference: &ObjectRef) -> Result<Option<DomainObject>, StoreError> {
        Ok(self
            .objects
            .get(&reference.id())
            .filter(|entry| entry.type_name() == reference.type_name())
            .map(|entry| entry.value().clone()))
    }

    fn save(&self, object: &DomainObject, validate: bool) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);
        let prepared = self.prepare(object, validate)?;
        self.insert(prepared);
        Ok(())
    }

    fn save_all(&self, objects: &[DomainObject], validate: bool) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);
        let prepared = objects
            .iter()
            .map(|object| self.prepare(object, validate))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = prepared.len(), validate, "saving objects");
        for object in prepared {
            self.insert(object);
        }
        Ok(())
    }

    fn derive_computed_fields(&self, object: &mut DomainObject) {
        let Some(descriptor) = self.schema.type_descriptor(object.type_name()) else {
            return;
        };
        for field in &descriptor.fields {
            if let Some(template) = &field.derived {
                let value = render(template, object);
                object.set(field.name.clone(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_model::SchemaRegistry;
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        let schema = SchemaRegistry::new()
            .with_type(
                TypeDescriptor::new("pet")
                    .with_field(FieldDescriptor::text("name"))
                    .with_field(FieldDescriptor::text("species"))
                    .with_field(FieldDescriptor::boolean("active").with_default_value("true"))
                    .with_field(
                        FieldDescriptor::collection("contacts", "contact")
                            .with_default_children(["contact".to_string()]),
                    )
                    .with_field(FieldDescriptor::text("description").with_derived("{name} ({species})")),
            )
            .with_type(
                TypeDescriptor::new("contact")
                    .with_field(FieldDescriptor::text("kind").with_default_value("HOME")),
            );
        MemoryStore::new(Arc::new(schema))
    }

    #[test]
    fn create_applies_defaults() {
        let store = store();
        let pet = store.create("pet").unwrap();
        assert_eq!(pet.get("active"), Some(&Value::Bool(true)));
        let contacts = pet.children("contacts");
        assert_eq!(contacts.len(), 1);
        match &contacts[0] {
            Value::Object(child) => assert_eq!(child.text("kind"), Some("HOME")),
            other => panic!("unexpected child {other:?}"),
        }
    }

    #[test]
    fn create_unknown_type_is_none() {
        assert!(store().create("dragon").is_none());
    }

    #[test]
    fn validated_save_derives_fields() {
        let store = store();
        let mut pet = store.create("pet").unwrap();
        pet.set("name", "Fido");
        pet.set("species", "CANINE");
        store.save(&pet, true).unwrap();
        let saved = store.get(pet.reference()).unwrap().unwrap();
        assert_eq!(saved.text("description"), Some("Fido (CANINE)"));
    }

    #[test]
    fn unvalidated_save_skips_derivation() {
        let store = store();
        let mut pet = store.create("pet").unwrap();
        pet.set("name", "Fido");
        store.save(&pet, false).unwrap();
        let saved = store.get(pet.reference()).unwrap().unwrap();
        assert_eq!(saved.text("description"), None);
    }

    #[test]
    fn validation_rejects_undeclared_field() {
        let store = store();
        let mut pet = store.create("pet").unwrap();
        pet.set("colour", "brown");
        let err = store.save_all(&[pet], true).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(store.is_empty());
        assert_eq!(store.save_calls(), 1);
    }

    #[test]
    fn query_matches_and_limits() {
        let store = store();
        for name in ["Rex", "Rex", "Fido"] {
            let mut pet = store.create("pet").unwrap();
            pet.set("name", name);
            store.insert(pet);
        }
        assert_eq!(store.query(&Query::new("pet").eq("name", "Rex")).unwrap().len(), 2);
        assert_eq!(
            store
                .query(&Query::new("pet").eq("name", "Rex").limit(1))
                .unwrap()
                .len(),
            1
        );
        assert!(store.query(&Query::new("contact")).unwrap().is_empty());
    }
}
