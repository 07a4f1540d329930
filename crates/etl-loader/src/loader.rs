//! Graph loader
//!
//! Rows are grouped per record and turned into domain objects. Reference
//! fields may name records not yet seen; those are loaded on demand from the
//! row source. Loading is driven by an explicit work stack instead of call
//! recursion, so long reference chains cannot exhaust the thread stack.
//!
//! # Completeness
//!
//! `depth` counts groups created but not yet populated. Objects stay in
//! `incomplete` until the outermost group finishes (`depth` back to zero), then
//! move to `batch`. The batch is saved once it reaches `batch_size`, and once
//! more when the row stream ends.

use crate::coerce::coerce;
use crate::config::LoaderConfig;
use crate::cursor::RowCursor;
use crate::error::LoadError;
use crate::listener::{ErrorListener, LoggingListener};
use crate::lookup::{LookupCache, LookupHandler};
use etl_model::{
    DomainObject, FieldKind, ObjectRef, Reference, Schema, Value, ValueRow, WILDCARD,
};
use etl_store::{ObjectStore, Query, RowSource};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// Outcome of [`Loader::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Distinct records created
    pub created: usize,
    /// Batch save calls issued
    pub batches_flushed: usize,
    /// Lookup objects created on commit
    pub lookups_created: usize,
    /// Lookup relationships created on commit
    pub relationships_created: usize,
    /// Lookup saves reported to the error listener
    pub soft_failures: usize,
}

/// Created object awaiting population
#[derive(Debug)]
struct PendingGroup {
    reference: ObjectRef,
    rows: Vec<ValueRow>,
}

/// Builds domain objects from a row source and saves them in batches
///
/// A loader owns its working state exclusively; it is not meant to be shared
/// across concurrent loads.
pub struct Loader {
    source: Arc<dyn RowSource>,
    store: Arc<dyn ObjectStore>,
    schema: Arc<dyn Schema>,
    config: LoaderConfig,
    listener: Arc<dyn ErrorListener>,
    lookups: Option<LookupHandler>,

    mapped: IndexMap<String, ObjectRef>,
    incomplete: IndexMap<ObjectRef, DomainObject>,
    batch: IndexMap<ObjectRef, DomainObject>,
    reference_cache: HashMap<String, ObjectRef>,
    pending: Vec<PendingGroup>,
    depth: usize,

    created: usize,
    batches_flushed: usize,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .field("mapped", &self.mapped.len())
            .field("incomplete", &self.incomplete.len())
            .field("batch", &self.batch.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create loader
    ///
    /// # Errors
    /// Returns [`LoadError::Config`] if `config` is invalid
    pub fn new(
        source: Arc<dyn RowSource>,
        store: Arc<dyn ObjectStore>,
        schema: Arc<dyn Schema>,
        config: LoaderConfig,
    ) -> Result<Self, LoadError> {
        config.check()?;
        Ok(Self {
            source,
            store,
            schema,
            config,
            listener: Arc::new(LoggingListener),
            lookups: None,
            mapped: IndexMap::new(),
            incomplete: IndexMap::new(),
            batch: IndexMap::new(),
            reference_cache: HashMap::new(),
            pending: Vec::new(),
            depth: 0,
            created: 0,
            batches_flushed: 0,
        })
    }

    /// With listener for soft lookup save failures
    #[inline]
    #[must_use]
    pub fn with_error_listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Record id to object reference for every record created so far
    #[inline]
    #[must_use]
    pub fn objects(&self) -> &IndexMap<String, ObjectRef> {
        &self.mapped
    }

    /// Lookup handler, once `load` has set it up
    #[inline]
    #[must_use]
    pub fn lookups(&self) -> Option<&LookupHandler> {
        self.lookups.as_ref()
    }

    /// Load every row, flush remaining objects and commit generated lookups
    ///
    /// # Errors
    /// Any [`LoadError`] aborts the run. Batches already flushed stay saved.
    pub fn load(&mut self) -> Result<LoadSummary, LoadError> {
        let span = info_span!("load", batch_size = self.config.batch_size);
        let _guard = span.enter();
        info!("loading rows");

        if self.config.generate_lookups && self.lookups.is_none() {
            self.lookups = Some(self.setup_lookups()?);
        }

        let created_before = self.created;
        let flushed_before = self.batches_flushed;
        let mut cursor = RowCursor::new(Arc::clone(&self.source), self.config.page_size);
        let mut group: Vec<ValueRow> = Vec::new();

        while let Some(row) = cursor.next_row()? {
            if group.first().is_some_and(|first| first.record_id != row.record_id) {
                self.load_group(std::mem::take(&mut group))?;
            }
            group.push(row);
        }
        if !group.is_empty() {
            self.load_group(group)?;
        }
        self.flush()?;

        let mut summary = LoadSummary {
            created: self.created - created_before,
            batches_flushed: self.batches_flushed - flushed_before,
            ..LoadSummary::default()
        };
        if let Some(lookups) = self.lookups.as_mut() {
            let commit = lookups.commit()?;
            summary.lookups_created = commit.lookups_created;
            summary.relationships_created = commit.relationships_created;
            summary.soft_failures = commit.soft_failures;
        }

        info!(
            rows = cursor.rows_read(),
            created = summary.created,
            batches = summary.batches_flushed,
            "load complete"
        );
        Ok(summary)
    }

    fn setup_lookups(&self) -> Result<LookupHandler, LoadError> {
        let cache = LookupCache::new(Arc::clone(&self.store), self.config.lookup_cache_capacity);
        let mut handler = LookupHandler::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.store),
            cache,
            Arc::clone(&self.listener),
        );
        let mappings: Vec<_> = self
            .source
            .mapped_fields()?
            .iter()
            .map(etl_model::FieldKey::to_path)
            .collect();
        handler.setup(&mappings)?;
        Ok(handler)
    }

    /// Load one top-level group and everything it references
    ///
    /// On failure every object created for this group is discarded and the
    /// loader is left ready for the next group.
    ///
    /// # Errors
    /// Returns [`LoadError::TypeMismatch`], [`LoadError::TypeNotFound`] or any
    /// population error
    pub fn load_group(&mut self, rows: Vec<ValueRow>) -> Result<ObjectRef, LoadError> {
        self.settle(|loader| loader.enqueue(rows))
    }

    /// Run an entry step, populate everything it queued, then complete at depth zero
    fn settle(
        &mut self,
        entry: impl FnOnce(&mut Self) -> Result<ObjectRef, LoadError>,
    ) -> Result<ObjectRef, LoadError> {
        let outcome = match entry(self) {
            Ok(reference) => self.drain().map(|()| reference),
            Err(error) => Err(error),
        };
        match outcome {
            Ok(reference) => {
                if self.depth == 0 {
                    self.complete()?;
                }
                Ok(reference)
            }
            Err(error) => {
                self.abandon();
                Err(error)
            }
        }
    }

    /// Drop the objects of a failed group and reset completeness tracking
    fn abandon(&mut self) {
        let dropped: HashSet<ObjectRef> = self
            .incomplete
            .drain(..)
            .map(|(reference, _)| reference)
            .collect();
        self.pending.clear();
        self.depth = 0;
        self.mapped.retain(|_, reference| !dropped.contains(reference));
        self.reference_cache
            .retain(|_, reference| !dropped.contains(reference));
        self.created = self.created.saturating_sub(dropped.len());
        warn!(discarded = dropped.len(), "abandoned failed group");
    }

    /// Map a group to its object, creating it and queueing population if new
    fn enqueue(&mut self, rows: Vec<ValueRow>) -> Result<ObjectRef, LoadError> {
        let first = rows
            .first()
            .ok_or_else(|| LoadError::ObjectNotFound("empty row group".into()))?;
        let record_id = first.record_id.clone();
        let type_name = first.type_name.clone();
        if let Some(other) = rows.iter().find(|row| row.type_name != type_name) {
            return Err(LoadError::TypeMismatch {
                record_id,
                expected: type_name,
                found: other.type_name.clone(),
            });
        }

        if let Some(existing) = self.mapped.get(&record_id) {
            if existing.type_name() != type_name {
                return Err(LoadError::TypeMismatch {
                    record_id,
                    expected: existing.type_name().to_string(),
                    found: type_name,
                });
            }
            return Ok(existing.clone());
        }

        let object = self.create(&type_name, &rows)?;
        let reference = object.reference().clone();
        self.mapped.insert(record_id.clone(), reference.clone());
        self.incomplete.insert(reference.clone(), object);
        self.pending.push(PendingGroup {
            reference: reference.clone(),
            rows,
        });
        self.depth += 1;
        self.created += 1;
        debug!(%record_id, %type_name, depth = self.depth, "created object");
        Ok(reference)
    }

    fn create(&self, type_name: &str, rows: &[ValueRow]) -> Result<DomainObject, LoadError> {
        let mut object = self
            .store
            .create(type_name)
            .ok_or_else(|| LoadError::TypeNotFound(type_name.to_string()))?;
        if rows.iter().any(|row| row.remove_defaults) {
            if let Some(descriptor) = self.schema.type_descriptor(type_name) {
                for field in descriptor.collection_fields() {
                    object.clear_collection(&field.name);
                }
            }
        }
        Ok(object)
    }

    fn drain(&mut self) -> Result<(), LoadError> {
        while let Some(group) = self.pending.pop() {
            self.populate(group)?;
            self.depth -= 1;
        }
        Ok(())
    }

    fn populate(&mut self, group: PendingGroup) -> Result<(), LoadError> {
        let mut rows = group.rows;
        rows.sort_by_key(|row| row.index.unwrap_or(0));
        for row in &rows {
            self.set_value(&group.reference, row)?;
        }
        if let Some(lookups) = self.lookups.as_mut() {
            lookups.add(&rows);
        }
        Ok(())
    }

    fn set_value(&mut self, target: &ObjectRef, row: &ValueRow) -> Result<(), LoadError> {
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(target.type_name(), &row.field_path)
            .ok_or_else(|| LoadError::invalid_field(target.type_name(), &row.field_path))?;

        let value = if field.kind == FieldKind::Reference {
            let reference = self.resolve_reference(&row.value)?;
            if field.collection && !self.object_exists(&reference)? {
                return Err(LoadError::ObjectNotFound(reference.to_string()));
            }
            Value::Ref(reference)
        } else {
            coerce(field, &row.value, self.config.generate_lookups)?
        };

        let object = self
            .incomplete
            .get_mut(target)
            .ok_or_else(|| LoadError::ObjectNotFound(target.to_string()))?;
        if field.collection {
            object.push(&field.name, value);
        } else {
            object.set(field.name.clone(), value);
        }
        Ok(())
    }

    /// Resolve a reference string, loading the referenced record if needed
    ///
    /// A record loaded this way is fully populated before returning.
    ///
    /// # Errors
    /// - [`LoadError::InvalidReference`] on malformed input
    /// - [`LoadError::ObjectNotFound`] if nothing matches
    /// - [`LoadError::AmbiguousReference`] if several candidates match
    pub fn load_reference(&mut self, text: &str) -> Result<ObjectRef, LoadError> {
        self.settle(|loader| loader.resolve_reference(text))
    }

    fn resolve_reference(&mut self, text: &str) -> Result<ObjectRef, LoadError> {
        if let Some(cached) = self.reference_cache.get(text) {
            return Ok(cached.clone());
        }
        let reference: Reference = text
            .parse()
            .map_err(|_| LoadError::InvalidReference(text.to_string()))?;

        let resolved = match &reference {
            Reference::ById { record_id } => self.resolve_id(text, record_id)?,
            Reference::ByLegacyId {
                type_name,
                legacy_id,
            } => self.resolve_legacy_id(text, type_name, legacy_id)?,
            Reference::ByQuery {
                type_name,
                field,
                value,
            } => self.resolve_query(text, type_name, field, value)?,
        };
        debug!(reference = %text, resolved = %resolved, "resolved reference");

        self.reference_cache
            .insert(text.to_string(), resolved.clone());
        let canonical = reference.to_string();
        if canonical != text {
            self.reference_cache.insert(canonical, resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_id(&mut self, text: &str, record_id: &str) -> Result<ObjectRef, LoadError> {
        if let Some(existing) = self.mapped.get(record_id) {
            return Ok(existing.clone());
        }
        let rows = self.source.rows_for_record(record_id)?;
        if rows.is_empty() {
            return Err(LoadError::ObjectNotFound(text.to_string()));
        }
        self.enqueue(rows)
    }

    fn resolve_legacy_id(
        &mut self,
        text: &str,
        type_name: &str,
        legacy_id: &str,
    ) -> Result<ObjectRef, LoadError> {
        let wildcard = type_name.contains(WILDCARD);
        if wildcard {
            let hits: Vec<&ObjectRef> = self
                .schema
                .expand(type_name)
                .iter()
                .filter_map(|concrete| {
                    self.reference_cache
                        .get(&Reference::by_legacy_id(concrete.as_str(), legacy_id).to_string())
                })
                .collect();
            match hits.as_slice() {
                [] => {}
                [single] => return Ok((*single).clone()),
                _ => return Err(LoadError::AmbiguousReference(text.to_string())),
            }
        }

        let rows = self.source.rows_for_legacy_id(type_name, legacy_id)?;
        let records: HashSet<&str> = rows.iter().map(|row| row.record_id.as_str()).collect();
        match records.len() {
            0 => return Err(LoadError::ObjectNotFound(text.to_string())),
            1 => {}
            _ => return Err(LoadError::AmbiguousReference(text.to_string())),
        }

        let resolved = self.enqueue(rows)?;
        if wildcard {
            let concrete = Reference::by_legacy_id(resolved.type_name(), legacy_id).to_string();
            self.reference_cache.insert(concrete, resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_query(
        &self,
        text: &str,
        type_name: &str,
        field: &str,
        literal: &str,
    ) -> Result<ObjectRef, LoadError> {
        let descriptor = self
            .schema
            .type_descriptor(type_name)
            .ok_or_else(|| LoadError::TypeNotFound(type_name.to_string()))?;
        let field = descriptor
            .field(field)
            .ok_or_else(|| LoadError::invalid_field(type_name, field))?;
        let value = coerce(field, literal, self.config.generate_lookups)?;

        let query = Query::new(type_name).eq(field.name.clone(), value).limit(2);
        let matches = self.store.query(&query)?;
        match matches.as_slice() {
            [] => Err(LoadError::ObjectNotFound(text.to_string())),
            [single] => Ok(single.reference().clone()),
            _ => Err(LoadError::AmbiguousReference(text.to_string())),
        }
    }

    /// Object by reference: in-progress objects first, then the batch, then the store
    ///
    /// # Errors
    /// Returns [`LoadError::ObjectNotFound`] if no tier holds it
    pub fn get_object(&self, reference: &ObjectRef) -> Result<DomainObject, LoadError> {
        if let Some(object) = self.incomplete.get(reference) {
            return Ok(object.clone());
        }
        if let Some(object) = self.batch.get(reference) {
            return Ok(object.clone());
        }
        self.store
            .get(reference)?
            .ok_or_else(|| LoadError::ObjectNotFound(reference.to_string()))
    }

    fn object_exists(&self, reference: &ObjectRef) -> Result<bool, LoadError> {
        if self.incomplete.contains_key(reference) || self.batch.contains_key(reference) {
            return Ok(true);
        }
        Ok(self.store.get(reference)?.is_some())
    }

    /// Object created for a record id
    ///
    /// # Errors
    /// Returns [`LoadError::ObjectNotFound`] if the record was not loaded
    pub fn get_record(&self, record_id: &str) -> Result<DomainObject, LoadError> {
        let reference = self
            .mapped
            .get(record_id)
            .ok_or_else(|| LoadError::ObjectNotFound(format!("#{record_id}")))?;
        self.get_object(reference)
    }

    /// Move completed objects to the batch, flushing it once full
    fn complete(&mut self) -> Result<(), LoadError> {
        self.batch.extend(self.incomplete.drain(..));
        if self.batch.len() >= self.config.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LoadError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let mut objects: Vec<DomainObject> = self.batch.drain(..).map(|(_, object)| object).collect();
        if !self.config.validate {
            for object in &mut objects {
                self.store.derive_computed_fields(object);
            }
        }
        self.store.save_all(&objects, self.config.validate)?;
        self.batches_flushed += 1;
        debug!(count = objects.len(), "flushed batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_model::{FieldDescriptor, SchemaRegistry, TypeDescriptor};
    use etl_store::{MemoryRowSource, MemoryStore};

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::new()
                .with_type(TypeDescriptor::new("person").with_field(FieldDescriptor::text("name")))
                .with_type(
                    TypeDescriptor::new("pet")
                        .with_field(FieldDescriptor::text("name"))
                        .with_field(FieldDescriptor::reference("owner", "person")),
                ),
        )
    }

    fn loader(rows: Vec<ValueRow>) -> (Loader, Arc<MemoryStore>) {
        let schema = schema();
        let store = Arc::new(MemoryStore::new(schema.clone()));
        let source = Arc::new(MemoryRowSource::new(rows));
        let loader = Loader::new(source, store.clone(), schema, LoaderConfig::default()).unwrap();
        (loader, store)
    }

    #[test]
    fn invalid_config_rejected() {
        let schema = schema();
        let store = Arc::new(MemoryStore::new(schema.clone()));
        let source = Arc::new(MemoryRowSource::default());
        let result = Loader::new(source, store, schema, LoaderConfig::new().with_page_size(0));
        assert!(matches!(result, Err(LoadError::Config(_))));
    }

    #[test]
    fn nothing_saved_while_depth_positive() {
        let (mut loader, store) = loader(vec![
            ValueRow::new("obj1", "pet", "name", "Fido"),
            ValueRow::reference("obj1", "pet", "owner", "#obj2"),
            ValueRow::new("obj2", "person", "name", "Jane"),
        ]);
        let rows = vec![
            ValueRow::new("obj1", "pet", "name", "Fido"),
            ValueRow::reference("obj1", "pet", "owner", "#obj2"),
        ];
        loader.enqueue(rows).unwrap();
        assert_eq!(loader.depth, 1);
        let pet = loader.pending.pop().unwrap();
        loader.populate(pet).unwrap();
        assert_eq!(loader.depth, 2);
        assert_eq!(loader.incomplete.len(), 2);
        assert!(loader.batch.is_empty());
        assert_eq!(store.save_calls(), 0);
    }

    #[test]
    fn reference_cache_serves_repeat_lookups() {
        let (mut loader, _) = loader(vec![ValueRow::new("obj2", "person", "name", "Jane")]);
        let first = loader.load_reference("#obj2").unwrap();
        let second = loader.load_reference("#obj2").unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.objects().len(), 1);
    }

    #[test]
    fn get_object_prefers_incomplete() {
        let (mut loader, _) = loader(Vec::new());
        let reference = loader
            .enqueue(vec![ValueRow::new("obj2", "person", "name", "Jane")])
            .unwrap();
        assert!(loader.incomplete.contains_key(&reference));
        assert_eq!(loader.get_object(&reference).unwrap().reference(), &reference);
    }

    #[test]
    fn failed_group_releases_depth() {
        let (mut loader, store) = loader(vec![ValueRow::new("obj2", "person", "name", "Jane")]);
        let err = loader
            .load_group(vec![
                ValueRow::reference("obj1", "pet", "owner", "#obj2"),
                ValueRow::reference("obj1", "pet", "owner", "#missing"),
            ])
            .unwrap_err();
        assert!(matches!(err, LoadError::ObjectNotFound(_)));
        assert_eq!(loader.depth, 0);
        assert!(loader.pending.is_empty());
        assert!(loader.incomplete.is_empty());
        assert!(loader.objects().is_empty());
        assert!(!loader.reference_cache.contains_key("#obj2"));

        let summary = loader.load().unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_object_missing_everywhere() {
        let (loader, _) = loader(Vec::new());
        let err = loader
            .get_object(&ObjectRef::generate("person"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ObjectNotFound(_)));
    }

    #[test]
    fn invalid_field_aborts() {
        let (mut loader, _) = loader(vec![ValueRow::new("obj1", "pet", "colour", "brown")]);
        assert!(matches!(
            loader.load(),
            Err(LoadError::InvalidField { .. })
        ));
    }
}
