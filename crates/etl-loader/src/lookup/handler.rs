//! Lookup handler
//!
//! Setup registers a descriptor for every mapped field carrying a lookup
//! assertion. Plain lookups come first; target lookups are registered after
//! them because their relationship needs the source field's lookup type.

use super::cache::LookupCache;
use super::descriptor::{LookupDescriptor, LookupRelationshipDescriptor};
use super::get_code;
use crate::error::LoadError;
use crate::listener::ErrorListener;
use etl_model::{
    DomainObject, FieldDescriptor, FieldKey, LookupAssertion, NodePath, ObjectRef, Schema,
    ValueRow,
};
use etl_store::{ObjectStore, Query};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// Counts from one [`LookupHandler::commit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Lookup objects created
    pub lookups_created: usize,
    /// Relationship objects created
    pub relationships_created: usize,
    /// Per-object lookup save failures reported to the listener
    pub soft_failures: usize,
}

/// How a mapped field feeds vocabulary
#[derive(Debug, Clone)]
struct FieldLookup {
    lookup_type: String,
    /// Relationship type and the source field it links from
    relationship: Option<(String, FieldKey)>,
}

/// Accumulates and commits generated lookup vocabulary
pub struct LookupHandler {
    schema: Arc<dyn Schema>,
    store: Arc<dyn ObjectStore>,
    cache: LookupCache,
    listener: Arc<dyn ErrorListener>,
    fields: IndexMap<FieldKey, FieldLookup>,
    lookups: IndexMap<String, LookupDescriptor>,
    relationships: IndexMap<String, LookupRelationshipDescriptor>,
}

impl std::fmt::Debug for LookupHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupHandler")
            .field("fields", &self.fields.len())
            .field("lookups", &self.lookups)
            .field("relationships", &self.relationships)
            .finish_non_exhaustive()
    }
}

impl LookupHandler {
    /// Create handler with no registered fields
    #[must_use]
    pub fn new(
        schema: Arc<dyn Schema>,
        store: Arc<dyn ObjectStore>,
        cache: LookupCache,
        listener: Arc<dyn ErrorListener>,
    ) -> Self {
        Self {
            schema,
            store,
            cache,
            listener,
            fields: IndexMap::new(),
            lookups: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    /// Register descriptors for every lookup-bearing field among `mappings`
    ///
    /// # Errors
    /// - [`LoadError::LookupRelationshipNotFound`] if a target lookup names no relationship
    /// - [`LoadError::TypeNotFound`] if the relationship type is unknown
    /// - [`LoadError::LookupRelationshipTargetNotFound`] if it declares no target lookup type
    /// - [`LoadError::LookupSourceNotFound`] if the sibling source field is not a registered lookup
    pub fn setup(&mut self, mappings: &[NodePath]) -> Result<(), LoadError> {
        let schema = Arc::clone(&self.schema);
        let mut deferred: Vec<(NodePath, FieldKey, &FieldDescriptor)> = Vec::new();

        for path in mappings {
            let leaf = path.leaf();
            let Some(field) = schema.field(leaf.type_name(), leaf.name()) else {
                continue;
            };
            let key = FieldKey::new(leaf.type_name(), field.name.clone());
            match &field.lookup {
                Some(LookupAssertion::Lookup { source }) => self.register(key, source.clone(), None),
                Some(LookupAssertion::TargetLookup { .. }) => {
                    deferred.push((path.clone(), key, field));
                }
                None => {}
            }
        }

        for (path, key, field) in deferred {
            let Some(LookupAssertion::TargetLookup {
                relationship,
                value,
            }) = &field.lookup
            else {
                continue;
            };
            let relationship =
                relationship
                    .clone()
                    .ok_or_else(|| LoadError::LookupRelationshipNotFound {
                        field: key.to_string(),
                    })?;
            let descriptor = schema
                .type_descriptor(&relationship)
                .ok_or_else(|| LoadError::TypeNotFound(relationship.clone()))?;
            let target_type = descriptor
                .field("target")
                .and_then(|target| target.target_types.first())
                .cloned()
                .ok_or_else(|| LoadError::LookupRelationshipTargetNotFound {
                    relationship: relationship.clone(),
                })?;

            let sibling = path.sibling(value.trim_start_matches('/'));
            let source_key = schema
                .field(sibling.leaf().type_name(), value)
                .map(|source| FieldKey::new(sibling.leaf().type_name(), source.name.clone()))
                .unwrap_or_else(|| FieldKey::from_path(&sibling));
            let source_type = self
                .fields
                .get(&source_key)
                .map(|source| source.lookup_type.clone())
                .ok_or_else(|| LoadError::LookupSourceNotFound {
                    field: key.to_string(),
                    source_path: value.clone(),
                })?;

            self.relationships
                .entry(relationship.clone())
                .or_insert_with(|| {
                    LookupRelationshipDescriptor::new(&relationship, source_type, &target_type)
                });
            self.register(key, target_type, Some((relationship, source_key)));
        }

        debug!(
            fields = self.fields.len(),
            lookups = self.lookups.len(),
            relationships = self.relationships.len(),
            "registered lookup fields"
        );
        Ok(())
    }

    fn register(
        &mut self,
        key: FieldKey,
        lookup_type: String,
        relationship: Option<(String, FieldKey)>,
    ) {
        self.lookups
            .entry(lookup_type.clone())
            .or_insert_with(|| LookupDescriptor::new(&lookup_type));
        self.fields.insert(
            key,
            FieldLookup {
                lookup_type,
                relationship,
            },
        );
    }

    /// Whether `(type, field)` feeds generated vocabulary
    #[must_use]
    pub fn is_lookup_field(&self, type_name: &str, field: &str) -> bool {
        self.fields.contains_key(&FieldKey::new(type_name, field))
    }

    /// Record the lookup pairs named by one record's rows
    pub fn add(&mut self, rows: &[ValueRow]) {
        for row in rows {
            let Some(key) = self.key_of(row) else {
                continue;
            };
            let Some(field) = self.fields.get(&key) else {
                continue;
            };
            if row.value.trim().is_empty() {
                continue;
            }
            let code = get_code(&row.value);
            if let Some(descriptor) = self.lookups.get_mut(&field.lookup_type) {
                descriptor.add(code.clone(), row.value.clone());
            }

            let Some((relationship, source_key)) = &field.relationship else {
                continue;
            };
            let source_row = rows.iter().find(|candidate| {
                !candidate.value.trim().is_empty() && self.key_of(candidate).as_ref() == Some(source_key)
            });
            if let Some(source_row) = source_row {
                if let Some(descriptor) = self.relationships.get_mut(relationship) {
                    descriptor.add(get_code(&source_row.value), code);
                }
            }
        }
    }

    fn key_of(&self, row: &ValueRow) -> Option<FieldKey> {
        self.schema
            .field(&row.type_name, &row.field_path)
            .map(|field| FieldKey::new(row.type_name.clone(), field.name.clone()))
    }

    /// Registered lookup descriptors
    pub fn lookups(&self) -> impl Iterator<Item = &LookupDescriptor> {
        self.lookups.values()
    }

    /// Registered relationship descriptors
    pub fn relationships(&self) -> impl Iterator<Item = &LookupRelationshipDescriptor> {
        self.relationships.values()
    }

    /// Cache shared with query-time lookups
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Create missing lookups, then missing relationships, and clear pending pairs
    ///
    /// A failed lookup batch save falls back to saving each lookup alone;
    /// individual failures go to the error listener. Every other failure aborts.
    ///
    /// # Errors
    /// - [`LoadError::TypeNotFound`] if a lookup or relationship type cannot be instantiated
    /// - [`LoadError::LookupNotFound`] if a relationship end cannot be found
    /// - [`LoadError::Store`] on query or relationship save failures
    pub fn commit(&mut self) -> Result<CommitSummary, LoadError> {
        let span = info_span!("lookup_commit");
        let _guard = span.enter();
        let mut summary = CommitSummary::default();

        for descriptor in self.lookups.values() {
            self.commit_lookups(descriptor, &mut summary)?;
        }
        for descriptor in self.relationships.values() {
            summary.relationships_created += self.commit_relationships(descriptor)?;
        }

        self.lookups.values_mut().for_each(LookupDescriptor::clear);
        self.relationships
            .values_mut()
            .for_each(LookupRelationshipDescriptor::clear);

        info!(
            lookups = summary.lookups_created,
            relationships = summary.relationships_created,
            soft_failures = summary.soft_failures,
            "committed lookups"
        );
        Ok(summary)
    }

    fn commit_lookups(
        &self,
        descriptor: &LookupDescriptor,
        summary: &mut CommitSummary,
    ) -> Result<(), LoadError> {
        if descriptor.is_empty() {
            return Ok(());
        }
        let type_name = descriptor.type_name();
        let existing: HashSet<String> = self
            .store
            .query(&Query::new(type_name))?
            .into_iter()
            .filter_map(|object| {
                let code = object.text("code")?.to_string();
                self.cache.add(type_name, &code, object.reference().clone());
                Some(code)
            })
            .collect();

        let mut fresh: Vec<DomainObject> = Vec::new();
        for (code, name) in descriptor.pairs() {
            if existing.contains(code) {
                continue;
            }
            let mut lookup = self
                .store
                .create(type_name)
                .ok_or_else(|| LoadError::TypeNotFound(type_name.to_string()))?;
            lookup.set("code", code);
            lookup.set("name", name);
            fresh.push(lookup);
        }
        if fresh.is_empty() {
            return Ok(());
        }

        match self.store.save_all(&fresh, true) {
            Ok(()) => {
                for lookup in &fresh {
                    self.cache_lookup(lookup);
                }
                summary.lookups_created += fresh.len();
            }
            Err(error) => {
                warn!(%type_name, %error, "lookup batch save failed, saving individually");
                for lookup in &fresh {
                    match self.store.save(lookup, true) {
                        Ok(()) => {
                            self.cache_lookup(lookup);
                            summary.lookups_created += 1;
                        }
                        Err(error) => {
                            summary.soft_failures += 1;
                            let identifier =
                                format!("{type_name}#{}", lookup.text("code").unwrap_or_default());
                            self.listener.on_error(&identifier, &LoadError::Store(error));
                        }
                    }
                }
            }
        }
        debug!(%type_name, created = fresh.len(), "created lookups");
        Ok(())
    }

    fn cache_lookup(&self, lookup: &DomainObject) {
        if let Some(code) = lookup.text("code") {
            self.cache
                .add(lookup.type_name(), code, lookup.reference().clone());
        }
    }

    fn commit_relationships(
        &self,
        descriptor: &LookupRelationshipDescriptor,
    ) -> Result<usize, LoadError> {
        let type_name = descriptor.type_name();
        let mut pending: Vec<DomainObject> = Vec::new();
        let mut queued: HashSet<(ObjectRef, ObjectRef)> = HashSet::new();

        for (source_code, target_code) in descriptor.pairs() {
            let source = self.require(descriptor.source(), source_code)?;
            let target = self.require(descriptor.target(), target_code)?;
            if queued.contains(&(source.clone(), target.clone()))
                || self.cache.relationship_exists(type_name, &source, &target)?
            {
                continue;
            }
            let mut relationship = self
                .store
                .create(type_name)
                .ok_or_else(|| LoadError::TypeNotFound(type_name.to_string()))?;
            relationship.set("source", source.clone());
            relationship.set("target", target.clone());
            pending.push(relationship);
            queued.insert((source, target));
        }
        if pending.is_empty() {
            return Ok(0);
        }

        self.store.save_all(&pending, true)?;
        for (source, target) in &queued {
            self.cache.add_relationship(type_name, source, target);
        }
        debug!(%type_name, created = pending.len(), "created lookup relationships");
        Ok(pending.len())
    }

    fn require(&self, type_name: &str, code: &str) -> Result<ObjectRef, LoadError> {
        self.cache
            .get(type_name, code)?
            .ok_or_else(|| LoadError::LookupNotFound {
                type_name: type_name.to_string(),
                code: code.to_string(),
            })
    }

    /// Drop every descriptor and registration
    pub fn close(&mut self) {
        self.fields.clear();
        self.lookups.clear();
        self.relationships.clear();
    }
}
