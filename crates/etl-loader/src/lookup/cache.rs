//! Read-through cache over persisted vocabulary
//!
//! Backed by `moka`'s synchronous cache, which is internally synchronized, so a
//! [`LookupCache`] can be shared by handle across threads.

use crate::error::LoadError;
use etl_model::ObjectRef;
use etl_store::{ObjectStore, Query};
use moka::sync::Cache;
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Cached lookups
    pub lookups: u64,
    /// Cached relationships
    pub relationships: u64,
}

type RelationshipKey = (String, ObjectRef, ObjectRef);

/// Lookup cache keyed by `(lookup type, code)` and `(relationship type, source, target)`
#[derive(Clone)]
pub struct LookupCache {
    store: Arc<dyn ObjectStore>,
    lookups: Cache<(String, String), ObjectRef>,
    relationships: Cache<RelationshipKey, ()>,
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl LookupCache {
    /// Create cache over a store, holding at most `max_capacity` entries of each kind
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, max_capacity: u64) -> Self {
        Self {
            store,
            lookups: Cache::new(max_capacity),
            relationships: Cache::new(max_capacity),
        }
    }

    /// Lookup with `code`, reading through to the store on a miss
    ///
    /// # Errors
    /// Propagates store query failures
    pub fn get(&self, type_name: &str, code: &str) -> Result<Option<ObjectRef>, LoadError> {
        let key = (type_name.to_string(), code.to_string());
        if let Some(found) = self.lookups.get(&key) {
            return Ok(Some(found));
        }
        let found = self
            .store
            .query(&Query::new(type_name).eq("code", code).limit(1))?
            .into_iter()
            .next()
            .map(|object| object.reference().clone());
        if let Some(reference) = &found {
            self.lookups.insert(key, reference.clone());
        }
        Ok(found)
    }

    /// Whether a lookup with `code` exists
    ///
    /// # Errors
    /// Propagates store query failures
    pub fn exists(&self, type_name: &str, code: &str) -> Result<bool, LoadError> {
        Ok(self.get(type_name, code)?.is_some())
    }

    /// Cache a lookup
    pub fn add(&self, type_name: &str, code: &str, reference: ObjectRef) {
        self.lookups
            .insert((type_name.to_string(), code.to_string()), reference);
    }

    /// Whether a relationship `source -> target` exists, reading through on a miss
    ///
    /// # Errors
    /// Propagates store query failures
    pub fn relationship_exists(
        &self,
        type_name: &str,
        source: &ObjectRef,
        target: &ObjectRef,
    ) -> Result<bool, LoadError> {
        let key = (type_name.to_string(), source.clone(), target.clone());
        if self.relationships.contains_key(&key) {
            return Ok(true);
        }
        let query = Query::new(type_name)
            .eq("source", source.clone())
            .eq("target", target.clone())
            .limit(1);
        let exists = !self.store.query(&query)?.is_empty();
        if exists {
            self.relationships.insert(key, ());
        }
        Ok(exists)
    }

    /// Cache a relationship
    pub fn add_relationship(&self, type_name: &str, source: &ObjectRef, target: &ObjectRef) {
        self.relationships
            .insert((type_name.to_string(), source.clone(), target.clone()), ());
    }

    /// Drop every cached entry
    #[inline]
    pub fn invalidate_all(&self) {
        self.lookups.invalidate_all();
        self.relationships.invalidate_all();
    }

    /// Approximate entry counts
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.entry_count(),
            relationships: self.relationships.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_model::{FieldDescriptor, SchemaRegistry, TypeDescriptor};
    use etl_store::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        let schema = SchemaRegistry::new()
            .with_type(
                TypeDescriptor::new("lookup.species")
                    .with_field(FieldDescriptor::text("code"))
                    .with_field(FieldDescriptor::text("name")),
            )
            .with_type(
                TypeDescriptor::new("lookupRelationship.speciesBreed")
                    .with_field(FieldDescriptor::reference("source", "lookup.species"))
                    .with_field(FieldDescriptor::reference("target", "lookup.breed")),
            );
        Arc::new(MemoryStore::new(Arc::new(schema)))
    }

    #[test]
    fn reads_through_to_store() {
        let store = store();
        let mut canine = store.create("lookup.species").unwrap();
        canine.set("code", "CANINE");
        store.insert(canine.clone());

        let cache = LookupCache::new(store.clone(), 100);
        assert_eq!(
            cache.get("lookup.species", "CANINE").unwrap(),
            Some(canine.reference().clone())
        );
        assert!(!cache.exists("lookup.species", "FELINE").unwrap());
    }

    #[test]
    fn added_entries_hit_without_store() {
        let cache = LookupCache::new(store(), 100);
        let reference = ObjectRef::generate("lookup.species");
        cache.add("lookup.species", "FELINE", reference.clone());
        assert_eq!(cache.get("lookup.species", "FELINE").unwrap(), Some(reference));

        cache.invalidate_all();
        assert!(cache.get("lookup.species", "FELINE").unwrap().is_none());
    }

    #[test]
    fn relationships_cached_and_queried() {
        let store = store();
        let cache = LookupCache::new(store.clone(), 100);
        let source = ObjectRef::generate("lookup.species");
        let target = ObjectRef::generate("lookup.breed");
        let kind = "lookupRelationship.speciesBreed";
        assert!(!cache.relationship_exists(kind, &source, &target).unwrap());

        let mut link = store.create(kind).unwrap();
        link.set("source", source.clone());
        link.set("target", target.clone());
        store.insert(link);
        assert!(cache.relationship_exists(kind, &source, &target).unwrap());

        let other = ObjectRef::generate("lookup.breed");
        cache.add_relationship(kind, &source, &other);
        assert!(cache.relationship_exists(kind, &source, &other).unwrap());
    }
}
