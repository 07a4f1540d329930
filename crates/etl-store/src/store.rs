//! Object store seam

use crate::error::StoreError;
use etl_model::{DomainObject, ObjectRef, Value};

/// Equality query over one type
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    type_name: String,
    constraints: Vec<(String, Value)>,
    max_results: Option<usize>,
}

impl Query {
    /// Query all objects of a type
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            constraints: Vec::new(),
            max_results: None,
        }
    }

    /// Add `field == value` constraint
    #[inline]
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.push((field.into(), value.into()));
        self
    }

    /// Cap the number of results
    #[inline]
    #[must_use]
    pub fn limit(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Queried type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Equality constraints
    #[inline]
    #[must_use]
    pub fn constraints(&self) -> &[(String, Value)] {
        &self.constraints
    }

    /// Result cap
    #[inline]
    #[must_use]
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    /// Whether an object satisfies every constraint
    #[must_use]
    pub fn matches(&self, object: &DomainObject) -> bool {
        object.type_name() == self.type_name
            && self
                .constraints
                .iter()
                .all(|(field, value)| object.get(field) == Some(value))
    }
}

/// Type factory and persistence collaborator
///
/// All calls are synchronous and blocking.
pub trait ObjectStore: Send + Sync {
    /// Instantiate a named type, applying instantiation defaults; `None` if unknown
    fn create(&self, type_name: &str) -> Option<DomainObject>;

    /// Objects matching an equality query
    ///
    /// # Errors
    /// Returns [`StoreError`] on backend failure
    fn query(&self, query: &Query) -> Result<Vec<DomainObject>, StoreError>;

    /// Persisted object by identity
    ///
    /// # Errors
    /// Returns [`StoreError`] on backend failure
    fn get(&self, reference: &ObjectRef) -> Result<Option<DomainObject>, StoreError>;

    /// Save one object
    ///
    /// # Errors
    /// Returns [`StoreError`] if validation or the backend fails
    fn save(&self, object: &DomainObject, validate: bool) -> Result<(), StoreError>;

    /// Save a collection as one operation; nothing is saved on failure
    ///
    /// # Errors
    /// Returns [`StoreError`] if any object fails validation or the backend fails
    fn save_all(&self, objects: &[DomainObject], validate: bool) -> Result<(), StoreError>;

    /// Recalculate computed fields (validation does this implicitly)
    fn derive_computed_fields(&self, object: &mut DomainObject);
}
