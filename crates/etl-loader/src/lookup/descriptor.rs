//! Accumulators for generated vocabulary

use indexmap::{IndexMap, IndexSet};

/// Pending `(code, name)` pairs for one lookup type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupDescriptor {
    type_name: String,
    pairs: IndexMap<String, String>,
}

impl LookupDescriptor {
    /// Create empty descriptor
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            pairs: IndexMap::new(),
        }
    }

    /// Lookup type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Record a pair; the first name seen for a code wins
    pub fn add(&mut self, code: impl Into<String>, name: impl Into<String>) -> bool {
        let code = code.into();
        if self.pairs.contains_key(&code) {
            return false;
        }
        self.pairs.insert(code, name.into());
        true
    }

    /// Pending pairs in insertion order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Number of pending pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop pending pairs
    #[inline]
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

/// Pending `(source code, target code)` pairs for one relationship type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRelationshipDescriptor {
    type_name: String,
    source: String,
    target: String,
    pairs: IndexSet<(String, String)>,
}

impl LookupRelationshipDescriptor {
    /// Create empty descriptor linking `source` lookups to `target` lookups
    #[inline]
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            source: source.into(),
            target: target.into(),
            pairs: IndexSet::new(),
        }
    }

    /// Relationship type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Lookup type of relationship sources
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lookup type of relationship targets
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Record a pair, returning false if already pending
    pub fn add(&mut self, source_code: impl Into<String>, target_code: impl Into<String>) -> bool {
        self.pairs.insert((source_code.into(), target_code.into()))
    }

    /// Pending pairs in insertion order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Number of pending pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop pending pairs
    #[inline]
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_name_wins() {
        let mut descriptor = LookupDescriptor::new("lookup.species");
        assert!(descriptor.add("CANINE", "Canine"));
        assert!(!descriptor.add("CANINE", "CANINE"));
        assert_eq!(descriptor.pairs().collect::<Vec<_>>(), vec![("CANINE", "Canine")]);
    }

    #[test]
    fn relationship_pairs_are_a_set() {
        let mut descriptor =
            LookupRelationshipDescriptor::new("lookupRelationship.speciesBreed", "lookup.species", "lookup.breed");
        assert!(descriptor.add("CANINE", "KELPIE"));
        assert!(!descriptor.add("CANINE", "KELPIE"));
        assert!(descriptor.add("FELINE", "MANX"));
        assert_eq!(descriptor.len(), 2);
        descriptor.clear();
        assert!(descriptor.is_empty());
    }
}
