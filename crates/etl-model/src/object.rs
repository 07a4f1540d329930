//! Domain objects built by the loader
//!
//! Provides [`DomainObject`], the field-bag instance created by a type factory,
//! [`ObjectRef`] for its identity, and [`Value`] for field contents.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Store-assigned object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Generate a fresh identifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a domain object: its type name plus store id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    type_name: String,
    id: ObjectId,
}

impl ObjectRef {
    /// Create reference with explicit id
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }

    /// Create reference with a freshly generated id
    #[inline]
    #[must_use]
    pub fn generate(type_name: impl Into<String>) -> Self {
        Self::new(type_name, ObjectId::new())
    }

    /// Type name of the referenced object
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Store id of the referenced object
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// Field value held by a [`DomainObject`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// No value
    Null,
    /// Text, including lookup codes
    Text(String),
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Timestamp
    Date(NaiveDateTime),
    /// Pointer to another object
    Ref(ObjectRef),
    /// Embedded child object (populated by instantiation defaults)
    Object(Box<DomainObject>),
    /// Collection contents
    List(Vec<Value>),
}

impl Value {
    /// Text content, if this is a text value
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Object reference, if this is a reference value
    #[inline]
    #[must_use]
    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Collection elements, if this is a list
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is [`Value::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Object(o) => write!(f, "{}", o.reference()),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Self::Ref(r)
    }
}

/// Instance of a named type: an identity plus an ordered bag of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainObject {
    reference: ObjectRef,
    #[serde(default)]
    fields: IndexMap<String, Value>,
}

impl DomainObject {
    /// Create empty object with the given identity
    #[inline]
    #[must_use]
    pub fn new(reference: ObjectRef) -> Self {
        Self {
            reference,
            fields: IndexMap::new(),
        }
    }

    /// Object identity
    #[inline]
    #[must_use]
    pub fn reference(&self) -> &ObjectRef {
        &self.reference
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.reference.type_name()
    }

    /// Field value, if set
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text field value, if set and textual
    #[inline]
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    /// Set a field, replacing any previous value
    #[inline]
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Append to a collection field, converting a missing or scalar field into a list
    pub fn push(&mut self, field: &str, value: Value) {
        match self.fields.get_mut(field) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) if !existing.is_null() => {
                let previous = std::mem::replace(existing, Value::Null);
                *existing = Value::List(vec![previous, value]);
            }
            Some(existing) => *existing = Value::List(vec![value]),
            None => {
                self.fields.insert(field.to_string(), Value::List(vec![value]));
            }
        }
    }

    /// Collection elements of a field (empty if unset or scalar)
    #[must_use]
    pub fn children(&self, field: &str) -> &[Value] {
        self.get(field).and_then(Value::as_list).unwrap_or(&[])
    }

    /// Remove every element of a collection field, returning the count removed
    pub fn clear_collection(&mut self, field: &str) -> usize {
        match self.fields.get_mut(field) {
            Some(Value::List(items)) => {
                let removed = items.len();
                items.clear();
                removed
            }
            _ => 0,
        }
    }

    /// Iterate over fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pet() -> DomainObject {
        DomainObject::new(ObjectRef::generate("pet"))
    }

    #[test]
    fn set_and_get_text() {
        let mut object = pet();
        object.set("name", "Fido");
        assert_eq!(object.text("name"), Some("Fido"));
        assert_eq!(object.type_name(), "pet");
    }

    #[test]
    fn push_creates_list() {
        let mut object = pet();
        let owner = ObjectRef::generate("person");
        object.push("owners", Value::Ref(owner.clone()));
        assert_eq!(object.children("owners"), &[Value::Ref(owner)]);
    }

    #[test]
    fn push_promotes_scalar() {
        let mut object = pet();
        object.set("tags", "a");
        object.push("tags", Value::from("b"));
        assert_eq!(object.children("tags").len(), 2);
    }

    #[test]
    fn clear_collection_counts_removed() {
        let mut object = pet();
        object.push("tags", Value::from("a"));
        object.push("tags", Value::from("b"));
        assert_eq!(object.clear_collection("tags"), 2);
        assert!(object.children("tags").is_empty());
        assert_eq!(object.clear_collection("missing"), 0);
    }

    #[test]
    fn reference_display_includes_type() {
        let r = ObjectRef::generate("person");
        assert!(r.to_string().starts_with("person:"));
    }

    #[test]
    fn object_serializes_to_json() {
        let mut object = pet();
        object.set("name", "Rex");
        let json = serde_json::to_string(&object).unwrap();
        let back: DomainObject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, object);
    }
}
