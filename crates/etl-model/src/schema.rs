//! Type and field descriptors
//!
//! The loader consults the schema read-only: which fields a type declares, how a
//! field's literal is coerced, and whether it produces lookup vocabulary.
//! [`SchemaRegistry`] is the in-memory implementation, loadable from YAML or JSON.

use crate::error::ModelError;
use crate::path::NodePath;
use crate::reference::type_matches;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// Coercion category of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    #[default]
    Text,
    Bool,
    Int,
    Date,
    /// Controlled vocabulary code
    Lookup,
    /// Pointer to another object
    Reference,
}

/// Lookup assertion carried by a vocabulary field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LookupAssertion {
    /// Vocabulary defined directly by the `source` lookup type
    Lookup { source: String },
    /// Vocabulary whose entries are linked from a sibling field's lookup
    ///
    /// `relationship` names the relationship type; `value` is the sibling
    /// field's path (e.g. `/species`).
    TargetLookup {
        #[serde(default)]
        relationship: Option<String>,
        value: String,
    },
}

/// Descriptor of one field of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    /// Structural path, `/<name>` unless given
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub target_types: Vec<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    /// Types of the children added to this collection on instantiation
    #[serde(default)]
    pub default_children: Vec<String>,
    /// Template of a computed value, e.g. `{name} ({species})`
    #[serde(default)]
    pub derived: Option<String>,
    #[serde(default)]
    pub lookup: Option<LookupAssertion>,
}

impl FieldDescriptor {
    /// Create field of the given kind
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            path: format!("/{name}"),
            name,
            kind,
            collection: false,
            target_types: Vec::new(),
            default_value: None,
            default_children: Vec::new(),
            derived: None,
            lookup: None,
        }
    }

    /// Text field
    #[inline]
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Boolean field
    #[inline]
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Integer field
    #[inline]
    #[must_use]
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// Date field
    #[inline]
    #[must_use]
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Single reference field
    #[inline]
    #[must_use]
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Reference).with_target_types([target.into()])
    }

    /// Collection of references
    #[inline]
    #[must_use]
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut field = Self::reference(name, target);
        field.collection = true;
        field
    }

    /// Plain lookup field backed by `source` vocabulary
    #[inline]
    #[must_use]
    pub fn lookup(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut field = Self::new(name, FieldKind::Lookup).with_target_types([source.clone()]);
        field.lookup = Some(LookupAssertion::Lookup { source });
        field
    }

    /// Target lookup field linked from the sibling at `value`
    #[inline]
    #[must_use]
    pub fn target_lookup(
        name: impl Into<String>,
        relationship: Option<&str>,
        value: impl Into<String>,
    ) -> Self {
        let mut field = Self::new(name, FieldKind::Lookup);
        field.lookup = Some(LookupAssertion::TargetLookup {
            relationship: relationship.map(str::to_string),
            value: value.into(),
        });
        field
    }

    /// With target types
    #[inline]
    #[must_use]
    pub fn with_target_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.target_types = types.into_iter().collect();
        self
    }

    /// With default value applied on instantiation
    #[inline]
    #[must_use]
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// With default children added on instantiation
    #[inline]
    #[must_use]
    pub fn with_default_children(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.default_children = types.into_iter().collect();
        self
    }

    /// With derived value template
    #[inline]
    #[must_use]
    pub fn with_derived(mut self, template: impl Into<String>) -> Self {
        self.derived = Some(template.into());
        self
    }

    /// Whether this field carries a lookup assertion
    #[inline]
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        self.lookup.is_some()
    }
}

/// Descriptor of a named type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Create type without fields
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// With field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Field by name or by path (`name`, `/name`)
    #[must_use]
    pub fn field(&self, name_or_path: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name_or_path || f.path == name_or_path)
    }

    /// Fields holding collections
    pub fn collection_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.collection)
    }

    fn normalize(&mut self) {
        for field in &mut self.fields {
            if field.path.is_empty() {
                field.path = format!("/{}", field.name);
            }
        }
    }
}

/// Field of a type, used as a stable key for descriptors
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub type_name: String,
    pub field: String,
}

impl FieldKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Key of a path's leaf field
    #[must_use]
    pub fn from_path(path: &NodePath) -> Self {
        let leaf = path.leaf();
        Self::new(leaf.type_name(), leaf.name().trim_start_matches('/'))
    }

    /// Single-node path for this key
    #[inline]
    #[must_use]
    pub fn to_path(&self) -> NodePath {
        NodePath::single(self.type_name.clone(), self.field.clone())
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>{}", self.type_name, self.field)
    }
}

/// Read-only schema metadata
pub trait Schema: Send + Sync {
    /// Descriptor of a concrete type
    fn type_descriptor(&self, type_name: &str) -> Option<&TypeDescriptor>;

    /// All known concrete type names
    fn type_names(&self) -> Vec<String>;

    /// Concrete type names matching a possibly wildcarded pattern
    fn expand(&self, pattern: &str) -> Vec<String> {
        self.type_names()
            .into_iter()
            .filter(|name| type_matches(pattern, name))
            .collect()
    }

    /// Field descriptor by type and field name or path
    fn field(&self, type_name: &str, field: &str) -> Option<&FieldDescriptor> {
        self.type_descriptor(type_name)
            .and_then(|descriptor| descriptor.field(field))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    types: Vec<TypeDescriptor>,
}

/// In-memory schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: IndexMap<String, TypeDescriptor>,
}

impl SchemaRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous descriptor of that name
    pub fn register(&mut self, mut descriptor: TypeDescriptor) {
        descriptor.normalize();
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// With type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parse a YAML schema document (`types: [...]`)
    ///
    /// # Errors
    /// Returns [`ModelError::Yaml`] on malformed input
    pub fn from_yaml_str(input: &str) -> Result<Self, ModelError> {
        let document: SchemaDocument = serde_yaml::from_str(input)?;
        Ok(Self::from_document(document))
    }

    /// Parse a JSON schema document
    ///
    /// # Errors
    /// Returns [`ModelError::Json`] on malformed input
    pub fn from_json_str(input: &str) -> Result<Self, ModelError> {
        let document: SchemaDocument = serde_json::from_str(input)?;
        Ok(Self::from_document(document))
    }

    /// Load a schema file; `.json` is parsed as JSON, anything else as YAML
    ///
    /// # Errors
    /// Returns [`ModelError::Io`] if the file cannot be read, or a parse error
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&input),
            _ => Self::from_yaml_str(&input),
        }
    }

    fn from_document(document: SchemaDocument) -> Self {
        let mut registry = Self::new();
        for descriptor in document.types {
            registry.register(descriptor);
        }
        registry
    }
}

impl Schema for SchemaRegistry {
    fn type_descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}
