//! ETL Model
//!
//! Pure data types shared by the loader, the store seams and the CLI.
//!
//! # Core Concepts
//!
//! - [`ValueRow`]: One `(record id, field path, value)` triple exported from a legacy system
//! - [`Reference`]: The three reference grammars (`#id`, `type#legacyId`, `type?field=value`)
//! - [`NodePath`]: Parsed mapping paths (`<type>field[index]<type>field`)
//! - [`DomainObject`] / [`Value`] / [`ObjectRef`]: The typed objects the loader builds
//! - [`Schema`] / [`SchemaRegistry`]: Read-only type and field descriptors
//!
//! # Example
//!
//! ```rust
//! use etl_model::Reference;
//!
//! let reference: Reference = "pet?name=Rex".parse().unwrap();
//! assert_eq!(reference.type_name(), Some("pet"));
//! assert_eq!(reference.to_string(), "pet?name=Rex");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod object;
mod path;
mod reference;
mod row;
mod schema;

pub use error::ModelError;
pub use object::{DomainObject, ObjectId, ObjectRef, Value};
pub use path::{NodePath, PathNode};
pub use reference::{type_matches, Reference, WILDCARD};
pub use row::ValueRow;
pub use schema::{
    FieldDescriptor, FieldKey, FieldKind, LookupAssertion, Schema, SchemaRegistry, TypeDescriptor,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the model
    pub use crate::{
        DomainObject, FieldDescriptor, FieldKey, FieldKind, NodePath, ObjectRef, Reference,
        Schema, SchemaRegistry, TypeDescriptor, Value, ValueRow,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
