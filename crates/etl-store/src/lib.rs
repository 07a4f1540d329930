//! ETL Store
//!
//! Seams to the external collaborators of a load run, plus in-memory
//! implementations used by the CLI and the test suites.
//!
//! # Overview
//!
//! - **ObjectStore**: type factory, equality query, get by identity, save, derive
//! - **RowSource**: paged flat rows plus by-record and by-legacy-id fetches
//! - **MemoryStore** / **MemoryRowSource**: in-process implementations
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use etl_model::{FieldDescriptor, SchemaRegistry, TypeDescriptor};
//! use etl_store::{MemoryStore, ObjectStore, Query};
//!
//! let schema = SchemaRegistry::new()
//!     .with_type(TypeDescriptor::new("pet").with_field(FieldDescriptor::text("name")));
//! let store = MemoryStore::new(Arc::new(schema));
//!
//! let mut pet = store.create("pet").unwrap();
//! pet.set("name", "Rex");
//! store.save(&pet, true).unwrap();
//!
//! let found = store.query(&Query::new("pet").eq("name", "Rex")).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod memory;
mod memory_source;
mod source;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use memory_source::MemoryRowSource;
pub use source::RowSource;
pub use store::{ObjectStore, Query};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for store operations
    pub use crate::{MemoryRowSource, MemoryStore, ObjectStore, Query, RowSource, StoreError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
