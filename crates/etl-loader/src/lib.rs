//! ETL Loader
//!
//! Converts a flat stream of `(record id, field path, value)` rows into a graph of
//! typed domain objects and synthesizes the lookup vocabulary those rows name.
//!
//! # Overview
//!
//! - **RowCursor**: single forward pass over the paged, record-sorted row stream
//! - **Loader**: groups rows per record, creates and populates objects, resolves
//!   references (loading referenced records on demand), tracks completeness and
//!   flushes completed objects in batches
//! - **LookupHandler**: accumulates generated code/name pairs and relationship
//!   pairs, then commits them with deduplication against persisted vocabulary
//! - **LookupCache**: read-through cache over persisted vocabulary
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use etl_loader::{Loader, LoaderConfig};
//! use etl_model::{FieldDescriptor, SchemaRegistry, TypeDescriptor, ValueRow};
//! use etl_store::{MemoryRowSource, MemoryStore};
//!
//! let schema = Arc::new(
//!     SchemaRegistry::new()
//!         .with_type(TypeDescriptor::new("person").with_field(FieldDescriptor::text("name")))
//!         .with_type(
//!             TypeDescriptor::new("pet")
//!                 .with_field(FieldDescriptor::text("name"))
//!                 .with_field(FieldDescriptor::reference("owner", "person")),
//!         ),
//! );
//! let source = Arc::new(MemoryRowSource::new(vec![
//!     ValueRow::new("obj1", "pet", "name", "Fido"),
//!     ValueRow::reference("obj1", "pet", "owner", "#obj2"),
//!     ValueRow::new("obj2", "person", "name", "Jane"),
//! ]));
//! let store = Arc::new(MemoryStore::new(schema.clone()));
//!
//! let mut loader = Loader::new(source, store.clone(), schema, LoaderConfig::default()).unwrap();
//! let summary = loader.load().unwrap();
//! assert_eq!(summary.created, 2);
//! assert_eq!(store.len(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod coerce;
mod config;
mod cursor;
mod error;
mod listener;
mod loader;
pub mod lookup;

pub use coerce::{coerce, parse_timestamp};
pub use config::LoaderConfig;
pub use cursor::RowCursor;
pub use error::LoadError;
pub use listener::{ErrorListener, LoggingListener};
pub use loader::{LoadSummary, Loader};
pub use lookup::{get_code, CommitSummary, LookupCache, LookupHandler};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a load
    pub use crate::{
        get_code, ErrorListener, LoadError, LoadSummary, Loader, LoaderConfig, LookupHandler,
        RowCursor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
