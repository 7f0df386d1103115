//! Main datalayer crate providing a unified data source abstraction.
//!
//! This crate is the primary entry point for users of the datalayer
//! framework. It re-exports the core types and functionality from the
//! sub-crates and provides convenient access to the bundled drivers.
//!
//! # Features
//!
//! - **Type-safe model persistence** - Define your data structures with Serde and map them onto collections
//! - **Pluggable drivers** - Any storage engine can bind by implementing the `Driver` trait
//! - **Structured queries** - Stack-based boolean expression builder plus a human-authored filter grammar
//! - **Schema provisioning** - Collections, indexes and foreign keys synced concurrently
//!
//! # Quick Start
//!
//! ```ignore
//! use datalayer::{prelude::*, memory::MemoryDriver};
//! use bson::doc;
//! use serde::{Serialize, Deserialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Option<i64>,
//!     pub name: String,
//!     pub age: i64,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DataSourceResult<()> {
//!     let driver = Arc::new(MemoryDriver::new());
//!
//!     let descriptor = MappingDescriptor::new(MappingConfig {
//!         collection: "users".to_string(),
//!         fields: vec![
//!             FieldDescriptor {
//!                 primary_key: true,
//!                 sequence: Sequence::Auto,
//!                 ..FieldDescriptor::new("id", LogicalType::Integer)
//!             },
//!             FieldDescriptor::new("name", LogicalType::String),
//!             FieldDescriptor::new("age", LogicalType::Integer),
//!         ],
//!         ..MappingConfig::default()
//!     })?;
//!
//!     let users: ModelMapping<User> = ModelMapping::new(driver, Arc::new(descriptor))?;
//!     users.sync().await?;
//!
//!     // Create an instance; the assigned sequence id is written back.
//!     let mut alice = User { id: None, name: "Alice".to_string(), age: 31 };
//!     users.create(&mut alice).await?;
//!
//!     // Query with a human-authored filter.
//!     let adults = users
//!         .find(&doc! { "age": { "$gte": 18 } }, &QueryOptions::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - Fast in-memory driver for development and testing

pub mod prelude;

pub use datalayer_core::{
    collection, converter, cursor, datasource, driver, error, mapping, model, query, schema,
    types,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory driver implementations.
pub mod memory {
    pub use datalayer_memory::{MemoryCursor, MemoryDriver};
}
