//! A data source abstraction layer: structured queries, schema metadata and
//! model mapping over pluggable storage drivers.
//!
//! This crate is the core of the datalayer project and provides:
//!
//! - **Type registry** ([`types`]) - Logical field types, query operators and sort orders
//! - **Converter contract** ([`converter`]) - Bidirectional value conversion between model and store
//! - **Schema metadata** ([`collection`], [`schema`]) - Collections, fields, indexes and foreign keys
//! - **Query builder** ([`query`]) - Stack-based boolean expression trees with selection, ordering and pagination
//! - **Driver and cursor contracts** ([`driver`], [`cursor`]) - The storage engine boundary
//! - **Mapping layer** ([`mapping`], [`model`]) - Filter parsing, field augmentation and model persistence
//! - **Data source facade** ([`datasource`]) - One driver bound to one schema
//! - **Error handling** ([`error`]) - Comprehensive error types and result alias
//!
//! # Example
//!
//! ```ignore
//! use datalayer_core::model::{Model, ModelMapping};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Option<i64>,
//!     pub name: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as datalayer_core;

pub mod collection;
pub mod converter;
pub mod cursor;
pub mod datasource;
pub mod driver;
pub mod error;
pub mod mapping;
pub mod model;
pub mod query;
pub mod schema;
pub mod types;
