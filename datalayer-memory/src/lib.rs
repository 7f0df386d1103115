//! In-memory driver for datalayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! datalayer `Driver` contract. It uses async-aware read-write locks for
//! concurrent access and is ideal for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Filtering, multi-key sorting, pagination and projection
//! - **Sequence fields** - Monotonic values assigned on create
//! - **Built-in converters** - Inverse-law converter pairs for every raw type
//!
//! # Quick Start
//!
//! ```ignore
//! use datalayer_core::model::{Model, ModelMapping};
//! use datalayer_memory::MemoryDriver;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
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
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Arc::new(MemoryDriver::new());
//!     let mapping: ModelMapping<User> = ModelMapping::new(driver, descriptor)?;
//!     mapping.sync().await?;
//!
//!     let mut user = User { id: None, name: "Alice".to_string() };
//!     mapping.create(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as datalayer_memory;

pub mod converter;
pub mod driver;
mod evaluator;

pub use driver::{MemoryCursor, MemoryDriver};
