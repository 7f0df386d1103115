//! Storage driver contract.
//!
//! The [`Driver`] trait is the sole I/O boundary of the core: any storage
//! engine binding (SQL, document, in-memory) implements it. The core
//! propagates driver failures without retry; retry policy, transactions and
//! timeouts are driver concerns.

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;
use std::sync::Arc;

use crate::collection::{Collection, ForeignKey, Index};
use crate::converter::ConverterRef;
use crate::cursor::Cursor;
use crate::error::DataSourceResult;
use crate::query::Query;
use crate::types::LogicalType;

/// Storage-engine-specific implementation of physical operations.
///
/// Implementations must be thread-safe: a single driver instance is shared
/// across mappings and the data source facade.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Returns the coerced raw type for a logical type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` if the driver has no physical
    /// representation for the given type.
    fn coerce_type(&self, logical_type: LogicalType) -> DataSourceResult<String>;

    /// Returns a new converter for the given raw type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` if the raw type is unknown to the driver.
    fn create_converter(&self, raw_type: &str) -> DataSourceResult<ConverterRef>;

    /// Ensures the collection exists in the underlying data source,
    /// creating it if absent.
    async fn ensure_collection(&self, collection: &Collection) -> DataSourceResult<()>;

    /// Ensures the index exists on the given collection, creating it if absent.
    async fn ensure_index(&self, collection: &Collection, index: &Index) -> DataSourceResult<()>;

    /// Ensures the foreign key exists on the given collection, creating it
    /// if absent. Both endpoint collections must already exist.
    async fn ensure_foreign_key(
        &self,
        collection: &Collection,
        foreign_key: &ForeignKey,
    ) -> DataSourceResult<()>;

    /// Finds documents matching the given query.
    ///
    /// Returns a lazy cursor over raw documents in store format.
    async fn find(&self, query: &Query) -> DataSourceResult<Box<dyn Cursor<Document>>>;

    /// Finds at most one document matching the given query.
    ///
    /// Returns `None` when nothing matches; absence is not an error.
    async fn find_one(&self, query: &Query) -> DataSourceResult<Option<Document>>;

    /// Creates a document in the given collection.
    ///
    /// The returned document may contain driver-assigned fields (sequences).
    async fn create(&self, collection: &str, data: Document) -> DataSourceResult<Document>;

    /// Saves modifications to the document identified by the primary key
    /// fields in the given collection.
    async fn save(
        &self,
        collection: &str,
        primary_key: Document,
        data: Document,
    ) -> DataSourceResult<()>;

    /// Removes the document identified by the primary key fields from the
    /// given collection.
    async fn remove(&self, collection: &str, primary_key: Document) -> DataSourceResult<()>;

    /// Commits the current transaction.
    async fn commit(&self) -> DataSourceResult<()>;

    /// Rolls back the current transaction.
    async fn rollback(&self) -> DataSourceResult<()>;

    /// Closes the driver, releasing all resources.
    async fn close(&self) -> DataSourceResult<()>;
}

/// Shared handle to a driver.
pub type DriverRef = Arc<dyn Driver>;
