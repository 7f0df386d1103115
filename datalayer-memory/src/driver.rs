//! Thread-safe in-memory driver.
//!
//! Stores rows as BSON documents in per-collection tables behind an
//! async-aware read-write lock. Queries scan the whole table (no index
//! acceleration); unique indexes are enforced on insert. Intended for
//! development and tests, and as the reference implementation of the
//! [`Driver`] contract.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tracing::debug;

use datalayer_core::collection::{Collection, ForeignKey, Index};
use datalayer_core::converter::ConverterRef;
use datalayer_core::cursor::Cursor;
use datalayer_core::driver::Driver;
use datalayer_core::error::{DataSourceError, DataSourceResult};
use datalayer_core::query::Query;
use datalayer_core::types::{LogicalType, SortOrder};

use crate::converter::converter_for;
use crate::evaluator::{Comparable, DocumentEvaluator};

/// One provisioned collection: metadata, rows and sequence counters.
#[derive(Debug)]
struct Table {
    collection: Collection,
    rows: Vec<Document>,
    sequences: HashMap<String, i64>,
}

impl Table {
    fn new(collection: Collection) -> Self {
        Table { collection, rows: Vec::new(), sequences: HashMap::new() }
    }
}

type TableMap = HashMap<String, Table>;

/// In-memory [`Driver`] implementation.
///
/// Cloneable; clones share the same underlying tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryDriver {
    tables: Arc<RwLock<TableMap>>,
    closed: Arc<AtomicBool>,
}

impl MemoryDriver {
    /// Creates a new empty in-memory driver.
    pub fn new() -> Self {
        MemoryDriver::default()
    }

    fn ensure_open(&self) -> DataSourceResult<()> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(DataSourceError::Driver("driver is closed".into()));
        }
        Ok(())
    }

    /// Runs a query against a table snapshot: filter, multi-key sort,
    /// offset/limit, then field projection.
    async fn query_rows(&self, query: &Query) -> DataSourceResult<Vec<Document>> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        let Some(table) = tables.get(query.collection()) else {
            return Ok(Vec::new());
        };

        let mut rows =
            DocumentEvaluator::filter_documents(table.rows.iter(), &query.where_clause())?;

        if !query.orders().is_empty() {
            rows.sort_by(|a, b| {
                for order in query.orders() {
                    let left = a
                        .get(&order.field)
                        .map(Comparable::from)
                        .unwrap_or(Comparable::Null);
                    let right = b
                        .get(&order.field)
                        .map(Comparable::from)
                        .unwrap_or(Comparable::Null);
                    let ordering = match order.order {
                        SortOrder::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                        SortOrder::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = query.fetch_size().map(|n| n as usize).unwrap_or(usize::MAX);
        let mut rows: Vec<Document> = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(limit)
            .collect();

        if !query.fields().is_empty() {
            for row in &mut rows {
                *row = row
                    .iter()
                    .filter(|(key, _)| query.fields().contains(*key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
            }
        }

        Ok(rows)
    }
}

/// Whether every primary-key entry matches the row.
fn matches_key(row: &Document, key: &Document) -> bool {
    key.iter().all(|(field, value)| row.get(field) == Some(value))
}

#[async_trait]
impl Driver for MemoryDriver {
    fn coerce_type(&self, logical_type: LogicalType) -> DataSourceResult<String> {
        let raw_type = match logical_type {
            LogicalType::String => "string",
            LogicalType::Float | LogicalType::Double | LogicalType::Real => "real",
            LogicalType::Integer => "integer",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "datetime",
            LogicalType::Text => "text",
            LogicalType::Binary => "blob",
        };

        Ok(raw_type.to_string())
    }

    fn create_converter(&self, raw_type: &str) -> DataSourceResult<ConverterRef> {
        converter_for(raw_type)
    }

    async fn ensure_collection(&self, collection: &Collection) -> DataSourceResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        match tables.get_mut(collection.name()) {
            // Refresh metadata, keep the rows.
            Some(table) => table.collection = collection.clone(),
            None => {
                debug!(collection = collection.name(), "creating collection");
                tables.insert(collection.name().to_string(), Table::new(collection.clone()));
            }
        }

        Ok(())
    }

    async fn ensure_index(&self, collection: &Collection, index: &Index) -> DataSourceResult<()> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        if !tables.contains_key(collection.name()) {
            return Err(DataSourceError::CollectionNotFound(collection.name().to_string()));
        }

        debug!(collection = collection.name(), index = index.name(), "index ensured");
        Ok(())
    }

    async fn ensure_foreign_key(
        &self,
        collection: &Collection,
        foreign_key: &ForeignKey,
    ) -> DataSourceResult<()> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        if !tables.contains_key(collection.name()) {
            return Err(DataSourceError::CollectionNotFound(collection.name().to_string()));
        }
        if !tables.contains_key(&foreign_key.target().collection) {
            return Err(DataSourceError::CollectionNotFound(
                foreign_key.target().collection.clone(),
            ));
        }

        debug!(
            collection = collection.name(),
            foreign_key = foreign_key.name(),
            "foreign key ensured"
        );
        Ok(())
    }

    async fn find(&self, query: &Query) -> DataSourceResult<Box<dyn Cursor<Document>>> {
        let rows = self.query_rows(query).await?;
        Ok(Box::new(MemoryCursor::new(rows)))
    }

    async fn find_one(&self, query: &Query) -> DataSourceResult<Option<Document>> {
        Ok(self.query_rows(query).await?.into_iter().next())
    }

    async fn create(&self, collection: &str, mut data: Document) -> DataSourceResult<Document> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(collection)
            .ok_or_else(|| DataSourceError::CollectionNotFound(collection.to_string()))?;
        let Table { collection: metadata, rows, sequences } = table;

        for field in metadata.fields() {
            if field.sequence().is_generated() && !data.contains_key(field.name()) {
                let counter = sequences.entry(field.name().to_string()).or_insert(0);
                *counter += 1;
                data.insert(field.name(), Bson::Int64(*counter));
            }
        }

        for index in metadata.indexes().filter(|index| index.unique()) {
            let collides = rows.iter().any(|row| {
                index
                    .fields()
                    .iter()
                    .all(|field| data.get(field).is_some() && row.get(field) == data.get(field))
            });
            if collides {
                return Err(DataSourceError::Driver(format!(
                    "unique index `{}` violated",
                    index.name()
                )));
            }
        }

        rows.push(data.clone());
        Ok(data)
    }

    async fn save(
        &self,
        collection: &str,
        primary_key: Document,
        data: Document,
    ) -> DataSourceResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(collection)
            .ok_or_else(|| DataSourceError::CollectionNotFound(collection.to_string()))?;

        let row = table
            .rows
            .iter_mut()
            .find(|row| matches_key(row, &primary_key))
            .ok_or_else(|| {
                DataSourceError::Driver(format!(
                    "no document in `{collection}` matches the primary key"
                ))
            })?;

        for (field, value) in data {
            row.insert(field, value);
        }

        Ok(())
    }

    async fn remove(&self, collection: &str, primary_key: Document) -> DataSourceResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(collection)
            .ok_or_else(|| DataSourceError::CollectionNotFound(collection.to_string()))?;

        let before = table.rows.len();
        table.rows.retain(|row| !matches_key(row, &primary_key));
        if table.rows.len() == before {
            return Err(DataSourceError::Driver(format!(
                "no document in `{collection}` matches the primary key"
            )));
        }

        Ok(())
    }

    async fn commit(&self) -> DataSourceResult<()> {
        // Writes apply immediately; transactions are accepted as no-ops.
        self.ensure_open()
    }

    async fn rollback(&self) -> DataSourceResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> DataSourceResult<()> {
        debug!("closing memory driver");
        self.closed.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }
}

/// Cursor over a materialized result set.
pub struct MemoryCursor {
    items: VecDeque<Document>,
    closed: bool,
}

impl MemoryCursor {
    fn new(rows: Vec<Document>) -> Self {
        MemoryCursor { items: rows.into(), closed: false }
    }
}

#[async_trait]
impl Cursor<Document> for MemoryCursor {
    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn next(&mut self) -> DataSourceResult<Option<Document>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.items.pop_front())
    }

    async fn close(&mut self) -> DataSourceResult<()> {
        self.closed = true;
        self.items.clear();
        Ok(())
    }
}
