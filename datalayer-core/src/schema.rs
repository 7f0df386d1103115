//! Named registry of collections with driver provisioning.

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::debug;

use crate::collection::Collection;
use crate::driver::Driver;
use crate::error::{DataSourceError, DataSourceResult};

/// A named set of collections that can be provisioned against a driver.
///
/// Collections are keyed by name; iteration order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    collections: IndexMap<String, Collection>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Schema::default()
    }

    /// Adds a collection to this schema.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if a collection with the same name was
    /// already added.
    pub fn add_collection(&mut self, collection: Collection) -> DataSourceResult<()> {
        if self.collections.contains_key(collection.name()) {
            return Err(DataSourceError::DuplicateName(format!(
                "collection `{}` already present in schema",
                collection.name()
            )));
        }

        self.collections
            .insert(collection.name().to_string(), collection);
        Ok(())
    }

    /// Returns the collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` if the collection doesn't exist.
    pub fn get_collection(&self, name: &str) -> DataSourceResult<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| DataSourceError::CollectionNotFound(name.to_string()))
    }

    /// Returns whether a collection with the given name exists. Never fails.
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Returns the collections, in insertion order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Provisions the whole schema against the given driver.
    ///
    /// Runs in three phases, each fanned out concurrently and awaited in
    /// full before the next begins: collections first, then indexes, then
    /// foreign keys. Foreign keys therefore only run once both endpoint
    /// collections exist. Within a phase every call is attempted even when
    /// some fail; the first error in phase order is surfaced.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the driver.
    pub async fn sync(&self, driver: &dyn Driver) -> DataSourceResult<()> {
        debug!(collections = self.collections.len(), "syncing schema");

        let results = join_all(
            self.collections()
                .map(|collection| driver.ensure_collection(collection)),
        )
        .await;
        results.into_iter().collect::<DataSourceResult<()>>()?;

        let results = join_all(self.collections().flat_map(|collection| {
            collection
                .indexes()
                .map(move |index| driver.ensure_index(collection, index))
        }))
        .await;
        results.into_iter().collect::<DataSourceResult<()>>()?;

        let results = join_all(self.collections().flat_map(|collection| {
            collection
                .foreign_keys()
                .map(move |foreign_key| driver.ensure_foreign_key(collection, foreign_key))
        }))
        .await;
        results.into_iter().collect::<DataSourceResult<()>>()?;

        debug!("schema sync complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bson::Document;
    use std::sync::Mutex;

    use crate::collection::{ForeignKey, ForeignKeyConfig, ForeignKeyTarget, Index, IndexConfig};
    use crate::converter::ConverterRef;
    use crate::cursor::Cursor;
    use crate::query::Query;
    use crate::types::LogicalType;

    /// Records provisioning calls in arrival order.
    #[derive(Debug, Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Driver for RecordingDriver {
        fn coerce_type(&self, logical_type: LogicalType) -> DataSourceResult<String> {
            Ok(logical_type.as_str().to_string())
        }

        fn create_converter(&self, raw_type: &str) -> DataSourceResult<ConverterRef> {
            Err(DataSourceError::UnsupportedType(raw_type.to_string()))
        }

        async fn ensure_collection(&self, collection: &Collection) -> DataSourceResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("collection:{}", collection.name()));
            if collection.name() == "broken" {
                return Err(DataSourceError::Driver("broken collection".into()));
            }
            Ok(())
        }

        async fn ensure_index(
            &self,
            collection: &Collection,
            index: &Index,
        ) -> DataSourceResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("index:{}:{}", collection.name(), index.name()));
            Ok(())
        }

        async fn ensure_foreign_key(
            &self,
            collection: &Collection,
            foreign_key: &ForeignKey,
        ) -> DataSourceResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fk:{}:{}", collection.name(), foreign_key.name()));
            Ok(())
        }

        async fn find(&self, _query: &Query) -> DataSourceResult<Box<dyn Cursor<Document>>> {
            unimplemented!()
        }

        async fn find_one(&self, _query: &Query) -> DataSourceResult<Option<Document>> {
            unimplemented!()
        }

        async fn create(&self, _collection: &str, _data: Document) -> DataSourceResult<Document> {
            unimplemented!()
        }

        async fn save(
            &self,
            _collection: &str,
            _primary_key: Document,
            _data: Document,
        ) -> DataSourceResult<()> {
            unimplemented!()
        }

        async fn remove(&self, _collection: &str, _primary_key: Document) -> DataSourceResult<()> {
            unimplemented!()
        }

        async fn commit(&self) -> DataSourceResult<()> {
            Ok(())
        }

        async fn rollback(&self) -> DataSourceResult<()> {
            Ok(())
        }

        async fn close(&self) -> DataSourceResult<()> {
            Ok(())
        }
    }

    fn schema_with_relations() -> Schema {
        let mut users = Collection::new("users").unwrap();
        users
            .add_index(IndexConfig {
                name: None,
                fields: vec!["email".to_string()],
                unique: true,
            })
            .unwrap();

        let mut orders = Collection::new("orders").unwrap();
        orders
            .add_foreign_key(ForeignKeyConfig {
                name: None,
                field: "user_id".to_string(),
                target: ForeignKeyTarget {
                    collection: "users".to_string(),
                    field: "id".to_string(),
                },
            })
            .unwrap();

        let mut schema = Schema::new();
        schema.add_collection(users).unwrap();
        schema.add_collection(orders).unwrap();
        schema
    }

    #[test]
    fn duplicate_collection_is_rejected() {
        let mut schema = Schema::new();
        schema.add_collection(Collection::new("users").unwrap()).unwrap();
        assert!(matches!(
            schema.add_collection(Collection::new("users").unwrap()),
            Err(DataSourceError::DuplicateName(_))
        ));
    }

    #[test]
    fn missing_collection_reports_not_found() {
        let schema = Schema::new();
        assert!(matches!(
            schema.get_collection("missing"),
            Err(DataSourceError::CollectionNotFound(_))
        ));
        assert!(!schema.has_collection("missing"));
    }

    #[tokio::test]
    async fn sync_sequences_collections_indexes_then_foreign_keys() {
        let schema = schema_with_relations();
        let driver = RecordingDriver::default();
        schema.sync(&driver).await.unwrap();

        let calls = driver.calls.lock().unwrap().clone();
        let collections_done = calls
            .iter()
            .rposition(|call| call.starts_with("collection:"))
            .unwrap();
        let first_index = calls.iter().position(|call| call.starts_with("index:")).unwrap();
        let first_fk = calls.iter().position(|call| call.starts_with("fk:")).unwrap();

        assert!(collections_done < first_index);
        assert!(first_index < first_fk);
        assert!(calls.contains(&"fk:orders:orders.user_id".to_string()));
    }

    #[tokio::test]
    async fn sync_attempts_every_collection_before_failing() {
        let mut schema = schema_with_relations();
        schema.add_collection(Collection::new("broken").unwrap()).unwrap();

        let driver = RecordingDriver::default();
        let result = schema.sync(&driver).await;
        assert!(matches!(result, Err(DataSourceError::Driver(_))));

        let calls = driver.calls.lock().unwrap().clone();
        // All three collections were attempted despite the failure, and the
        // later phases never ran.
        assert_eq!(
            calls.iter().filter(|call| call.starts_with("collection:")).count(),
            3
        );
        assert!(!calls.iter().any(|call| call.starts_with("index:")));
    }
}
