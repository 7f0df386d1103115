//! Serde-backed model types and the shipped per-concrete-class mapping.
//!
//! [`Model`] is the minimal contract a persistable struct implements: serde
//! round-tripping plus its collection name. [`ModelMapping`] binds one model
//! type to one [`MappingDescriptor`] and implements the full
//! [`Mapping`](crate::mapping::Mapping) surface on top of a driver: filters
//! are parsed with model field aliases, values cross the boundary through
//! each field's converter, and documents coming back from the driver are
//! rebuilt into model instances.
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

use async_trait::async_trait;
use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::cursor::Cursor;
use crate::driver::DriverRef;
use crate::error::{DataSourceError, DataSourceResult};
use crate::mapping::{MappedField, Mapper, Mapping, MappingDescriptor, QueryOptions};
use crate::query::Query;
use crate::types::Operator;

/// Contract for a struct persistable through a [`ModelMapping`].
pub trait Model: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this model maps to.
    ///
    /// This should be a static, lowercase identifier (e.g., "users").
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization utilities for models.
///
/// Automatically implemented for all [`Model`] types.
pub trait ModelExt: Model {
    /// Converts this instance to a BSON document in model field names.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the instance does not serialize
    /// to a document.
    fn to_document(&self) -> DataSourceResult<Document>;

    /// Creates an instance from a BSON document in model field names.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if deserialization fails.
    fn from_document(document: Document) -> DataSourceResult<Self>;

    /// Converts this instance to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if serialization fails.
    fn to_json(&self) -> DataSourceResult<serde_json::Value>;

    /// Creates an instance from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if deserialization fails.
    fn from_json(value: serde_json::Value) -> DataSourceResult<Self>;
}

impl<M: Model> ModelExt for M {
    fn to_document(&self) -> DataSourceResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            _ => Err(DataSourceError::Serialization(format!(
                "model `{}` does not serialize to a document",
                std::any::type_name::<M>()
            ))),
        }
    }

    fn from_document(document: Document) -> DataSourceResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> DataSourceResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(value: serde_json::Value) -> DataSourceResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Per-concrete-class persistence strategy: one model type, one collection.
///
/// Discriminator values inherited through a virtual/extend chain are
/// stamped onto every outgoing document and appended as equality
/// constraints to every query, so instances of sibling subtypes sharing a
/// collection never leak into each other's results.
#[derive(Debug)]
pub struct ModelMapping<M: Model> {
    mapper: Mapper,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelMapping<M> {
    /// Binds the model type to a mapping declaration and driver.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the descriptor targets a collection
    /// other than [`Model::collection_name`], and propagates field
    /// augmentation failures.
    pub fn new(driver: DriverRef, descriptor: Arc<MappingDescriptor>) -> DataSourceResult<Self> {
        if descriptor.collection() != M::collection_name() {
            return Err(DataSourceError::Validation(format!(
                "mapping targets collection `{}` but model `{}` expects `{}`",
                descriptor.collection(),
                std::any::type_name::<M>(),
                M::collection_name()
            )));
        }

        let mapper = Mapper::new(driver, descriptor)?;
        Ok(ModelMapping { mapper, _model: PhantomData })
    }

    /// Returns the underlying mapping machinery.
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Serializes an instance into a storage document: model aliases become
    /// storage names, values go through each field's converter, and
    /// inherited discriminator values are stamped on.
    fn to_storage(&self, instance: &M) -> DataSourceResult<Document> {
        let model = instance.to_document()?;

        let mut storage = Document::new();
        for field in self.mapper.fields() {
            match model.get(field.reference()) {
                Some(Bson::Null) | None => {}
                Some(value) => {
                    storage.insert(field.name(), field.converter().to_raw(value.clone())?);
                }
            }
        }
        for (discriminator, value) in self.mapper.descriptor().discriminators() {
            storage.insert(discriminator, value.clone());
        }

        Ok(storage)
    }

    /// Extracts the primary-key document from a storage document.
    fn primary_key(&self, storage: &Document) -> DataSourceResult<Document> {
        let mut key = Document::new();
        for field in self.mapper.fields().iter().filter(|field| field.primary_key()) {
            let value = storage.get(field.name()).ok_or_else(|| {
                DataSourceError::FieldRequired(field.name().to_string())
            })?;
            key.insert(field.name(), value.clone());
        }

        if key.is_empty() {
            return Err(DataSourceError::Validation(format!(
                "collection `{}` declares no primary key",
                self.mapper.collection().name()
            )));
        }

        Ok(key)
    }

    /// The translator seam: maps a model field alias to its storage name
    /// and converts the comparison value into store representation.
    fn translate(
        &self,
    ) -> impl FnMut(&mut Query, &str, Operator, &Bson) -> DataSourceResult<()> + '_ {
        move |query, reference, operator, value| {
            let field = self.mapper.field_by_reference(reference)?;
            let converted = match (operator, value) {
                // Membership tests convert element-wise.
                (Operator::In | Operator::Nin, Bson::Array(items)) => Bson::Array(
                    items
                        .iter()
                        .map(|item| field.converter().to_raw(item.clone()))
                        .collect::<DataSourceResult<Vec<_>>>()?,
                ),
                // Patterns are matched against the stored form as-is.
                (Operator::Regex, pattern) => pattern.clone(),
                _ => field.converter().to_raw(value.clone())?,
            };
            query.operation(field.name(), operator, converted)?;
            Ok(())
        }
    }

    fn build_query(&self, filter: &Document, options: &QueryOptions) -> DataSourceResult<Query> {
        let mut query = self.mapper.parse_user_query(filter, options, &mut self.translate())?;
        for (discriminator, value) in self.mapper.descriptor().discriminators() {
            query.operation(discriminator, Operator::Eq, value.clone())?;
        }
        Ok(query)
    }
}

/// Rebuilds a model instance from a storage document: storage names become
/// model aliases and values come back through each field's converter.
fn build_model<M: Model>(fields: &[MappedField], document: Document) -> DataSourceResult<M> {
    let mut model = Document::new();
    for field in fields {
        if let Some(value) = document.get(field.name()) {
            model.insert(field.reference(), field.converter().from_raw(value.clone())?);
        }
    }

    Ok(deserialize_from_bson(Bson::Document(model))?)
}

#[async_trait]
impl<M: Model> Mapping for ModelMapping<M> {
    type Model = M;

    fn create_query(&self) -> DataSourceResult<Query> {
        let mut query = Query::new(self.mapper.collection().name())?;
        query.begin_where();
        for (discriminator, value) in self.mapper.descriptor().discriminators() {
            query.operation(discriminator, Operator::Eq, value.clone())?;
        }
        Ok(query)
    }

    fn build(&self, document: Document) -> DataSourceResult<M> {
        build_model(self.mapper.fields(), document)
    }

    async fn sync(&self) -> DataSourceResult<()> {
        let driver = self.mapper.driver();
        let collection = self.mapper.collection();
        debug!(collection = collection.name(), "provisioning mapped collection");

        driver.ensure_collection(collection).await?;
        for index in collection.indexes() {
            driver.ensure_index(collection, index).await?;
        }
        for foreign_key in collection.foreign_keys() {
            driver.ensure_foreign_key(collection, foreign_key).await?;
        }

        Ok(())
    }

    async fn find(
        &self,
        filter: &Document,
        options: &QueryOptions,
    ) -> DataSourceResult<Box<dyn Cursor<M>>> {
        let query = self.build_query(filter, options)?;
        let cursor = self.mapper.driver().find(&query).await?;

        let fields = self.mapper.fields().to_vec();
        Ok(Box::new(Mapper::decorate_cursor(cursor, move |document| {
            build_model::<M>(&fields, document)
        })))
    }

    async fn find_one(&self, filter: &Document) -> DataSourceResult<Option<M>> {
        let mut query = self.build_query(filter, &QueryOptions::default())?;
        query.limit(1)?;

        match self.mapper.driver().find_one(&query).await? {
            Some(document) => Ok(Some(self.build(document)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, instance: &mut M) -> DataSourceResult<()> {
        let data = self.to_storage(instance)?;
        let created = self
            .mapper
            .driver()
            .create(self.mapper.collection().name(), data)
            .await?;

        // The driver returns the completed document, including assigned
        // sequence values; rebuild the instance from it.
        *instance = self.build(created)?;
        Ok(())
    }

    async fn save(&self, instance: &M) -> DataSourceResult<()> {
        let mut data = self.to_storage(instance)?;
        let key = self.primary_key(&data)?;
        for field in key.keys() {
            data.remove(field);
        }

        self.mapper
            .driver()
            .save(self.mapper.collection().name(), key, data)
            .await
    }

    async fn remove(&self, instance: &M) -> DataSourceResult<()> {
        let data = self.to_storage(instance)?;
        let key = self.primary_key(&data)?;

        self.mapper
            .driver()
            .remove(self.mapper.collection().name(), key)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::collections::HashMap;

    use crate::collection::{Collection, ForeignKey, Index, Sequence};
    use crate::converter::{Converter, ConverterRef};
    use crate::mapping::{FieldDescriptor, MappingConfig};
    use crate::query::Expr;
    use crate::types::LogicalType;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: Option<i64>,
        name: String,
        age: i64,
    }

    impl Model for User {
        fn collection_name() -> &'static str {
            "users"
        }
    }

    /// Tags strings on the way out and strips the tag on the way back, so
    /// tests can observe that conversion actually ran.
    #[derive(Debug)]
    struct Tagging;

    impl Converter for Tagging {
        fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
            match value {
                Bson::String(s) => Ok(Bson::String(format!("raw:{s}"))),
                other => Ok(other),
            }
        }

        fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
            match value {
                Bson::String(s) => Ok(Bson::String(
                    s.strip_prefix("raw:").unwrap_or(&s).to_string(),
                )),
                other => Ok(other),
            }
        }
    }

    #[derive(Debug)]
    struct StubDriver;

    #[async_trait]
    impl crate::driver::Driver for StubDriver {
        fn coerce_type(&self, logical_type: LogicalType) -> DataSourceResult<String> {
            Ok(logical_type.as_str().to_string())
        }

        fn create_converter(&self, _raw_type: &str) -> DataSourceResult<ConverterRef> {
            Ok(Arc::new(Tagging))
        }

        async fn ensure_collection(&self, _collection: &Collection) -> DataSourceResult<()> {
            Ok(())
        }

        async fn ensure_index(
            &self,
            _collection: &Collection,
            _index: &Index,
        ) -> DataSourceResult<()> {
            Ok(())
        }

        async fn ensure_foreign_key(
            &self,
            _collection: &Collection,
            _foreign_key: &ForeignKey,
        ) -> DataSourceResult<()> {
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

    fn users_descriptor() -> Arc<MappingDescriptor> {
        Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "users".to_string(),
                fields: vec![
                    FieldDescriptor {
                        primary_key: true,
                        sequence: Sequence::Auto,
                        ..FieldDescriptor::new("id", LogicalType::Integer)
                    },
                    FieldDescriptor {
                        // Stored under a different name than the model field.
                        reference: Some("name".to_string()),
                        ..FieldDescriptor::new("full_name", LogicalType::String)
                    },
                    FieldDescriptor::new("age", LogicalType::Integer),
                ],
                ..MappingConfig::default()
            })
            .unwrap(),
        )
    }

    fn users_mapping() -> ModelMapping<User> {
        ModelMapping::new(Arc::new(StubDriver), users_descriptor()).unwrap()
    }

    #[test]
    fn model_ext_round_trips_documents_and_json() {
        let user = User { id: Some(1), name: "alice".to_string(), age: 31 };

        let document = user.to_document().unwrap();
        assert_eq!(User::from_document(document).unwrap(), user);

        let json = user.to_json().unwrap();
        assert_eq!(json["name"], "alice");
        assert_eq!(User::from_json(json).unwrap(), user);
    }

    #[test]
    fn collection_name_mismatch_is_rejected() {
        let descriptor = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "accounts".to_string(),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        assert!(matches!(
            ModelMapping::<User>::new(Arc::new(StubDriver), descriptor),
            Err(DataSourceError::Validation(_))
        ));
    }

    #[test]
    fn storage_round_trip_applies_aliases_and_converters() {
        let mapping = users_mapping();
        let user = User { id: Some(7), name: "alice".to_string(), age: 31 };

        let storage = mapping.to_storage(&user).unwrap();
        assert_eq!(storage, doc! { "id": 7_i64, "full_name": "raw:alice", "age": 31_i64 });

        let rebuilt = mapping.build(storage).unwrap();
        assert_eq!(rebuilt, user);
    }

    #[test]
    fn absent_sequence_fields_are_omitted_from_storage() {
        let mapping = users_mapping();
        let user = User { id: None, name: "bob".to_string(), age: 4 };

        let storage = mapping.to_storage(&user).unwrap();
        assert!(!storage.contains_key("id"));
    }

    #[test]
    fn primary_key_extraction_requires_the_key_value() {
        let mapping = users_mapping();

        let key = mapping.primary_key(&doc! { "id": 7_i64, "age": 1_i64 }).unwrap();
        assert_eq!(key, doc! { "id": 7_i64 });

        assert!(matches!(
            mapping.primary_key(&doc! { "age": 1_i64 }),
            Err(DataSourceError::FieldRequired(field)) if field == "id"
        ));
    }

    #[test]
    fn filters_use_model_aliases_and_convert_values() {
        let mapping = users_mapping();
        let query = mapping
            .build_query(&doc! { "name": "alice" }, &QueryOptions::default())
            .unwrap();

        assert_eq!(
            query.where_clause(),
            Expr::And(vec![Expr::Comparison {
                operator: Operator::Eq,
                field: "full_name".to_string(),
                value: Bson::String("raw:alice".to_string()),
            }])
        );
    }

    #[test]
    fn unknown_filter_field_reports_not_found() {
        let mapping = users_mapping();
        assert!(matches!(
            mapping.build_query(&doc! { "nickname": "al" }, &QueryOptions::default()),
            Err(DataSourceError::FieldNotFound(_))
        ));
    }

    #[test]
    fn discriminators_constrain_queries_and_stamp_documents() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Student {
            id: Option<i64>,
            grade: i64,
        }

        impl Model for Student {
            fn collection_name() -> &'static str {
                "people"
            }
        }

        let parent = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "people".to_string(),
                fields: vec![
                    FieldDescriptor {
                        primary_key: true,
                        sequence: Sequence::Auto,
                        ..FieldDescriptor::new("id", LogicalType::Integer)
                    },
                    FieldDescriptor::new("kind", LogicalType::String),
                ],
                discriminator: Some("kind".to_string()),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        let descriptor = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "people".to_string(),
                fields: vec![FieldDescriptor::new("grade", LogicalType::Integer)],
                extend: Some(parent),
                discriminator_values: HashMap::from([(
                    "kind".to_string(),
                    Bson::from("student"),
                )]),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        let mapping: ModelMapping<Student> =
            ModelMapping::new(Arc::new(StubDriver), descriptor).unwrap();

        let query = mapping.create_query().unwrap();
        assert_eq!(
            query.where_clause(),
            Expr::And(vec![Expr::Comparison {
                operator: Operator::Eq,
                field: "kind".to_string(),
                value: Bson::from("student"),
            }])
        );

        let student = Student { id: Some(1), grade: 5 };
        let storage = mapping.to_storage(&student).unwrap();
        assert_eq!(storage.get_str("kind").unwrap(), "student");
    }
}
