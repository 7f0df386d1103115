//! Translation layer between model types and collections.
//!
//! A [`MappingDescriptor`] declares how a model maps onto one collection:
//! its field descriptors, optional indexes and foreign keys, and its place
//! in a virtual/extend inheritance chain. A [`Mapper`] augments those
//! descriptors against a driver (deriving raw types and converters),
//! assembles the physical [`Collection`], parses human-authored filter
//! documents into [`Query`] expression trees, and converts values in both
//! directions. Concrete persistence strategies implement the [`Mapping`]
//! trait on top of it.
//!
//! # Filter grammar
//!
//! A filter is a BSON document mapping keys to values. A key starting with
//! `$` must be a recognized operator; `$and`/`$or` take an array of
//! sub-expressions, `$not` takes one sub-expression, and comparison
//! operators take the right-hand value. Any other key opens a field branch:
//! a scalar value is an implicit `$eq`, a sub-document is a conjunction of
//! its entries under that field. Exactly one field may be open per branch.
//!
//! ```ignore
//! // name = "alice" AND age > 30
//! doc! { "name": "alice", "age": { "$gt": 30 } }
//! // age < 13 OR age > 64
//! doc! { "age": { "$or": [ { "$lt": 13 }, { "$gt": 64 } ] } }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::collection::{
    Collection, FieldConfig, ForeignKeyConfig, IndexConfig, Sequence,
};
use crate::converter::ConverterRef;
use crate::cursor::Cursor;
use crate::driver::DriverRef;
use crate::error::{DataSourceError, DataSourceResult};
use crate::query::Query;
use crate::schema::Schema;
use crate::types::{LogicalType, Operator, Order};

/// Declares how one model field maps onto a collection field.
///
/// `raw_type` and `converter` may be left absent; the [`Mapper`] derives
/// them from the driver at construction time.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Storage field name, unique within the collection.
    pub name: String,
    /// Model field alias. Defaults to the storage name when absent.
    pub reference: Option<String>,
    /// Logical field type.
    pub logical_type: LogicalType,
    /// Physical raw type. Derived via the driver when absent.
    pub raw_type: Option<String>,
    /// Whether the field is part of the primary key.
    pub primary_key: bool,
    /// Sequence behavior.
    pub sequence: Sequence,
    /// Value converter. Derived from the raw type via the driver when absent.
    pub converter: Option<ConverterRef>,
}

impl FieldDescriptor {
    /// Creates a plain descriptor with only a name and logical type set.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        FieldDescriptor {
            name: name.into(),
            reference: None,
            logical_type,
            raw_type: None,
            primary_key: false,
            sequence: Sequence::None,
            converter: None,
        }
    }
}

/// A field descriptor after driver augmentation: raw type, converter and
/// model alias are all resolved. Immutable.
#[derive(Debug, Clone)]
pub struct MappedField {
    name: String,
    reference: String,
    logical_type: LogicalType,
    raw_type: String,
    primary_key: bool,
    sequence: Sequence,
    converter: ConverterRef,
}

impl MappedField {
    /// Returns the storage field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the model field alias.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the logical field type.
    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    /// Returns the resolved raw type.
    pub fn raw_type(&self) -> &str {
        &self.raw_type
    }

    /// Returns whether the field is part of the primary key.
    pub fn primary_key(&self) -> bool {
        self.primary_key
    }

    /// Returns the sequence behavior.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Returns the resolved converter.
    pub fn converter(&self) -> &ConverterRef {
        &self.converter
    }
}

/// Descriptor used to construct a [`MappingDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct MappingConfig {
    /// Target collection name.
    pub collection: String,
    /// Local field descriptors, in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Indexes to provision on the collection.
    pub indexes: Vec<IndexConfig>,
    /// Foreign keys to provision on the collection.
    pub foreign_keys: Vec<ForeignKeyConfig>,
    /// Discriminator field name. Present when this mapping is virtual.
    pub discriminator: Option<String>,
    /// Virtual parent mapping this one extends.
    pub extend: Option<Arc<MappingDescriptor>>,
    /// One discriminator value per ancestor discriminator field.
    pub discriminator_values: HashMap<String, Bson>,
}

/// Validated mapping declaration, possibly part of a virtual/extend chain.
///
/// The inheritance model is data-driven: each node holds an optional parent
/// reference and an explicit discriminator-value table. A mapping may only
/// extend a virtual parent, and must supply a discriminator value for every
/// ancestor in the chain.
#[derive(Debug)]
pub struct MappingDescriptor {
    collection: String,
    fields: Vec<FieldDescriptor>,
    indexes: Vec<IndexConfig>,
    foreign_keys: Vec<ForeignKeyConfig>,
    discriminator: Option<String>,
    parent: Option<Arc<MappingDescriptor>>,
    discriminator_values: HashMap<String, Bson>,
}

impl MappingDescriptor {
    /// Validates and freezes a mapping declaration.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the collection name is empty or the
    /// extended parent is not virtual, and `MissingDiscriminatorValue` if
    /// any ancestor discriminator has no value in the config.
    pub fn new(config: MappingConfig) -> DataSourceResult<Self> {
        if config.collection.is_empty() {
            return Err(DataSourceError::Validation("mapping collection name is empty".into()));
        }

        if let Some(parent) = &config.extend {
            if !parent.is_virtual() {
                return Err(DataSourceError::Validation(format!(
                    "mapping for `{}` extends non-virtual mapping for `{}`",
                    config.collection,
                    parent.collection()
                )));
            }

            let mut ancestor = Some(parent.clone());
            while let Some(current) = ancestor {
                if let Some(discriminator) = current.discriminator() {
                    if !config.discriminator_values.contains_key(discriminator) {
                        return Err(DataSourceError::MissingDiscriminatorValue(
                            discriminator.to_string(),
                        ));
                    }
                }
                ancestor = current.parent.clone();
            }
        }

        Ok(MappingDescriptor {
            collection: config.collection,
            fields: config.fields,
            indexes: config.indexes,
            foreign_keys: config.foreign_keys,
            discriminator: config.discriminator,
            parent: config.extend,
            discriminator_values: config.discriminator_values,
        })
    }

    /// Returns the target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns whether this mapping is virtual (carries a discriminator).
    pub fn is_virtual(&self) -> bool {
        self.discriminator.is_some()
    }

    /// Returns the discriminator field name of a virtual mapping.
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// Returns the extended parent mapping, when any.
    pub fn parent(&self) -> Option<&Arc<MappingDescriptor>> {
        self.parent.as_ref()
    }

    /// Collects field descriptors along the inheritance chain, ancestors
    /// before local fields, root to leaf.
    ///
    /// Duplicate names across levels are not deduplicated; shadowing a
    /// parent field is a caller error.
    pub fn collect_fields(&self) -> Vec<&FieldDescriptor> {
        let mut fields = match &self.parent {
            Some(parent) => parent.collect_fields(),
            None => Vec::new(),
        };
        fields.extend(self.fields.iter());
        fields
    }

    /// Returns one (discriminator field, value) pair per ancestor, leaf to
    /// root. The values constrain queries and stamp outgoing documents.
    pub fn discriminators(&self) -> Vec<(&str, &Bson)> {
        let mut pairs = Vec::new();
        let mut ancestor = self.parent.as_deref();
        while let Some(current) = ancestor {
            if let Some(discriminator) = current.discriminator() {
                // Validated present at construction.
                if let Some(value) = self.discriminator_values.get(discriminator) {
                    pairs.push((discriminator, value));
                }
            }
            ancestor = current.parent.as_deref();
        }
        pairs
    }

    fn indexes(&self) -> &[IndexConfig] {
        &self.indexes
    }

    fn foreign_keys(&self) -> &[ForeignKeyConfig] {
        &self.foreign_keys
    }
}

/// Options accepted by the filter-parsing entry point.
///
/// `limit` follows the query convention: `None` or `Some(-1)` leaves the
/// query unbounded, `Some(0)` is a literal zero-row bound.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Fetch offset, 0 by default.
    pub skip: u64,
    /// Fetch size bound, unbounded by default.
    pub limit: Option<i64>,
    /// Multi-key sort, evaluated in order.
    pub order_by: Vec<Order>,
}

/// Two-level value map: collection name to field name to values.
pub type DataMap = HashMap<String, HashMap<String, Vec<Bson>>>;

/// Shared mapping machinery: field augmentation, filter parsing, value
/// conversion and cursor decoration.
///
/// One `Mapper` binds one [`MappingDescriptor`] to one driver, resolving
/// every field in the inheritance chain and assembling the physical
/// [`Collection`] to provision.
#[derive(Debug)]
pub struct Mapper {
    driver: DriverRef,
    descriptor: Arc<MappingDescriptor>,
    fields: Vec<MappedField>,
    collection: Collection,
}

impl Mapper {
    /// Augments every field in the descriptor chain against the driver and
    /// assembles the physical collection.
    ///
    /// # Errors
    ///
    /// Propagates driver coercion/converter failures (`UnsupportedType`)
    /// and collection assembly errors (`DuplicateName`, `Validation`).
    pub fn new(driver: DriverRef, descriptor: Arc<MappingDescriptor>) -> DataSourceResult<Self> {
        let fields = descriptor
            .collect_fields()
            .into_iter()
            .map(|field| Self::augment_field(&*driver, field.clone()))
            .collect::<DataSourceResult<Vec<_>>>()?;

        let mut collection = Collection::new(descriptor.collection())?;
        for field in &fields {
            collection.add_field(FieldConfig {
                name: field.name.clone(),
                logical_type: field.logical_type,
                raw_type: field.raw_type.clone(),
                converter: field.converter.clone(),
                primary_key: field.primary_key,
                sequence: field.sequence.clone(),
            })?;
        }
        for index in descriptor.indexes() {
            collection.add_index(index.clone())?;
        }
        for foreign_key in descriptor.foreign_keys() {
            collection.add_foreign_key(foreign_key.clone())?;
        }

        debug!(
            collection = descriptor.collection(),
            fields = fields.len(),
            "mapping resolved"
        );

        Ok(Mapper { driver, descriptor, fields, collection })
    }

    /// Resolves a field descriptor against the driver: derives the raw type
    /// from the logical type when absent, then the converter from the raw
    /// type when absent.
    ///
    /// # Errors
    ///
    /// Propagates whatever the driver raises, typically `UnsupportedType`.
    pub fn augment_field(
        driver: &dyn crate::driver::Driver,
        descriptor: FieldDescriptor,
    ) -> DataSourceResult<MappedField> {
        let raw_type = match descriptor.raw_type {
            Some(raw_type) => raw_type,
            None => driver.coerce_type(descriptor.logical_type)?,
        };
        let converter = match descriptor.converter {
            Some(converter) => converter,
            None => driver.create_converter(&raw_type)?,
        };

        Ok(MappedField {
            reference: descriptor.reference.unwrap_or_else(|| descriptor.name.clone()),
            name: descriptor.name,
            logical_type: descriptor.logical_type,
            raw_type,
            primary_key: descriptor.primary_key,
            sequence: descriptor.sequence,
            converter,
        })
    }

    /// Returns the bound driver.
    pub fn driver(&self) -> &DriverRef {
        &self.driver
    }

    /// Returns the mapping declaration.
    pub fn descriptor(&self) -> &Arc<MappingDescriptor> {
        &self.descriptor
    }

    /// Returns the resolved fields, ancestors first.
    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// Returns the assembled physical collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Returns the resolved field whose model alias matches `reference`.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if no field carries that alias.
    pub fn field_by_reference(&self, reference: &str) -> DataSourceResult<&MappedField> {
        self.fields
            .iter()
            .find(|field| field.reference == reference)
            .ok_or_else(|| {
                DataSourceError::FieldNotFound(format!(
                    "{}.{}",
                    self.collection.name(),
                    reference
                ))
            })
    }

    /// Parses a human-authored filter document into a query, then applies
    /// skip, limit and ordering from the options.
    ///
    /// The `translator` callback is the seam where model field aliases are
    /// mapped to storage names and values are converted; it receives every
    /// comparison leaf.
    ///
    /// # Errors
    ///
    /// Returns the grammar errors documented on the
    /// [module](self#filter-grammar): `UnknownOperator`,
    /// `MultipleFieldsInBranch`, `FieldRequired`, plus `Validation` for
    /// malformed operator payloads and anything the translator raises.
    pub fn parse_user_query<F>(
        &self,
        filter: &Document,
        options: &QueryOptions,
        translator: &mut F,
    ) -> DataSourceResult<Query>
    where
        F: FnMut(&mut Query, &str, Operator, &Bson) -> DataSourceResult<()>,
    {
        let mut query = Query::new(self.collection.name())?;
        query.begin_where();
        self.parse_expression(&mut query, filter, translator, None)?;

        query.skip(options.skip);
        if let Some(limit) = options.limit {
            query.limit(limit)?;
        }
        for order in &options.order_by {
            query.order_by(order.field.clone(), order.order)?;
        }

        Ok(query)
    }

    /// Parses one expression document into the currently open branch.
    ///
    /// `field` is the open field branch inherited from the enclosing level,
    /// if any; a second field key under it is a grammar error.
    pub fn parse_expression<F>(
        &self,
        query: &mut Query,
        expression: &Document,
        translator: &mut F,
        field: Option<&str>,
    ) -> DataSourceResult<()>
    where
        F: FnMut(&mut Query, &str, Operator, &Bson) -> DataSourceResult<()>,
    {
        for (key, value) in expression {
            if let Some(operator) = Operator::parse(key) {
                self.parse_operation(query, operator, value, translator, field)?;
            } else if key.starts_with('$') {
                return Err(DataSourceError::UnknownOperator(key.clone()));
            } else if let Some(open) = field {
                return Err(DataSourceError::MultipleFieldsInBranch {
                    open: open.to_string(),
                    current: key.clone(),
                });
            } else {
                match value {
                    Bson::Document(sub) => {
                        // A multi-entry sub-document is a conjunction; the
                        // wrapper keeps it one under an enclosing $or.
                        if sub.len() > 1 {
                            query.and()?;
                            self.parse_expression(query, sub, translator, Some(key))?;
                            query.end()?;
                        } else {
                            self.parse_expression(query, sub, translator, Some(key))?;
                        }
                    }
                    scalar => translator(query, key, Operator::Eq, scalar)?,
                }
            }
        }

        Ok(())
    }

    /// Parses one operator entry into the currently open branch.
    fn parse_operation<F>(
        &self,
        query: &mut Query,
        operator: Operator,
        value: &Bson,
        translator: &mut F,
        field: Option<&str>,
    ) -> DataSourceResult<()>
    where
        F: FnMut(&mut Query, &str, Operator, &Bson) -> DataSourceResult<()>,
    {
        match operator {
            Operator::And | Operator::Or => {
                if operator == Operator::And {
                    query.and()?;
                } else {
                    query.or()?;
                }
                match value {
                    Bson::Array(children) => {
                        for child in children {
                            let Bson::Document(sub) = child else {
                                return Err(DataSourceError::Validation(format!(
                                    "`{operator}` expects sub-expression documents"
                                )));
                            };
                            self.parse_expression(query, sub, translator, field)?;
                        }
                    }
                    Bson::Document(sub) => {
                        self.parse_expression(query, sub, translator, field)?;
                    }
                    _ => {
                        return Err(DataSourceError::Validation(format!(
                            "`{operator}` expects an array of sub-expressions"
                        )));
                    }
                }
                query.end()?;
            }
            Operator::Not => {
                query.not()?;
                let Bson::Document(sub) = value else {
                    return Err(DataSourceError::Validation(
                        "`$not` expects a sub-expression document".into(),
                    ));
                };
                self.parse_expression(query, sub, translator, field)?;
                query.end()?;
            }
            comparison => {
                let field = field.ok_or_else(|| {
                    DataSourceError::FieldRequired(comparison.as_str().to_string())
                })?;
                translator(query, field, comparison, value)?;
            }
        }

        Ok(())
    }

    /// Converts a two-level value map into store representation, applying
    /// each field's converter per value.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound`/`FieldNotFound` for unrecognized names
    /// and propagates converter failures.
    pub fn convert_to(schema: &Schema, data: &DataMap) -> DataSourceResult<DataMap> {
        Self::convert(schema, data, true)
    }

    /// Converts a two-level value map back into model representation.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound`/`FieldNotFound` for unrecognized names
    /// and propagates converter failures.
    pub fn convert_from(schema: &Schema, data: &DataMap) -> DataSourceResult<DataMap> {
        Self::convert(schema, data, false)
    }

    fn convert(schema: &Schema, data: &DataMap, to_raw: bool) -> DataSourceResult<DataMap> {
        let mut converted = DataMap::new();
        for (collection_name, fields) in data {
            let collection = schema.get_collection(collection_name)?;
            let mut converted_fields = HashMap::new();
            for (field_name, values) in fields {
                let converter = collection.get_field(field_name)?.converter();
                let values = values
                    .iter()
                    .map(|value| {
                        if to_raw {
                            converter.to_raw(value.clone())
                        } else {
                            converter.from_raw(value.clone())
                        }
                    })
                    .collect::<DataSourceResult<Vec<_>>>()?;
                converted_fields.insert(field_name.clone(), values);
            }
            converted.insert(collection_name.clone(), converted_fields);
        }

        Ok(converted)
    }

    /// Wraps a raw driver cursor so `next()` transparently builds model
    /// instances; exhaustion passes through unchanged.
    pub fn decorate_cursor<T, F>(cursor: Box<dyn Cursor<Document>>, build: F) -> MappedCursor<T>
    where
        T: Send + 'static,
        F: FnMut(Document) -> DataSourceResult<T> + Send + 'static,
    {
        MappedCursor { inner: cursor, build: Box::new(build) }
    }
}

/// A driver cursor decorated with per-document model construction.
pub struct MappedCursor<T: Send + 'static> {
    inner: Box<dyn Cursor<Document>>,
    build: Box<dyn FnMut(Document) -> DataSourceResult<T> + Send>,
}

#[async_trait]
impl<T: Send + 'static> Cursor<T> for MappedCursor<T> {
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn next(&mut self) -> DataSourceResult<Option<T>> {
        match self.inner.next().await? {
            Some(document) => Ok(Some((self.build)(document)?)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> DataSourceResult<()> {
        self.inner.close().await
    }
}

/// Persistence strategy binding one model type to one collection.
///
/// `find_one` returns `Ok(None)` when nothing matches; absence is never an
/// error. `create` may write driver-assigned fields (sequences) back to the
/// instance.
#[async_trait]
pub trait Mapping: Send + Sync {
    /// The model type this mapping persists.
    type Model: Send + 'static;

    /// Creates an empty query against the mapped collection, constrained to
    /// this mapping's discriminator values when it extends a virtual chain.
    fn create_query(&self) -> DataSourceResult<Query>;

    /// Builds a model instance from a raw store document.
    fn build(&self, document: Document) -> DataSourceResult<Self::Model>;

    /// Provisions the mapped collection, its indexes and foreign keys.
    async fn sync(&self) -> DataSourceResult<()>;

    /// Finds model instances matching the filter, honoring skip, limit and
    /// ordering from the options.
    async fn find(
        &self,
        filter: &Document,
        options: &QueryOptions,
    ) -> DataSourceResult<Box<dyn Cursor<Self::Model>>>;

    /// Finds at most one matching model instance.
    async fn find_one(&self, filter: &Document) -> DataSourceResult<Option<Self::Model>>;

    /// Persists a new instance, writing driver-assigned fields back to it.
    async fn create(&self, instance: &mut Self::Model) -> DataSourceResult<()>;

    /// Saves modifications to an existing instance, matched by primary key.
    async fn save(&self, instance: &Self::Model) -> DataSourceResult<()>;

    /// Removes the instance's stored document, matched by primary key.
    async fn remove(&self, instance: &Self::Model) -> DataSourceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    use crate::collection::{ForeignKey, Index};
    use crate::query::Expr;

    #[derive(Debug)]
    struct Passthrough;

    impl crate::converter::Converter for Passthrough {
        fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
            Ok(value)
        }

        fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
            Ok(value)
        }
    }

    /// Coerces every logical type to its own name and hands out passthrough
    /// converters.
    #[derive(Debug)]
    struct StubDriver;

    #[async_trait]
    impl crate::driver::Driver for StubDriver {
        fn coerce_type(&self, logical_type: LogicalType) -> DataSourceResult<String> {
            Ok(logical_type.as_str().to_string())
        }

        fn create_converter(&self, _raw_type: &str) -> DataSourceResult<ConverterRef> {
            Ok(Arc::new(Passthrough))
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

    fn users_mapper() -> Mapper {
        let descriptor = MappingDescriptor::new(MappingConfig {
            collection: "users".to_string(),
            fields: vec![
                FieldDescriptor {
                    primary_key: true,
                    sequence: Sequence::Auto,
                    ..FieldDescriptor::new("id", LogicalType::Integer)
                },
                FieldDescriptor::new("name", LogicalType::String),
                FieldDescriptor::new("age", LogicalType::Integer),
            ],
            ..MappingConfig::default()
        })
        .unwrap();

        Mapper::new(Arc::new(StubDriver), Arc::new(descriptor)).unwrap()
    }

    fn passthrough_translator()
    -> impl FnMut(&mut Query, &str, Operator, &Bson) -> DataSourceResult<()> {
        |query: &mut Query, field: &str, operator: Operator, value: &Bson| {
            query.operation(field, operator, value.clone())?;
            Ok(())
        }
    }

    fn parse(mapper: &Mapper, filter: Document) -> DataSourceResult<Query> {
        mapper.parse_user_query(&filter, &QueryOptions::default(), &mut passthrough_translator())
    }

    fn leaf(field: &str, operator: Operator, value: impl Into<Bson>) -> Expr {
        Expr::Comparison { operator, field: field.to_string(), value: value.into() }
    }

    #[test]
    fn augmentation_derives_raw_type_and_converter() {
        let mapper = users_mapper();
        let id = mapper.field_by_reference("id").unwrap();
        assert_eq!(id.raw_type(), "integer");
        assert!(id.primary_key());

        let collection = mapper.collection();
        assert!(collection.has_field("id"));
        assert!(collection.has_field("name"));
    }

    #[test]
    fn scalar_and_operator_entries_parse_as_sibling_leaves() {
        let mapper = users_mapper();
        let query = parse(&mapper, doc! { "name": "alice", "age": { "$gt": 30 } }).unwrap();

        assert_eq!(
            query.where_clause(),
            Expr::And(vec![
                leaf("name", Operator::Eq, "alice"),
                leaf("age", Operator::Gt, 30),
            ])
        );
    }

    #[test]
    fn or_of_two_expressions_yields_one_or_branch() {
        let mapper = users_mapper();
        let query = parse(&mapper, doc! { "$or": [ { "a": 1 }, { "b": 2 } ] }).unwrap();

        assert_eq!(
            query.where_clause(),
            Expr::And(vec![Expr::Or(vec![
                leaf("a", Operator::Eq, 1),
                leaf("b", Operator::Eq, 2),
            ])])
        );
    }

    #[test]
    fn multi_entry_field_document_is_conjunctive_under_or() {
        let mapper = users_mapper();
        let query = parse(
            &mapper,
            doc! { "$or": [ { "age": { "$gt": 30, "$lt": 40 } }, { "age": 7 } ] },
        )
        .unwrap();

        assert_eq!(
            query.where_clause(),
            Expr::And(vec![Expr::Or(vec![
                Expr::And(vec![
                    leaf("age", Operator::Gt, 30),
                    leaf("age", Operator::Lt, 40),
                ]),
                leaf("age", Operator::Eq, 7),
            ])])
        );
    }

    #[test]
    fn second_field_inside_an_open_field_branch_is_rejected() {
        let mapper = users_mapper();
        let result = parse(&mapper, doc! { "a": 1, "b": { "c": 2 } });

        assert!(matches!(
            result,
            Err(DataSourceError::MultipleFieldsInBranch { open, current })
                if open == "b" && current == "c"
        ));
    }

    #[test]
    fn dollar_prefixed_unknown_key_is_rejected() {
        let mapper = users_mapper();
        assert!(matches!(
            parse(&mapper, doc! { "$nope": 1 }),
            Err(DataSourceError::UnknownOperator(key)) if key == "$nope"
        ));
    }

    #[test]
    fn comparison_without_a_field_is_rejected() {
        let mapper = users_mapper();
        assert!(matches!(
            parse(&mapper, doc! { "$gt": 5 }),
            Err(DataSourceError::FieldRequired(op)) if op == "$gt"
        ));
    }

    #[test]
    fn not_wraps_the_negated_expression() {
        let mapper = users_mapper();
        let query = parse(&mapper, doc! { "$not": { "age": 3 } }).unwrap();

        assert_eq!(
            query.where_clause(),
            Expr::And(vec![Expr::Not(Box::new(Expr::And(vec![leaf(
                "age",
                Operator::Eq,
                3
            )])))])
        );
    }

    #[test]
    fn options_apply_skip_limit_and_ordering() {
        let mapper = users_mapper();
        let options = QueryOptions {
            skip: 10,
            limit: Some(5),
            order_by: vec![Order::desc("age")],
        };
        let query = mapper
            .parse_user_query(&doc! {}, &options, &mut passthrough_translator())
            .unwrap();

        assert_eq!(query.offset(), 10);
        assert_eq!(query.fetch_size(), Some(5));
        assert_eq!(query.orders(), [Order::desc("age")]);
    }

    #[test]
    fn unbounded_limit_options_leave_the_query_unbounded() {
        let mapper = users_mapper();
        let options = QueryOptions { limit: Some(-1), ..QueryOptions::default() };
        let query = mapper
            .parse_user_query(&doc! {}, &options, &mut passthrough_translator())
            .unwrap();

        assert_eq!(query.fetch_size(), None);
    }

    #[test]
    fn extending_a_non_virtual_mapping_is_rejected() {
        let parent = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "people".to_string(),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        let result = MappingDescriptor::new(MappingConfig {
            collection: "people".to_string(),
            extend: Some(parent),
            ..MappingConfig::default()
        });

        assert!(matches!(result, Err(DataSourceError::Validation(_))));
    }

    #[test]
    fn missing_ancestor_discriminator_value_is_rejected() {
        let parent = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "people".to_string(),
                discriminator: Some("kind".to_string()),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        let result = MappingDescriptor::new(MappingConfig {
            collection: "people".to_string(),
            extend: Some(parent),
            ..MappingConfig::default()
        });

        assert!(matches!(
            result,
            Err(DataSourceError::MissingDiscriminatorValue(field)) if field == "kind"
        ));
    }

    #[test]
    fn collected_fields_walk_ancestors_before_local_fields() {
        let parent = Arc::new(
            MappingDescriptor::new(MappingConfig {
                collection: "people".to_string(),
                fields: vec![FieldDescriptor::new("id", LogicalType::Integer)],
                discriminator: Some("kind".to_string()),
                ..MappingConfig::default()
            })
            .unwrap(),
        );

        let child = MappingDescriptor::new(MappingConfig {
            collection: "people".to_string(),
            fields: vec![FieldDescriptor::new("grade", LogicalType::Integer)],
            extend: Some(parent),
            discriminator_values: HashMap::from([("kind".to_string(), Bson::from("student"))]),
            ..MappingConfig::default()
        })
        .unwrap();

        let names: Vec<&str> = child.collect_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "grade"]);
        assert_eq!(child.discriminators(), [("kind", &Bson::from("student"))]);
    }

    #[test]
    fn data_map_conversion_looks_up_schema_names() {
        let mapper = users_mapper();
        let mut schema = Schema::new();
        schema.add_collection(mapper.collection().clone()).unwrap();

        let data = DataMap::from([(
            "users".to_string(),
            HashMap::from([("age".to_string(), vec![Bson::from(1), Bson::from(2)])]),
        )]);

        let converted = Mapper::convert_to(&schema, &data).unwrap();
        assert_eq!(converted["users"]["age"], vec![Bson::from(1), Bson::from(2)]);

        let missing = DataMap::from([("ghosts".to_string(), HashMap::new())]);
        assert!(matches!(
            Mapper::convert_from(&schema, &missing),
            Err(DataSourceError::CollectionNotFound(_))
        ));
    }
}
