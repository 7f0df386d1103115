//! Schema metadata: collections and their fields, indexes and foreign keys.
//!
//! A [`Collection`] describes the physical shape of one storage collection.
//! Descriptors go in as plain config structs ([`FieldConfig`],
//! [`IndexConfig`], [`ForeignKeyConfig`]); validated, immutable values come
//! out ([`Field`], [`Index`], [`ForeignKey`]). Once added, a descriptor can
//! never be mutated or removed.

use indexmap::IndexMap;

use crate::converter::ConverterRef;
use crate::error::{DataSourceError, DataSourceResult};
use crate::types::LogicalType;

/// Sequence behavior of a field.
///
/// Sequence fields are populated by the driver on
/// [`create`](crate::driver::Driver::create); the assigned value is written
/// back to the model instance by the mapping layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sequence {
    /// Not a sequence field.
    #[default]
    None,
    /// Driver-managed sequence with a driver-chosen name.
    Auto,
    /// Driver-managed sequence with an explicit name.
    Named(String),
}

impl Sequence {
    /// Returns whether the driver assigns this field's value.
    pub fn is_generated(&self) -> bool {
        !matches!(self, Sequence::None)
    }
}

/// Descriptor used to add a field to a collection.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Field name, unique within the collection.
    pub name: String,
    /// Logical field type.
    pub logical_type: LogicalType,
    /// Physical raw type, as understood by the driver.
    pub raw_type: String,
    /// Value converter between model and store representations.
    pub converter: ConverterRef,
    /// Whether the field is part of the primary key.
    pub primary_key: bool,
    /// Sequence behavior.
    pub sequence: Sequence,
}

/// An immutable collection field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    logical_type: LogicalType,
    raw_type: String,
    converter: ConverterRef,
    primary_key: bool,
    sequence: Sequence,
}

impl Field {
    fn new(config: FieldConfig) -> DataSourceResult<Self> {
        if config.name.is_empty() {
            return Err(DataSourceError::Validation("field name is empty".into()));
        }
        if config.raw_type.is_empty() {
            return Err(DataSourceError::Validation(format!(
                "field `{}` has an empty raw type",
                config.name
            )));
        }

        Ok(Field {
            name: config.name,
            logical_type: config.logical_type,
            raw_type: config.raw_type,
            converter: config.converter,
            primary_key: config.primary_key,
            sequence: config.sequence,
        })
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logical field type.
    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    /// Returns the driver raw type.
    pub fn raw_type(&self) -> &str {
        &self.raw_type
    }

    /// Returns the field converter.
    pub fn converter(&self) -> &ConverterRef {
        &self.converter
    }

    /// Returns whether the field is part of the primary key.
    pub fn primary_key(&self) -> bool {
        self.primary_key
    }

    /// Returns the sequence behavior of this field.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}

/// Descriptor used to add an index to a collection.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    /// Index name. Derived from the collection and field names when absent.
    pub name: Option<String>,
    /// Ordered indexed field names, at least one.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// An immutable collection index.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    fields: Vec<String>,
    unique: bool,
}

impl Index {
    fn new(collection: &str, config: IndexConfig) -> DataSourceResult<Self> {
        if config.fields.is_empty() {
            return Err(DataSourceError::Validation(
                "index requires at least one field".into(),
            ));
        }
        if config.fields.iter().any(|field| field.is_empty()) {
            return Err(DataSourceError::Validation("index field name is empty".into()));
        }

        let name = match config.name {
            Some(name) if !name.is_empty() => name,
            Some(_) => return Err(DataSourceError::Validation("index name is empty".into())),
            None => derived_name(collection, &config.fields),
        };

        Ok(Index { name, fields: config.fields, unique: config.unique })
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed field names, in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns whether the index enforces uniqueness.
    pub fn unique(&self) -> bool {
        self.unique
    }
}

/// Target endpoint of a foreign key: a collection and one of its fields.
///
/// The collection is referenced by name, not by embedding: the owning
/// collection does not own the referenced one and resolves it through the
/// schema at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    /// Target collection name.
    pub collection: String,
    /// Target field name.
    pub field: String,
}

/// Descriptor used to add a foreign key to a collection.
#[derive(Debug, Clone)]
pub struct ForeignKeyConfig {
    /// Foreign key name. Derived from the collection and field names when absent.
    pub name: Option<String>,
    /// Local field name.
    pub field: String,
    /// Referenced collection and field.
    pub target: ForeignKeyTarget,
}

/// An immutable collection foreign key.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    name: String,
    field: String,
    target: ForeignKeyTarget,
}

impl ForeignKey {
    fn new(collection: &str, config: ForeignKeyConfig) -> DataSourceResult<Self> {
        if config.field.is_empty() {
            return Err(DataSourceError::Validation(
                "foreign key field name is empty".into(),
            ));
        }
        if config.target.collection.is_empty() || config.target.field.is_empty() {
            return Err(DataSourceError::Validation(
                "foreign key target is incomplete".into(),
            ));
        }

        let name = match config.name {
            Some(name) if !name.is_empty() => name,
            Some(_) => {
                return Err(DataSourceError::Validation("foreign key name is empty".into()));
            }
            None => derived_name(collection, std::slice::from_ref(&config.field)),
        };

        Ok(ForeignKey { name, field: config.field, target: config.target })
    }

    /// Returns the foreign key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the local field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the referenced collection and field.
    pub fn target(&self) -> &ForeignKeyTarget {
        &self.target
    }
}

/// Default name for unnamed indexes and foreign keys:
/// `collection + '.' + fields.join('.')`.
fn derived_name(collection: &str, fields: &[String]) -> String {
    format!("{}.{}", collection, fields.join("."))
}

/// Physical schema of one storage collection.
///
/// Created with a name, then populated incrementally through
/// [`add_field`](Collection::add_field), [`add_index`](Collection::add_index)
/// and [`add_foreign_key`](Collection::add_foreign_key). Each name can be
/// added at most once. Iteration order is insertion order.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    fields: IndexMap<String, Field>,
    indexes: IndexMap<String, Index>,
    foreign_keys: IndexMap<String, ForeignKey>,
}

impl Collection {
    /// Creates a new empty collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the name is empty.
    pub fn new(name: impl Into<String>) -> DataSourceResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DataSourceError::Validation("collection name is empty".into()));
        }

        Ok(Collection {
            name,
            fields: IndexMap::new(),
            indexes: IndexMap::new(),
            foreign_keys: IndexMap::new(),
        })
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the collection fields, in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Returns the collection indexes, in insertion order.
    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Returns the collection foreign keys, in insertion order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.values()
    }

    /// Returns whether a field with the given name exists. Never fails.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns the field with the given name.
    ///
    /// # Errors
    ///
    /// Returns `FieldNotFound` if the field doesn't exist.
    pub fn get_field(&self, name: &str) -> DataSourceResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| DataSourceError::FieldNotFound(format!("{}.{}", self.name, name)))
    }

    /// Validates and adds a field to this collection.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if a field with the same name was already
    /// added, or a `Validation` error if the descriptor is malformed.
    pub fn add_field(&mut self, config: FieldConfig) -> DataSourceResult<()> {
        let field = Field::new(config)?;
        if self.fields.contains_key(field.name()) {
            return Err(DataSourceError::DuplicateName(format!(
                "field `{}` already present in collection `{}`",
                field.name(),
                self.name
            )));
        }

        self.fields.insert(field.name().to_string(), field);
        Ok(())
    }

    /// Returns the index with the given name.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the index doesn't exist.
    pub fn get_index(&self, name: &str) -> DataSourceResult<&Index> {
        self.indexes
            .get(name)
            .ok_or_else(|| DataSourceError::IndexNotFound(name.to_string()))
    }

    /// Validates and adds an index to this collection, deriving a name when
    /// the descriptor carries none.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if an index with the same name was already
    /// added, or a `Validation` error if the descriptor is malformed.
    pub fn add_index(&mut self, config: IndexConfig) -> DataSourceResult<()> {
        let index = Index::new(&self.name, config)?;
        if self.indexes.contains_key(index.name()) {
            return Err(DataSourceError::DuplicateName(format!(
                "index `{}` already present in collection `{}`",
                index.name(),
                self.name
            )));
        }

        self.indexes.insert(index.name().to_string(), index);
        Ok(())
    }

    /// Returns the foreign key with the given name.
    ///
    /// # Errors
    ///
    /// Returns `ForeignKeyNotFound` if the foreign key doesn't exist.
    pub fn get_foreign_key(&self, name: &str) -> DataSourceResult<&ForeignKey> {
        self.foreign_keys
            .get(name)
            .ok_or_else(|| DataSourceError::ForeignKeyNotFound(name.to_string()))
    }

    /// Validates and adds a foreign key to this collection, deriving a name
    /// when the descriptor carries none.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if a foreign key with the same name was
    /// already added, or a `Validation` error if the descriptor is malformed.
    pub fn add_foreign_key(&mut self, config: ForeignKeyConfig) -> DataSourceResult<()> {
        let foreign_key = ForeignKey::new(&self.name, config)?;
        if self.foreign_keys.contains_key(foreign_key.name()) {
            return Err(DataSourceError::DuplicateName(format!(
                "foreign key `{}` already present in collection `{}`",
                foreign_key.name(),
                self.name
            )));
        }

        self.foreign_keys
            .insert(foreign_key.name().to_string(), foreign_key);
        Ok(())
    }
}
