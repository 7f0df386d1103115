//! Error types and result alias for data source operations.
//!
//! Every fallible operation in this crate returns [`DataSourceResult<T>`].
//! The core performs no retries: driver failures are surfaced unchanged and
//! retry policy belongs entirely to the driver implementation.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors raised by the data source core.
///
/// This enum covers descriptor and query-option validation, metadata lookup
/// failures, query-builder misuse, filter-expression parsing errors, and
/// errors propagated from drivers and converters.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// Malformed configuration, descriptor or query-options input.
    #[error("validation error: {0}")]
    Validation(String),
    /// The requested collection does not exist in the schema.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    /// The requested field does not exist in the collection.
    #[error("field not found: {0}")]
    FieldNotFound(String),
    /// The requested index does not exist in the collection.
    #[error("index not found: {0}")]
    IndexNotFound(String),
    /// The requested foreign key does not exist in the collection.
    #[error("foreign key not found: {0}")]
    ForeignKeyNotFound(String),
    /// A field, index, foreign key or collection with this name already exists.
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// A builder call was issued outside an open where clause.
    #[error("empty where-clause stack")]
    EmptyWhereStack,
    /// Two sibling field keys were found at the same filter-expression nesting level.
    #[error("only one field authorized per tree branch: `{current}` conflicts with open branch `{open}`")]
    MultipleFieldsInBranch {
        /// The field branch already open at this nesting level.
        open: String,
        /// The second field key encountered in the same branch.
        current: String,
    },
    /// A comparison operator was used without an associated field.
    #[error("field required for operator {0}")]
    FieldRequired(String),
    /// An operator key outside the recognized set.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    /// An extending mapping omits a discriminator value required by an ancestor.
    #[error("missing discriminator value for `{0}`")]
    MissingDiscriminatorValue(String),
    /// A logical or raw type the driver cannot coerce or convert.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// A value could not be converted between model and store representations.
    #[error("conversion error: {0}")]
    Conversion(String),
    /// An error raised by the underlying driver.
    #[error("driver error: {0}")]
    Driver(String),
    /// Serialization/deserialization error when converting model instances.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for data source operations.
pub type DataSourceResult<T> = Result<T, DataSourceError>;

impl From<BsonError> for DataSourceError {
    fn from(err: BsonError) -> Self {
        DataSourceError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DataSourceError {
    fn from(err: serde_json::Error) -> Self {
        DataSourceError::Serialization(err.to_string())
    }
}
