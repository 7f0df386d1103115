//! Convenient re-exports of commonly used types from datalayer.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use datalayer::prelude::*;
//! ```

pub use datalayer_core::{
    collection::{Collection, FieldConfig, ForeignKeyConfig, ForeignKeyTarget, IndexConfig, Sequence},
    converter::{Converter, ConverterRef},
    cursor::Cursor,
    datasource::DataSource,
    driver::{Driver, DriverRef},
    error::{DataSourceError, DataSourceResult},
    mapping::{
        FieldDescriptor, Mapper, Mapping, MappingConfig, MappingDescriptor, QueryOptions,
    },
    model::{Model, ModelExt, ModelMapping},
    query::{Expr, Query, QueryVisitor},
    schema::Schema,
    types::{LogicalType, Operator, Order, SortOrder},
};
