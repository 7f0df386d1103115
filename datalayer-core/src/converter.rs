//! Bidirectional value conversion between model and store representations.
//!
//! Every collection field owns exactly one converter. Drivers create them
//! per raw type through
//! [`Driver::create_converter`](crate::driver::Driver::create_converter).

use bson::Bson;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::DataSourceResult;

/// A polymorphic value transformer with two directions.
///
/// Both directions must be pure, and the pair must be inverse on the value
/// domain of the field's logical type: for any valid `v`,
/// `from_raw(to_raw(v)?)? == v`. The mapping layer relies on this law when
/// it round-trips documents through a driver.
pub trait Converter: Send + Sync + Debug {
    /// Converts a model value to its data source representation.
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson>;

    /// Converts a data source value back to its model representation.
    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson>;
}

/// Shared handle to a converter, cloned into every field that uses it.
pub type ConverterRef = Arc<dyn Converter>;
