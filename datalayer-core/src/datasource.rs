//! Top-level facade binding one driver to one schema.

use std::sync::Arc;
use tracing::debug;

use crate::driver::DriverRef;
use crate::error::DataSourceResult;
use crate::schema::Schema;

/// Entry point for applications: one driver, one schema.
///
/// Cloning is cheap; all clones share the same driver and schema.
#[derive(Debug, Clone)]
pub struct DataSource {
    driver: DriverRef,
    schema: Arc<Schema>,
}

impl DataSource {
    /// Binds a driver to a schema.
    pub fn new(driver: DriverRef, schema: Schema) -> Self {
        DataSource { driver, schema: Arc::new(schema) }
    }

    /// Returns the bound driver.
    pub fn driver(&self) -> &DriverRef {
        &self.driver
    }

    /// Returns the bound schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Provisions every collection, index and foreign key in the schema.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the driver.
    pub async fn sync(&self) -> DataSourceResult<()> {
        self.schema.sync(self.driver.as_ref()).await
    }

    /// Closes the underlying driver, releasing all resources.
    pub async fn close(&self) -> DataSourceResult<()> {
        debug!("closing data source");
        self.driver.close().await
    }
}
