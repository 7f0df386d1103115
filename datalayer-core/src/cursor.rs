//! Lazy, sequential iteration over driver query results.

use async_trait::async_trait;

use crate::error::DataSourceResult;

/// Lazy sequence abstraction over driver results.
///
/// Drivers return `Cursor<Document>`; the mapping layer decorates it into a
/// cursor of model instances. Exhaustion is signaled by `next()` returning
/// `None`, which is not an error and may be observed repeatedly.
#[async_trait]
pub trait Cursor<T: Send + 'static>: Send {
    /// Returns whether this cursor has been closed.
    fn is_closed(&self) -> bool;

    /// Returns the next item, or `None` once the cursor is exhausted.
    async fn next(&mut self) -> DataSourceResult<Option<T>>;

    /// Closes this cursor, releasing any driver resources it holds.
    async fn close(&mut self) -> DataSourceResult<()>;

    /// Invokes the callback once per remaining item, in order, until
    /// exhaustion.
    ///
    /// Items are fetched strictly sequentially: the next `next()` call is
    /// only issued after the previous item's callback has returned, so at
    /// most one item is in flight and delivery order matches store order.
    async fn each(&mut self, callback: &mut (dyn FnMut(T) + Send)) -> DataSourceResult<()> {
        while let Some(item) = self.next().await? {
            callback(item);
        }

        Ok(())
    }
}
