use crate::{Result, Row, Value};

/// A physical, blocking database connection supplied by a driver.
///
/// Every call may block the calling thread. The executor performs them on whatever
/// context polls the result stream.
pub trait Connection: Send + 'static {
    type Statement: Statement;

    /// Prepare a single statement. The SQL only contains positional `?` placeholders.
    fn prepare(&mut self, sql: &str) -> Result<Self::Statement>;

    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Physically close the connection.
    fn close(self) -> Result<()>;
}

/// A prepared statement, executable many times with different values.
pub trait Statement: Send + 'static {
    type Cursor: Cursor;

    /// Bind `values` positionally (the first value to the first placeholder) and execute.
    fn execute(&mut self, values: &[Value]) -> Result<Self::Cursor>;

    /// Dispose of the statement. Cursors obtained from it are closed before this is called.
    fn close(self) -> Result<()>;
}

/// Forward only cursor over the rows of one execution.
pub trait Cursor: Send + 'static {
    /// Advance by exactly one row, `None` once the rows are exhausted.
    fn fetch(&mut self) -> Result<Option<Row>>;

    fn close(self) -> Result<()>;
}

/// Supplier of fresh physical connections.
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: Connection;

    fn connection(&self) -> Result<Self::Connection>;
}

impl<C, F> ConnectionSource for F
where
    C: Connection,
    F: Fn() -> Result<C> + Send + Sync + 'static,
{
    type Connection = C;

    fn connection(&self) -> Result<C> {
        self()
    }
}
