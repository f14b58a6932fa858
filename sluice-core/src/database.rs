use crate::{
    Connection, ConnectionHandle, ConnectionSource, Result, SelectBuilder, TransactedSelectBuilder,
    Tx, builder::Connector,
};
use std::{fmt, sync::Arc};

/// Entry point: builds queries over the connections of a [`ConnectionSource`].
pub struct Database<C: Connection> {
    source: Arc<dyn ConnectionSource<Connection = C>>,
}

impl<C: Connection> Database<C> {
    pub fn new(source: impl ConnectionSource<Connection = C>) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Start a query. Each query opens its own connection on first demand and closes it
    /// when its stream terminates.
    pub fn select(&self, sql: &str) -> Result<SelectBuilder<C>> {
        SelectBuilder::new(Connector::Source(self.source.clone()), sql)
    }

    /// Queries joining the transaction `tx` belongs to.
    pub fn tx<T>(&self, tx: &Tx<C, T>) -> TxDatabase<C> {
        TxDatabase {
            connection: tx.connection().clone(),
        }
    }
}

impl<C: Connection> Clone for Database<C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<C: Connection> fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Builds queries sharing one transacted connection.
pub struct TxDatabase<C: Connection> {
    connection: ConnectionHandle<C>,
}

impl<C: Connection> TxDatabase<C> {
    pub fn new(connection: ConnectionHandle<C>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &ConnectionHandle<C> {
        &self.connection
    }

    pub fn select(&self, sql: &str) -> Result<TransactedSelectBuilder<C>> {
        TransactedSelectBuilder::shared(self.connection.clone(), sql)
    }
}
