use crate::{Connection, ConnectionHandle};
use std::fmt;

/// An item of a transacted stream.
///
/// Every value travels with the connection it was read on, so follow up queries can
/// join the same transaction through [`crate::Database::tx`].
pub enum Tx<C: Connection, T> {
    Value {
        value: T,
        connection: ConnectionHandle<C>,
    },
    /// The query released the connection, and committed when it was the last holder.
    Completed { connection: ConnectionHandle<C> },
}

impl<C: Connection, T> Tx<C, T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Tx::Value { value, .. } => Some(value),
            Tx::Completed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Tx::Value { value, .. } => Some(value),
            Tx::Completed { .. } => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Tx::Value { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Tx::Completed { .. })
    }

    pub fn connection(&self) -> &ConnectionHandle<C> {
        match self {
            Tx::Value { connection, .. } | Tx::Completed { connection } => connection,
        }
    }
}

impl<C: Connection, T: fmt::Debug> fmt::Debug for Tx<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tx::Value { value, connection } => f
                .debug_struct("Value")
                .field("value", value)
                .field("connection", connection)
                .finish(),
            Tx::Completed { connection } => f
                .debug_struct("Completed")
                .field("connection", connection)
                .finish(),
        }
    }
}
