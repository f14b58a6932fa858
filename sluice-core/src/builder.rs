use crate::{
    Binding, Connection, ConnectionHandle, ConnectionSource, FromRow, Parameter, ParameterGroups,
    QueryRequest, Result, Row, Select, SqlInfo, Tx, Value, parameter_groups, select,
};
use async_stream::try_stream;
use futures::{Stream, StreamExt, TryStreamExt, stream};
use std::{fmt, sync::Arc};

/// Where a query gets its connection from.
pub(crate) enum Connector<C: Connection> {
    /// A fresh connection per query.
    Source(Arc<dyn ConnectionSource<Connection = C>>),
    /// A connection already shared by a transaction chain.
    Shared(ConnectionHandle<C>),
}

impl<C: Connection> Connector<C> {
    fn handle(&self, transacted: bool) -> ConnectionHandle<C> {
        match self {
            Connector::Source(source) => ConnectionHandle::from_source(source, transacted),
            Connector::Shared(handle) => handle.clone(),
        }
    }
}

/// Fluent configuration of one query.
///
/// Binding calls fail right away with a configuration error when the values do not fit
/// the SQL, no connection is touched until the resulting stream is polled.
pub struct SelectBuilder<C: Connection> {
    connector: Connector<C>,
    info: Arc<SqlInfo>,
    binding: Binding,
}

impl<C: Connection> SelectBuilder<C> {
    pub(crate) fn new(connector: Connector<C>, sql: &str) -> Result<Self> {
        Ok(Self {
            connector,
            info: SqlInfo::parse(sql)?,
            binding: Binding::Unbound,
        })
    }

    pub fn info(&self) -> &SqlInfo {
        &self.info
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Bind a flat list of values, split in groups of the declared parameter count.
    ///
    /// Every value must be named (see [`Parameter::named`]) when the SQL uses named
    /// placeholders. Repeated calls concatenate.
    pub fn parameters<I>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Parameter>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.binding.flat(&self.info, values)?;
        Ok(self)
    }

    /// Bind one named value. Values are grouped when the query executes.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.binding
            .named(&self.info, Parameter::named(name, value))?;
        Ok(self)
    }

    /// Append one explicit group of values, in placeholder order.
    pub fn parameter_list<I>(self, group: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let group: Vec<Value> = group.into_iter().map(Into::into).collect();
        self.parameter_groups(stream::iter([Ok(group)]).boxed())
    }

    /// Append a stream of groups, each one in placeholder order.
    pub fn parameter_stream<S, G>(self, groups: S) -> Result<Self>
    where
        S: Stream<Item = Result<G>> + Send + 'static,
        G: IntoIterator,
        G::Item: Into<Value>,
    {
        self.parameter_groups(parameter_groups(groups))
    }

    fn parameter_groups(mut self, groups: ParameterGroups) -> Result<Self> {
        self.binding.streamed(groups)?;
        Ok(self)
    }

    fn request<T>(
        self,
        mapper: impl FnMut(&Row) -> Result<T> + Send + 'static,
    ) -> Result<(Connector<C>, QueryRequest<T>)> {
        let groups = self.binding.resolve(&self.info)?;
        Ok((
            self.connector,
            QueryRequest {
                info: self.info,
                groups,
                mapper: Box::new(mapper),
            },
        ))
    }

    /// Stream the rows decoded with `mapper`.
    pub fn get<T: 'static>(
        self,
        mapper: impl FnMut(&Row) -> Result<T> + Send + 'static,
    ) -> Result<Select<C, T>> {
        let (connector, request) = self.request(mapper)?;
        Ok(select(connector.handle(false), request))
    }

    /// Stream the rows decoded as `T`.
    pub fn get_as<T: FromRow + 'static>(self) -> Result<Select<C, T>> {
        self.get(T::from_row)
    }

    /// Run the query inside a transaction, committed once the stream completes.
    pub fn transacted(self) -> TransactedSelectBuilder<C> {
        TransactedSelectBuilder {
            builder: self,
            values_only: false,
        }
    }
}

impl<C: Connection> fmt::Debug for SelectBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectBuilder")
            .field("sql", &self.info.sql())
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// A [`SelectBuilder`] whose stream yields [`Tx`] items carrying the transacted connection.
pub struct TransactedSelectBuilder<C: Connection> {
    builder: SelectBuilder<C>,
    values_only: bool,
}

impl<C: Connection> TransactedSelectBuilder<C> {
    pub(crate) fn shared(handle: ConnectionHandle<C>, sql: &str) -> Result<Self> {
        Ok(SelectBuilder::new(Connector::Shared(handle), sql)?.transacted())
    }

    pub fn parameters<I>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Parameter>,
    {
        self.builder = self.builder.parameters(values)?;
        Ok(self)
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.builder = self.builder.parameter(name, value)?;
        Ok(self)
    }

    pub fn parameter_list<I>(mut self, group: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.builder = self.builder.parameter_list(group)?;
        Ok(self)
    }

    pub fn parameter_stream<S, G>(mut self, groups: S) -> Result<Self>
    where
        S: Stream<Item = Result<G>> + Send + 'static,
        G: IntoIterator,
        G::Item: Into<Value>,
    {
        self.builder = self.builder.parameter_stream(groups)?;
        Ok(self)
    }

    /// Do not emit the final [`Tx::Completed`] item.
    pub fn values_only(mut self) -> Self {
        self.values_only = true;
        self
    }

    /// Stream the rows decoded with `mapper`, followed by [`Tx::Completed`] once the
    /// connection was released (and the transaction committed, if this query owned it).
    pub fn get<T: Send + 'static>(
        self,
        mapper: impl FnMut(&Row) -> Result<T> + Send + 'static,
    ) -> Result<impl Stream<Item = Result<Tx<C, T>>> + Send + 'static> {
        let values_only = self.values_only;
        let (connector, request) = self.builder.request(mapper)?;
        let connection = connector.handle(true);
        let mut rows = select(connection.clone(), request);
        Ok(try_stream! {
            while let Some(value) = rows.try_next().await? {
                yield Tx::Value {
                    value,
                    connection: connection.clone(),
                };
            }
            if !values_only {
                yield Tx::Completed { connection };
            }
        })
    }

    pub fn get_as<T: FromRow + Send + 'static>(
        self,
    ) -> Result<impl Stream<Item = Result<Tx<C, T>>> + Send + 'static> {
        self.get(T::from_row)
    }
}
