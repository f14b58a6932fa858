use crate::{
    Connection, ConnectionHandle, Cursor, Error, Generated, Generator, Lease, Outcome,
    ParameterGroups, Result, Row, SqlInfo, Statement,
    error::{execution, mapping},
    truncate_long,
    util::attach,
};
use futures::StreamExt;
use std::{
    fmt,
    sync::Arc,
    task::{Context, Poll},
};

/// Caller supplied decoder of one result row.
pub type RowMapper<T> = Box<dyn FnMut(&Row) -> Result<T> + Send>;

/// Everything one execution needs: the analyzed SQL, its parameter groups and the row mapper.
pub struct QueryRequest<T> {
    pub info: Arc<SqlInfo>,
    pub groups: ParameterGroups,
    pub mapper: RowMapper<T>,
}

impl<T> fmt::Debug for QueryRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRequest")
            .field("sql", &self.info.sql())
            .finish_non_exhaustive()
    }
}

/// Resources held while rows are being produced.
pub struct SelectState<C: Connection> {
    lease: Lease<C>,
    statement: Option<C::Statement>,
    cursor: Option<<C::Statement as Statement>::Cursor>,
}

/// Executes a [`QueryRequest`] group after group, mapping one row per pull.
pub struct SelectGenerator<C: Connection, T> {
    handle: ConnectionHandle<C>,
    request: QueryRequest<T>,
}

impl<C: Connection, T> SelectGenerator<C, T> {
    pub fn new(handle: ConnectionHandle<C>, request: QueryRequest<T>) -> Self {
        Self { handle, request }
    }

    pub fn handle(&self) -> &ConnectionHandle<C> {
        &self.handle
    }

    pub fn sql(&self) -> &str {
        self.request.info.sql()
    }
}

impl<C: Connection, T> Generator for SelectGenerator<C, T> {
    type State = SelectState<C>;
    type Item = T;

    fn open(&mut self) -> Result<SelectState<C>> {
        log::debug!("Opening query `{}`", truncate_long!(self.sql()));
        Ok(SelectState {
            lease: self.handle.acquire()?,
            statement: None,
            cursor: None,
        })
    }

    fn pull(
        &mut self,
        state: &mut SelectState<C>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<T>>> {
        loop {
            if let Some(cursor) = &mut state.cursor {
                match cursor.fetch() {
                    Ok(Some(row)) => {
                        return Poll::Ready(
                            (self.request.mapper)(&row)
                                .map(Some)
                                .map_err(|e| mapping(e, "Could not decode the row")),
                        );
                    }
                    Ok(None) => {
                        if let Some(cursor) = state.cursor.take()
                            && let Err(e) = cursor.close()
                        {
                            return Poll::Ready(Err(execution(e, "Could not close the cursor")));
                        }
                    }
                    Err(e) => {
                        return Poll::Ready(Err(execution(
                            e,
                            format!(
                                "Could not fetch a row from `{}`",
                                truncate_long!(self.sql())
                            ),
                        )));
                    }
                }
            }
            let group = match self.request.groups.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(Ok(None)),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(Some(Ok(group))) => group,
            };
            if state.statement.is_none() {
                let info = &self.request.info;
                let statement = state
                    .lease
                    .with_connection(|c| c.prepare(info.parsed_sql()))
                    .map_err(|e| {
                        execution(
                            e,
                            format!("Could not prepare `{}`", truncate_long!(info.sql())),
                        )
                    });
                match statement {
                    Ok(statement) => {
                        log::debug!("Prepared `{}`", truncate_long!(info.sql()));
                        state.statement = Some(statement);
                    }
                    Err(e) => return Poll::Ready(Err(e)),
                }
            }
            let Some(statement) = &mut state.statement else {
                return Poll::Ready(Ok(None));
            };
            let values = self.request.info.placeholder_values(&group);
            match statement.execute(&values) {
                Ok(cursor) => state.cursor = Some(cursor),
                Err(e) => {
                    return Poll::Ready(Err(execution(
                        e,
                        format!("Could not execute `{}`", truncate_long!(self.sql())),
                    )));
                }
            }
        }
    }

    fn close(&mut self, state: SelectState<C>, outcome: Outcome) -> Result<()> {
        let SelectState {
            lease,
            statement,
            cursor,
        } = state;
        let mut error: Option<Error> = None;
        if let Some(cursor) = cursor
            && let Err(e) = cursor.close()
        {
            join(&mut error, execution(e, "Could not close the cursor"));
        }
        if let Some(statement) = statement {
            match statement.close() {
                Ok(()) => log::debug!("Statement `{}` closed", truncate_long!(self.sql())),
                Err(e) => join(&mut error, execution(e, "Could not close the statement")),
            }
        }
        let outcome = if error.is_some() {
            Outcome::Failure
        } else {
            outcome
        };
        if let Err(e) = lease.release(outcome) {
            join(&mut error, e);
        }
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn join(error: &mut Option<Error>, e: Error) {
    *error = Some(match error.take() {
        Some(primary) => attach(primary, e),
        None => e,
    });
}

/// The lazy stream of mapped rows of one query.
pub type Select<C, T> = Generated<SelectGenerator<C, T>>;

/// Build the row stream of `request`, running on `handle`.
pub fn select<C: Connection, T>(
    handle: ConnectionHandle<C>,
    request: QueryRequest<T>,
) -> Select<C, T> {
    Generated::new(SelectGenerator::new(handle, request))
}
