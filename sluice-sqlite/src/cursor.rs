use crate::{CBox, error_message_from_ptr, extract::extract_value};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_ROW, sqlite3_column_count, sqlite3_db_handle, sqlite3_errmsg, sqlite3_reset,
    sqlite3_step, sqlite3_stmt,
};
use sluice_core::{Cursor, Error, Result, Row, RowNames};
use std::sync::Arc;

/// Steps through the rows of one execution of a [`crate::SqliteStatement`].
pub struct SqliteCursor {
    statement: Arc<CBox<*mut sqlite3_stmt>>,
    labels: RowNames,
    done: bool,
}

impl SqliteCursor {
    pub(crate) fn new(statement: Arc<CBox<*mut sqlite3_stmt>>, labels: RowNames) -> Self {
        Self {
            statement,
            labels,
            done: false,
        }
    }

    pub fn labels(&self) -> &RowNames {
        &self.labels
    }
}

impl Cursor for SqliteCursor {
    fn fetch(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        let statement = **self.statement;
        unsafe {
            match sqlite3_step(statement) {
                SQLITE_DONE => {
                    self.done = true;
                    Ok(None)
                }
                SQLITE_ROW => {
                    let count = sqlite3_column_count(statement);
                    let values = (0..count)
                        .map(|i| extract_value(statement, i))
                        .collect::<Result<_>>()?;
                    Ok(Some(Row::new(self.labels.clone(), values)))
                }
                // SQLITE_BUSY lands here once the busy timeout expired
                _ => {
                    self.done = true;
                    let error = Error::msg(
                        error_message_from_ptr(&sqlite3_errmsg(sqlite3_db_handle(statement)))
                            .to_string(),
                    );
                    log::error!("{}", error);
                    Err(error)
                }
            }
        }
    }

    fn close(self) -> Result<()> {
        unsafe {
            sqlite3_reset(**self.statement);
        }
        Ok(())
    }
}
