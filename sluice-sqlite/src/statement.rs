use crate::{CBox, SqliteCursor, error_message_from_ptr, extract::extract_name};
use libsqlite3_sys::*;
use sluice_core::{
    Error, Result, RowNames, Statement, Value, format_date, format_time, format_timestamp,
    truncate_long,
};
use std::{
    ffi::{CStr, c_int},
    fmt::{self, Display},
    os::raw::{c_char, c_void},
    sync::Arc,
};

/// A prepared SQLite statement.
///
/// The statement is finalized once both the statement and its last cursor are gone.
pub struct SqliteStatement {
    pub(crate) statement: Arc<CBox<*mut sqlite3_stmt>>,
}

impl SqliteStatement {
    pub(crate) fn new(statement: Arc<CBox<*mut sqlite3_stmt>>) -> Self {
        Self { statement }
    }

    fn sql(&self) -> String {
        unsafe {
            let sql = sqlite3_sql(**self.statement);
            if sql.is_null() {
                return String::new();
            }
            let sql = CStr::from_ptr(sql).to_string_lossy();
            truncate_long!(sql)
        }
    }

    fn bind_index(&mut self, value: &Value, index: c_int) -> Result<()> {
        let statement = **self.statement;
        unsafe {
            let rc = match value {
                v if v.is_null() => sqlite3_bind_null(statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
                Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
                Value::Varchar(Some(v)) => bind_text(statement, index, v),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    statement,
                    index,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Decimal(Some(v)) => bind_text(statement, index, &v.to_string()),
                Value::Date(Some(v)) => bind_text(statement, index, &format_date(v)?),
                Value::Time(Some(v)) => bind_text(statement, index, &format_time(v)?),
                Value::Timestamp(Some(v)) => bind_text(statement, index, &format_timestamp(v)?),
                Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
                _ => {
                    let error =
                        Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            };
            if rc != SQLITE_OK {
                let db = sqlite3_db_handle(statement);
                let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string())
                    .context(format!("Cannot bind parameter {} to query:\n{}", index, self.sql()));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(())
    }
}

unsafe fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

impl Statement for SqliteStatement {
    type Cursor = SqliteCursor;

    fn execute(&mut self, values: &[Value]) -> Result<SqliteCursor> {
        let statement = **self.statement;
        let expected = unsafe {
            sqlite3_reset(statement);
            sqlite3_clear_bindings(statement);
            sqlite3_bind_parameter_count(statement) as usize
        };
        if values.len() != expected {
            let error = Error::msg(format!(
                "The query expects {} parameters but {} were supplied:\n{}",
                expected,
                values.len(),
                self.sql()
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        for (i, value) in values.iter().enumerate() {
            self.bind_index(value, i as c_int + 1)?;
        }
        let count = unsafe { sqlite3_column_count(statement) };
        let labels = (0..count)
            .map(|i| extract_name(statement, i))
            .collect::<Result<RowNames>>()?;
        Ok(SqliteCursor::new(self.statement.clone(), labels))
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

impl Display for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", **self.statement)
    }
}
