use crate::{CBox, SqliteSource, SqliteStatement, error_message_from_ptr};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    sqlite3, sqlite3_busy_timeout, sqlite3_errmsg, sqlite3_exec,
    sqlite3_finalize, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_stmt,
};
use sluice_core::{Connection, Context, Error, Result, truncate_long};
use std::{
    ffi::{CStr, CString, c_int},
    ptr,
    sync::Arc,
};

// Present in the bundled SQLite library but not exposed by libsqlite3-sys.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// A blocking connection to one SQLite database.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    pub(crate) transaction: bool,
}

impl SqliteConnection {
    /// Open `sqlite://<path>[?<options>]`, the options being SQLite URI parameters (`mode=rwc`).
    pub fn connect(url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", SqliteSource::NAME);
        let Some(location) = url.strip_prefix(&prefix) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let uri = CString::new(format!("file:{}", location)).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut::<sqlite3>(), |p| unsafe {
            sqlite3_close_v2(p);
        });
        unsafe {
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE
                    | SQLITE_OPEN_CREATE
                    | SQLITE_OPEN_URI
                    | SQLITE_OPEN_FULLMUTEX,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let error =
                    Error::msg(error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string())
                        .context(format!("Could not open the database `{}`", url));
                log::error!("{:#}", error);
                return Err(error);
            }
            sqlite3_busy_timeout(*connection, 5_000);
        }
        log::debug!("Connected to `{}`", url);
        Ok(Self {
            connection,
            transaction: false,
        })
    }

    pub fn is_transaction(&self) -> bool {
        self.transaction
    }

    /// Run one or more statements that return no rows.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let statement = CString::new(sql).context("Could not create a CString from the query")?;
        unsafe {
            let rc = sqlite3_exec(
                *self.connection,
                statement.as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(*self.connection)).to_string(),
                )
                .context(format!("While executing `{}`", truncate_long!(sql)));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    type Statement = SqliteStatement;

    fn prepare(&mut self, sql: &str) -> Result<SqliteStatement> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql)
            .context("Could not create a CString from the query String")
            .with_context(context)?;
        let mut statement = CBox::new(ptr::null_mut::<sqlite3_stmt>(), |p| unsafe {
            sqlite3_finalize(p);
        });
        unsafe {
            let mut tail = ptr::null();
            let rc = sqlite3_prepare_v2(
                *self.connection,
                query.as_ptr(),
                sql.len() as c_int,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(*self.connection)).to_string(),
                )
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if statement.is_null() {
                let error = Error::msg("The query contains no statement").context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if !tail.is_null()
                && !CStr::from_ptr(tail)
                    .to_bytes()
                    .iter()
                    .all(u8::is_ascii_whitespace)
            {
                let error = Error::msg("Cannot prepare more than one statement at a time")
                    .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(SqliteStatement::new(Arc::new(statement)))
    }

    fn begin(&mut self) -> Result<()> {
        self.execute_batch("BEGIN;")?;
        self.transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_batch("COMMIT;")?;
        self.transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_batch("ROLLBACK;")?;
        self.transaction = false;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        let rc = unsafe { sqlite3_close_v2(*self.connection) };
        if rc != SQLITE_OK {
            let error = Error::msg(
                error_message_from_ptr(&unsafe { sqlite3_errmsg(*self.connection) }).to_string(),
            )
            .context("Could not close the connection");
            log::error!("{:#}", error);
            return Err(error);
        }
        self.connection.ptr = ptr::null_mut();
        Ok(())
    }
}
