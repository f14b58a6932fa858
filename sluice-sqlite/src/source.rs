use crate::SqliteConnection;
use sluice_core::{ConnectionSource, Result};
use std::borrow::Cow;

/// Opens a new [`SqliteConnection`] to the same database for every query.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    url: Cow<'static, str>,
}

impl SqliteSource {
    pub const NAME: &'static str = "sqlite";

    pub fn new(url: impl Into<Cow<'static, str>>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectionSource for SqliteSource {
    type Connection = SqliteConnection;

    fn connection(&self) -> Result<SqliteConnection> {
        SqliteConnection::connect(&self.url)
    }
}
