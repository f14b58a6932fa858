mod errors;
mod person;
mod transaction;
mod types;

use crate::{
    errors::errors,
    person::{person, person_setup},
    types::types,
};
use log::LevelFilter;
use sluice::{Connection, ConnectionSource, Database, Result, stream::TryStreamExt};
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transaction::{chained, transacted, transaction_rollback};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}

/// Run a statement that returns no rows, binding `values` as a flat list.
pub async fn execute<C, I>(db: &Database<C>, sql: &str, values: I) -> Result<()>
where
    C: Connection,
    I: IntoIterator,
    I::Item: Into<sluice::Parameter>,
{
    db.select(sql)?
        .parameters(values)?
        .get(|_| Ok(()))?
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}

pub async fn execute_tests<S: ConnectionSource>(source: S) {
    let db = Database::new(source);
    person_setup(&db).await;
    person(&db).await;
    errors(&db).await;
    types(&db).await;
    #[cfg(not(feature = "disable-transactions"))]
    {
        transacted(&db).await;
        chained(&db).await;
        transaction_rollback(&db).await;
    }
}
