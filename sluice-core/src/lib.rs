mod as_value;
mod binder;
mod builder;
mod connection;
mod database;
mod error;
mod generator;
mod handle;
mod parse;
mod row;
mod select;
mod sql_info;
mod tx;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use binder::*;
pub use builder::*;
pub use connection::*;
pub use database::*;
pub use error::*;
pub use generator::*;
pub use handle::*;
pub use parse::{format_date, format_time, format_timestamp};
pub use row::*;
pub use select::*;
pub use sql_info::*;
pub use tx::*;
pub use util::truncated;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
