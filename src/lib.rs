//! Backpressured row streams over blocking SQL drivers.
//!
//! ```rust,ignore
//! use sluice::{Database, stream::TryStreamExt};
//!
//! let db = Database::new(source);
//! let scores: Vec<i64> = db
//!     .select("select score from person where name = :name")?
//!     .parameter("name", "FRED")?
//!     .parameter("name", "JOSEPH")?
//!     .get_as()?
//!     .try_collect()
//!     .await?;
//! ```
pub use sluice_core::*;
