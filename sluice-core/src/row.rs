use crate::{AsValue, Context, Error, Result, Value};
use std::sync::Arc;

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;

/// One physical result row with its column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Box<[Value]>,
}

impl Row {
    pub fn new(labels: RowNames, values: Box<[Value]>) -> Self {
        Self { labels, values }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .and_then(|i| self.values.get(i))
    }
    /// Decode the column at `index` (from 0).
    pub fn decode<T: AsValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::msg(format!(
                "Column {} is out of range, the row has {} columns",
                index,
                self.len()
            ))
        })?;
        T::try_from_value(value.clone()).with_context(|| {
            format!(
                "While decoding column {} (`{}`)",
                index,
                self.labels.get(index).map(String::as_str).unwrap_or("?")
            )
        })
    }
    /// Decode the column called `name`.
    pub fn decode_column<T: AsValue>(&self, name: &str) -> Result<T> {
        let index = self
            .labels
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| Error::msg(format!("The row has no column named `{}`", name)))?;
        self.decode(index)
    }
}

/// Decodes one physical row into a value of the implementing type.
///
/// Single value types decode the first column, tuples decode their columns in order.
/// Any `FnMut(&Row) -> Result<T>` closure can be used in place of this trait through
/// [`crate::SelectBuilder::get`].
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl<T: AsValue> FromRow for T {
    fn from_row(row: &Row) -> Result<Self> {
        row.decode(0)
    }
}

macro_rules! impl_from_row_tuple {
    ($($name:ident $index:tt),+) => {
        impl<$($name: AsValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                Ok(($(row.decode::<$name>($index)?,)+))
            }
        }
    };
}
impl_from_row_tuple!(A 0);
impl_from_row_tuple!(A 0, B 1);
impl_from_row_tuple!(A 0, B 1, C 2);
impl_from_row_tuple!(A 0, B 1, C 2, D 3);
impl_from_row_tuple!(A 0, B 1, C 2, D 3, E 4);
impl_from_row_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
