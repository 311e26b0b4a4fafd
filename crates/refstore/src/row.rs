//! Row mapping traits and table metadata

use crate::error::{StoreError, StoreResult};
use tokio_postgres::Row;

/// Trait for converting a database row into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`.
///
/// # Example
///
/// ```ignore
/// use refstore::FromRow;
///
/// #[derive(FromRow)]
/// struct Currency {
///     id: i64,
///     code: String,
///     #[store(column = "display_name")]
///     name: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> StoreResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning StoreError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> StoreResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> StoreResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| StoreError::decode(column, e.to_string()))
    }
}

/// Static table metadata, usually derived with `#[derive(Table)]`.
///
/// `COLUMNS` is the select list in field order, so a SELECT built from it
/// always matches what `FromRow` reads back.
pub trait Table {
    /// Qualified table name, e.g. `core.bank_accounts`.
    const TABLE: &'static str;
    /// Every mapped column, in field order.
    const COLUMNS: &'static [&'static str];
    /// Primary key columns.
    const KEY_COLUMNS: &'static [&'static str];

    /// Columns that are not part of the primary key.
    fn value_columns() -> Vec<&'static str> {
        Self::COLUMNS
            .iter()
            .copied()
            .filter(|c| !Self::KEY_COLUMNS.contains(c))
            .collect()
    }
}
