//! Bound statement values.

use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A bound value, shared through an `Arc` so builders and rendered
/// statements can hold the same value without copying it.
///
/// A `Param` is never spliced into SQL text; it is always sent to the
/// server as a positional argument.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Wrap any `ToSql` value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Borrow the value in the form `tokio-postgres` expects.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `ToSql: Debug`, so the bound value itself is printable.
        std::fmt::Debug::fmt(&*self.0, f)
    }
}

/// Ordered list of bound values. The 1-based position of a value is its
/// placeholder number.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a value and return its placeholder number.
    pub fn push_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate the values in placeholder order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_sql()).collect()
    }
}

/// Build one insert value row (`Vec<Param>`) from heterogeneous values.
///
/// ```ignore
/// let qb = refstore::qb::insert("core.countries")
///     .set_insert_fields(["id", "alpha2", "name"])
///     .set_insert_values(refstore::row![id, "CH", "Switzerland"])?;
/// ```
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        ::std::vec![$($crate::qb::Param::new($value)),*]
    };
}
