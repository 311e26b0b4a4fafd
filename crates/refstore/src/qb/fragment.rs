//! Free-form SQL fragments that keep trusted text and bound values apart.
//!
//! A [`Fragment`] is assembled from three kinds of pieces:
//! - `&'static str` SQL text (keywords, operators, function calls): always a
//!   compile-time constant, never runtime input
//! - [`Ident`](crate::qb::Ident)s, validated on the way in
//! - bound values, emitted as `$n` placeholders when the statement renders
//!
//! ```ignore
//! use refstore::qb::Fragment;
//!
//! // lower(name) = lower($n)
//! let f = Fragment::new()
//!     .sql("lower(")
//!     .ident("name")
//!     .sql(") = lower(")
//!     .bind(name)
//!     .sql(")");
//! ```

use crate::error::{StoreError, StoreResult};
use crate::qb::ident::{Ident, IntoIdent};
use crate::qb::param::Param;
use crate::qb::writer::SqlWriter;
use tokio_postgres::types::ToSql;

#[derive(Clone, Debug)]
enum Part {
    Sql(&'static str),
    Ident(Ident),
    Param(Param),
    List(Vec<Param>),
}

/// A SQL expression with placeholders resolved at render time.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct Fragment {
    parts: Vec<Part>,
    error: Option<String>,
}

impl Fragment {
    /// Create an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append constant SQL text.
    pub fn sql(mut self, text: &'static str) -> Self {
        if !text.is_empty() {
            self.parts.push(Part::Sql(text));
        }
        self
    }

    /// Append an identifier. An invalid identifier is reported when the
    /// enclosing statement renders.
    pub fn ident(mut self, ident: impl IntoIdent) -> Self {
        match ident.into_ident() {
            Ok(ident) => self.parts.push(Part::Ident(ident)),
            Err(e) => {
                self.error.get_or_insert(e.into_message());
            }
        }
        self
    }

    /// Append a bound value.
    pub fn bind<T: ToSql + Send + Sync + 'static>(self, value: T) -> Self {
        self.bind_param(Param::new(value))
    }

    /// Append an already wrapped value.
    pub fn bind_param(mut self, param: Param) -> Self {
        self.parts.push(Part::Param(param));
        self
    }

    /// Append a comma-separated placeholder list.
    ///
    /// An empty list renders `NULL`, so `IN (NULL)` stays valid SQL and
    /// matches nothing.
    pub fn bind_list<T: ToSql + Send + Sync + 'static>(
        mut self,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        self.parts
            .push(Part::List(values.into_iter().map(Param::new).collect()));
        self
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.error.is_none()
    }

    pub(crate) fn render(&self, w: &mut SqlWriter) -> StoreResult<()> {
        if let Some(err) = &self.error {
            return Err(StoreError::builder(err.clone()));
        }
        for part in &self.parts {
            match part {
                Part::Sql(s) => w.push_str(s),
                Part::Ident(ident) => w.push_ident(ident),
                Part::Param(p) => w.push_param(p),
                Part::List(values) if values.is_empty() => w.push_str("NULL"),
                Part::List(values) => w.push_separated(values, ", ", |w, p| w.push_param(p)),
            }
        }
        Ok(())
    }
}
