//! Boolean filter composition.
//!
//! A [`FilterBracket`] joins [`Predicate`]s with one connective (`AND` or
//! `OR`). Brackets nest: a bracket can be a predicate of another bracket,
//! which is how OR-within-AND filters are expressed.
//!
//! Rendering is deterministic so callers can assert exact SQL:
//! - no predicates: empty text, no values
//! - one predicate: the predicate itself, bare
//! - two or more: each predicate in parentheses, joined by the connective
//! - a nested bracket with two or more predicates is wrapped once in
//!   parentheses; with one it degenerates to that predicate; an empty one
//!   contributes nothing
//!
//! ```ignore
//! use refstore::qb::{FilterBracket, Predicate};
//!
//! // (status = $1) AND ((code = $2) OR (name ILIKE $3))
//! let filter = FilterBracket::and()
//!     .set_filter(Predicate::eq("status", "ACTIVE"))
//!     .nest(
//!         FilterBracket::or()
//!             .set_filter(Predicate::eq("code", "CHF"))
//!             .set_filter(Predicate::ilike("name", "%franc%")),
//!     );
//! ```

use crate::error::{StoreError, StoreResult};
use crate::qb::fragment::Fragment;
use crate::qb::ident::{Ident, IntoIdent};
use crate::qb::param::{Param, ParamList};
use crate::qb::writer::SqlWriter;
use tokio_postgres::types::ToSql;

/// Boolean connective of a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn separator(self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

/// Comparison operator of a column predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => " = ",
            CompareOp::Ne => " <> ",
            CompareOp::Gt => " > ",
            CompareOp::Gte => " >= ",
            CompareOp::Lt => " < ",
            CompareOp::Lte => " <= ",
            CompareOp::Like => " LIKE ",
            CompareOp::ILike => " ILIKE ",
        }
    }
}

/// One boolean term of a filter.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// `column <op> $n`
    Compare {
        column: Ident,
        op: CompareOp,
        value: Param,
    },
    /// `left = right`, both identifiers (join conditions)
    ColumnEq { left: Ident, right: Ident },
    /// `column IS [NOT] NULL`
    NullCheck { column: Ident, is_null: bool },
    /// `column [NOT] IN ($n, ...)`
    InList {
        column: Ident,
        values: Vec<Param>,
        negated: bool,
    },
    /// Arbitrary fragment, rendered as-is.
    Fragment(Fragment),
    /// Nested bracket.
    Bracket(FilterBracket),
    /// A predicate whose construction failed (bad identifier); reported at render time.
    Invalid(String),
}

macro_rules! compare_ctor {
    ($(#[$doc:meta] $name:ident => $op:ident),* $(,)?) => {
        $(
            #[$doc]
            pub fn $name<T: ToSql + Send + Sync + 'static>(column: impl IntoIdent, value: T) -> Self {
                Self::compare(column, CompareOp::$op, value)
            }
        )*
    };
}

impl Predicate {
    compare_ctor! {
        /// `column = value`
        eq => Eq,
        /// `column <> value`
        ne => Ne,
        /// `column > value`
        gt => Gt,
        /// `column >= value`
        gte => Gte,
        /// `column < value`
        lt => Lt,
        /// `column <= value`
        lte => Lte,
        /// `column LIKE pattern`
        like => Like,
        /// `column ILIKE pattern`
        ilike => ILike,
    }

    /// `column <op> value` for any operator.
    pub fn compare<T: ToSql + Send + Sync + 'static>(
        column: impl IntoIdent,
        op: CompareOp,
        value: T,
    ) -> Self {
        match column.into_ident() {
            Ok(column) => Predicate::Compare {
                column,
                op,
                value: Param::new(value),
            },
            Err(e) => Predicate::Invalid(e.into_message()),
        }
    }

    /// `left = right` between two columns.
    pub fn columns_eq(left: impl IntoIdent, right: impl IntoIdent) -> Self {
        match (left.into_ident(), right.into_ident()) {
            (Ok(left), Ok(right)) => Predicate::ColumnEq { left, right },
            (Err(e), _) | (_, Err(e)) => Predicate::Invalid(e.into_message()),
        }
    }

    /// `column IS NULL`
    pub fn is_null(column: impl IntoIdent) -> Self {
        Self::null_check(column, true)
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: impl IntoIdent) -> Self {
        Self::null_check(column, false)
    }

    fn null_check(column: impl IntoIdent, is_null: bool) -> Self {
        match column.into_ident() {
            Ok(column) => Predicate::NullCheck { column, is_null },
            Err(e) => Predicate::Invalid(e.into_message()),
        }
    }

    /// `column IN (values...)`; an empty list renders `FALSE`.
    pub fn in_list<T: ToSql + Send + Sync + 'static>(
        column: impl IntoIdent,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::list(column, values, false)
    }

    /// `column NOT IN (values...)`; an empty list renders `TRUE`.
    pub fn not_in<T: ToSql + Send + Sync + 'static>(
        column: impl IntoIdent,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::list(column, values, true)
    }

    fn list<T: ToSql + Send + Sync + 'static>(
        column: impl IntoIdent,
        values: impl IntoIterator<Item = T>,
        negated: bool,
    ) -> Self {
        match column.into_ident() {
            Ok(column) => Predicate::InList {
                column,
                values: values.into_iter().map(Param::new).collect(),
                negated,
            },
            Err(e) => Predicate::Invalid(e.into_message()),
        }
    }

    /// Use a hand-built fragment as a predicate.
    pub fn fragment(fragment: Fragment) -> Self {
        Predicate::Fragment(fragment)
    }

    /// True if this predicate renders to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Bracket(b) => b.is_empty(),
            Predicate::Fragment(f) => f.is_empty(),
            _ => false,
        }
    }

    /// Render, wrapping leaf terms in parentheses when `wrap` is set.
    pub(crate) fn render(&self, w: &mut SqlWriter, wrap: bool) -> StoreResult<()> {
        if let Predicate::Bracket(inner) = self {
            let live = inner.live();
            return match live.as_slice() {
                [] => Ok(()),
                [only] => only.render(w, wrap),
                _ => {
                    w.push_str("(");
                    inner.render(w)?;
                    w.push_str(")");
                    Ok(())
                }
            };
        }

        if wrap {
            w.push_str("(");
        }
        match self {
            Predicate::Compare { column, op, value } => {
                w.push_ident(column);
                w.push_str(op.as_sql());
                w.push_param(value);
            }
            Predicate::ColumnEq { left, right } => {
                w.push_ident(left);
                w.push_str(" = ");
                w.push_ident(right);
            }
            Predicate::NullCheck { column, is_null } => {
                w.push_ident(column);
                w.push_str(if *is_null { " IS NULL" } else { " IS NOT NULL" });
            }
            Predicate::InList {
                values, negated, ..
            } if values.is_empty() => {
                w.push_str(if *negated { "TRUE" } else { "FALSE" });
            }
            Predicate::InList {
                column,
                values,
                negated,
            } => {
                w.push_ident(column);
                w.push_str(if *negated { " NOT IN (" } else { " IN (" });
                w.push_separated(values, ", ", |w, p| w.push_param(p));
                w.push_str(")");
            }
            Predicate::Fragment(f) => f.render(w)?,
            Predicate::Invalid(msg) => return Err(StoreError::builder(msg.clone())),
            Predicate::Bracket(_) => unreachable!("handled above"),
        }
        if wrap {
            w.push_str(")");
        }
        Ok(())
    }
}

impl From<FilterBracket> for Predicate {
    fn from(bracket: FilterBracket) -> Self {
        Predicate::Bracket(bracket)
    }
}

impl From<Fragment> for Predicate {
    fn from(fragment: Fragment) -> Self {
        Predicate::Fragment(fragment)
    }
}

/// A list of predicates under one connective.
#[derive(Clone, Debug)]
#[must_use]
pub struct FilterBracket {
    connective: Connective,
    predicates: Vec<Predicate>,
}

impl FilterBracket {
    /// Create an empty bracket.
    pub fn new(connective: Connective) -> Self {
        Self {
            connective,
            predicates: Vec::new(),
        }
    }

    /// Create an empty `AND` bracket.
    pub fn and() -> Self {
        Self::new(Connective::And)
    }

    /// Create an empty `OR` bracket.
    pub fn or() -> Self {
        Self::new(Connective::Or)
    }

    /// The bracket's connective.
    pub fn connective(&self) -> Connective {
        self.connective
    }

    /// Append a predicate (chaining form).
    pub fn set_filter(mut self, predicate: impl Into<Predicate>) -> Self {
        self.push(predicate);
        self
    }

    /// Append a predicate in place.
    pub fn push(&mut self, predicate: impl Into<Predicate>) {
        self.predicates.push(predicate.into());
    }

    /// Append a nested bracket as a single predicate.
    pub fn nest(self, inner: FilterBracket) -> Self {
        self.set_filter(Predicate::Bracket(inner))
    }

    /// Number of predicates that will render.
    pub fn len(&self) -> usize {
        self.live().len()
    }

    /// True if the bracket renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.predicates.iter().all(Predicate::is_empty)
    }

    fn live(&self) -> Vec<&Predicate> {
        self.predicates.iter().filter(|p| !p.is_empty()).collect()
    }

    /// Render standalone, numbering placeholders from `$1`.
    ///
    /// An empty bracket yields `("", [])`; callers must not emit a clause
    /// keyword for it.
    pub fn generate_sql(&self) -> StoreResult<(String, ParamList)> {
        let mut w = SqlWriter::new();
        self.render(&mut w)?;
        Ok(w.finish())
    }

    /// Human-readable rendering with values inlined. For logs and error
    /// messages only.
    pub fn debug_string(&self) -> String {
        let mut w = SqlWriter::debug();
        match self.render(&mut w) {
            Ok(()) => w.finish().0,
            Err(e) => format!("<invalid filter: {e}>"),
        }
    }

    pub(crate) fn render(&self, w: &mut SqlWriter) -> StoreResult<()> {
        let live = self.live();
        let wrap = live.len() > 1;
        for (i, predicate) in live.into_iter().enumerate() {
            if i > 0 {
                w.push_str(self.connective.separator());
            }
            predicate.render(w, wrap)?;
        }
        Ok(())
    }
}
