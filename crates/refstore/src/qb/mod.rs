//! Dynamic statement building.
//!
//! Identifiers, constant SQL text and bound values are distinct types here:
//! identifiers are validated [`Ident`]s, free SQL text is `&'static str`,
//! and values are [`Param`]s that only ever become `$n` placeholders. The
//! placeholder counter lives inside the renderer, so independently built
//! predicates never need to know their final position.
//!
//! # Usage
//!
//! ```ignore
//! use refstore::qb::{self, FilterBracket, Order, Predicate};
//!
//! // SELECT id, code, name FROM core.currencies
//! //   WHERE (status <> $1) AND ((code = $2) OR (code = $3)) ORDER BY code ASC LIMIT 50
//! let query = qb::select("core.currencies")
//!     .select(["id", "code", "name"])
//!     .filter(Predicate::ne("status", "TERMINATED"))
//!     .filter_bracket(
//!         FilterBracket::or()
//!             .set_filter(Predicate::eq("code", "CHF"))
//!             .set_filter(Predicate::eq("code", "EUR")),
//!     )
//!     .order_by("code", Order::Asc)
//!     .limit(50)
//!     .generate_sql()?;
//!
//! // UPDATE core.blockchains SET status = $1 WHERE id = $2
//! let query = qb::update("core.blockchains")
//!     .set_update("status", "TERMINATED")
//!     .filter(Predicate::eq("id", "abc-123"))
//!     .generate_sql()?;
//! ```

mod builder;
mod filter;
mod fragment;
mod ident;
mod param;
mod writer;

#[cfg(test)]
mod tests;

pub use builder::{BuiltQuery, Join, Order, QueryBuilder, StatementKind};
pub use filter::{CompareOp, Connective, FilterBracket, Predicate};
pub use fragment::Fragment;
pub use ident::{Ident, IntoIdent};
pub use param::{Param, ParamList};

/// Create a builder of the given kind.
pub fn create_query_builder(kind: StatementKind, table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(kind, table)
}

/// Create an empty filter bracket.
pub fn create_filter_bracket(connective: Connective) -> FilterBracket {
    FilterBracket::new(connective)
}

/// `SELECT ... FROM table`
pub fn select(table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(StatementKind::Select, table)
}

/// `INSERT INTO table`
pub fn insert(table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(StatementKind::Insert, table)
}

/// `INSERT INTO table ... ON CONFLICT (...) DO UPDATE`
pub fn upsert(table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(StatementKind::Upsert, table)
}

/// `UPDATE table`
pub fn update(table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(StatementKind::Update, table)
}

/// `DELETE FROM table`
pub fn delete(table: impl IntoIdent) -> QueryBuilder {
    QueryBuilder::new(StatementKind::Delete, table)
}
