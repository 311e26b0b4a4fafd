//! The statement builder.

use crate::error::{StoreError, StoreResult};
use crate::qb::filter::{FilterBracket, Predicate};
use crate::qb::ident::{Ident, IntoIdent};
use crate::qb::param::{Param, ParamList};
use crate::qb::writer::SqlWriter;
use std::fmt::Write;
use tokio_postgres::types::ToSql;

/// Which statement a [`QueryBuilder`] renders. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Upsert => "UPSERT",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

/// A `JOIN` clause: table, optional alias, and an `ON` condition.
///
/// ```ignore
/// // INNER JOIN core.currencies AS cur ON ba.currency_id = cur.id
/// Join::inner("core.currencies").alias("cur").on_columns("ba.currency_id", "cur.id")
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Join {
    kind: JoinKind,
    table: Option<Ident>,
    alias: Option<Ident>,
    on: FilterBracket,
    error: Option<String>,
}

impl Join {
    fn new(kind: JoinKind, table: impl IntoIdent) -> Self {
        let (table, error) = match table.into_ident() {
            Ok(t) => (Some(t), None),
            Err(e) => (None, Some(e.into_message())),
        };
        Self {
            kind,
            table,
            alias: None,
            on: FilterBracket::and(),
            error,
        }
    }

    /// `INNER JOIN table`
    pub fn inner(table: impl IntoIdent) -> Self {
        Self::new(JoinKind::Inner, table)
    }

    /// `LEFT JOIN table`
    pub fn left(table: impl IntoIdent) -> Self {
        Self::new(JoinKind::Left, table)
    }

    /// `AS alias`
    pub fn alias(mut self, alias: impl IntoIdent) -> Self {
        match alias.into_ident() {
            Ok(a) => self.alias = Some(a),
            Err(e) => {
                self.error.get_or_insert(e.into_message());
            }
        }
        self
    }

    /// Add `left = right` to the `ON` condition.
    pub fn on_columns(self, left: impl IntoIdent, right: impl IntoIdent) -> Self {
        self.on(Predicate::columns_eq(left, right))
    }

    /// Add any predicate to the `ON` condition (AND-combined).
    pub fn on(mut self, predicate: impl Into<Predicate>) -> Self {
        self.on.push(predicate);
        self
    }

    fn render(&self, w: &mut SqlWriter) -> StoreResult<()> {
        if let Some(err) = &self.error {
            return Err(StoreError::builder(err.clone()));
        }
        let Some(table) = &self.table else {
            return Err(StoreError::builder("join without a table"));
        };
        if self.on.is_empty() {
            return Err(StoreError::builder(format!(
                "join on {table} has no ON condition"
            )));
        }
        w.push_str(match self.kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
        });
        w.push_ident(table);
        if let Some(alias) = &self.alias {
            w.push_str(" AS ");
            w.push_ident(alias);
        }
        w.push_str(" ON ");
        self.on.render(w)
    }
}

#[derive(Clone, Debug)]
enum SelectItem {
    Field(Ident),
    Expr(&'static str),
}

#[derive(Clone, Debug)]
enum SetValue {
    Param(Param),
    Expr(&'static str),
}

/// A rendered statement, ready to execute.
#[derive(Clone, Debug)]
pub struct BuiltQuery {
    /// Statement kind the SQL was rendered for.
    pub kind: StatementKind,
    /// SQL text with `$1..$n` placeholders.
    pub sql: String,
    /// Bound values in placeholder order.
    pub params: ParamList,
    /// Human-readable WHERE predicate (values inlined). Logs and error
    /// messages only; never executed.
    pub selector: String,
}

impl BuiltQuery {
    /// Parameters in the form `tokio-postgres` expects.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.as_refs()
    }
}

/// Dynamic statement builder.
///
/// Built fresh per request through a consuming chain, rendered once with
/// [`QueryBuilder::generate_sql`], then dropped. Misuse (wrong method for the
/// kind, bad identifier) is recorded and reported by `generate_sql`, so a
/// chain never has to be broken up to handle errors.
#[derive(Clone, Debug)]
#[must_use]
pub struct QueryBuilder {
    kind: StatementKind,
    table: Option<Ident>,
    select_fields: Vec<SelectItem>,
    joins: Vec<Join>,
    where_bracket: FilterBracket,
    order: Vec<(Ident, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    insert_fields: Vec<Ident>,
    insert_rows: Vec<Vec<Param>>,
    conflict_columns: Vec<Ident>,
    updates: Vec<(Ident, SetValue)>,
    return_fields: Vec<Ident>,
    allow_all_rows: bool,
    error: Option<String>,
}

impl QueryBuilder {
    /// Create a builder of `kind` targeting `table`.
    pub fn new(kind: StatementKind, table: impl IntoIdent) -> Self {
        let mut qb = Self {
            kind,
            table: None,
            select_fields: Vec::new(),
            joins: Vec::new(),
            where_bracket: FilterBracket::and(),
            order: Vec::new(),
            limit: None,
            offset: None,
            insert_fields: Vec::new(),
            insert_rows: Vec::new(),
            conflict_columns: Vec::new(),
            updates: Vec::new(),
            return_fields: Vec::new(),
            allow_all_rows: false,
            error: None,
        };
        match table.into_ident() {
            Ok(t) => qb.table = Some(t),
            Err(e) => qb.fail(e.into_message()),
        }
        qb
    }

    /// The statement kind.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    fn fail(&mut self, msg: impl Into<String>) {
        self.error.get_or_insert_with(|| msg.into());
    }

    /// Record an error if `op` is not valid for this builder's kind.
    fn require(&mut self, op: &str, kinds: &[StatementKind]) -> bool {
        if kinds.contains(&self.kind) {
            return true;
        }
        let kind = self.kind;
        self.fail(format!("{op} is not valid on a {kind} builder"));
        false
    }

    fn idents<I>(&mut self, items: I) -> Vec<Ident>
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        let mut out = Vec::new();
        for item in items {
            match item.into_ident() {
                Ok(ident) => out.push(ident),
                Err(e) => self.fail(e.into_message()),
            }
        }
        out
    }

    // ==================== SELECT ====================

    /// Append columns to the select list. Duplicates are kept.
    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        if self.require("select", &[StatementKind::Select]) {
            let fields = self.idents(fields);
            self.select_fields
                .extend(fields.into_iter().map(SelectItem::Field));
        }
        self
    }

    /// Append a constant expression (`count(*)`, `ba.*`) to the select list.
    pub fn select_expr(mut self, expr: &'static str) -> Self {
        if self.require("select_expr", &[StatementKind::Select]) {
            self.select_fields.push(SelectItem::Expr(expr));
        }
        self
    }

    /// Append a join. Joins render in call order.
    pub fn join(mut self, join: Join) -> Self {
        if self.require("join", &[StatementKind::Select]) {
            self.joins.push(join);
        }
        self
    }

    /// Append `ORDER BY field dir`.
    pub fn order_by(mut self, field: impl IntoIdent, order: Order) -> Self {
        if self.require("order_by", &[StatementKind::Select]) {
            match field.into_ident() {
                Ok(f) => self.order.push((f, order)),
                Err(e) => self.fail(e.into_message()),
            }
        }
        self
    }

    /// Set `LIMIT`.
    pub fn limit(mut self, n: u64) -> Self {
        if self.require("limit", &[StatementKind::Select]) {
            self.limit = Some(n);
        }
        self
    }

    /// Set `OFFSET`.
    pub fn offset(mut self, n: u64) -> Self {
        if self.require("offset", &[StatementKind::Select]) {
            self.offset = Some(n);
        }
        self
    }

    // ==================== WHERE ====================

    /// AND a predicate into the WHERE clause.
    pub fn filter(mut self, predicate: impl Into<Predicate>) -> Self {
        if self.require(
            "filter",
            &[StatementKind::Select, StatementKind::Update, StatementKind::Delete],
        ) {
            self.where_bracket.push(predicate);
        }
        self
    }

    /// AND a whole bracket into the WHERE clause (OR-within-AND).
    pub fn filter_bracket(self, bracket: FilterBracket) -> Self {
        self.filter(Predicate::Bracket(bracket))
    }

    /// Permit Update/Delete without a WHERE predicate.
    pub fn allow_all_rows(mut self) -> Self {
        self.allow_all_rows = true;
        self
    }

    // ==================== INSERT / UPSERT ====================

    /// Register the insert column list. Replaces any earlier list.
    pub fn set_insert_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        if self.require(
            "set_insert_fields",
            &[StatementKind::Insert, StatementKind::Upsert],
        ) {
            let fields = self.idents(fields);
            if !self.insert_rows.is_empty() && fields.len() != self.insert_fields.len() {
                self.fail(format!(
                    "insert arity mismatch: {} fields registered after rows of {} values",
                    fields.len(),
                    self.insert_fields.len()
                ));
            }
            self.insert_fields = fields;
        }
        self
    }

    /// Append one value row. Each call adds a row to a multi-row insert.
    ///
    /// Fails immediately if the row's length differs from the registered
    /// insert fields.
    pub fn set_insert_values(mut self, row: Vec<Param>) -> StoreResult<Self> {
        if !matches!(self.kind, StatementKind::Insert | StatementKind::Upsert) {
            return Err(StoreError::builder(format!(
                "set_insert_values is not valid on a {} builder",
                self.kind
            )));
        }
        if row.len() != self.insert_fields.len() {
            return Err(StoreError::builder(format!(
                "insert arity mismatch: {} fields registered, row has {} values",
                self.insert_fields.len(),
                row.len()
            )));
        }
        self.insert_rows.push(row);
        Ok(self)
    }

    /// Conflict target columns for an Upsert.
    pub fn conflict_on<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        if self.require("conflict_on", &[StatementKind::Upsert]) {
            self.conflict_columns = self.idents(columns);
        }
        self
    }

    // ==================== UPDATE ====================

    /// Append `field = value` to the SET list.
    pub fn set_update<T: ToSql + Send + Sync + 'static>(
        self,
        field: impl IntoIdent,
        value: T,
    ) -> Self {
        self.push_update("set_update", field, SetValue::Param(Param::new(value)))
    }

    /// Append `field = value` when `value` is `Some`; skip otherwise.
    pub fn set_update_opt<T: ToSql + Send + Sync + 'static>(
        self,
        field: impl IntoIdent,
        value: Option<T>,
    ) -> Self {
        match value {
            Some(v) => self.set_update(field, v),
            None => self,
        }
    }

    /// Append `field = <constant expression>` (e.g. `now()`).
    pub fn set_update_expr(self, field: impl IntoIdent, expr: &'static str) -> Self {
        self.push_update("set_update_expr", field, SetValue::Expr(expr))
    }

    fn push_update(mut self, op: &str, field: impl IntoIdent, value: SetValue) -> Self {
        if self.require(op, &[StatementKind::Update]) {
            match field.into_ident() {
                Ok(f) => self.updates.push((f, value)),
                Err(e) => self.fail(e.into_message()),
            }
        }
        self
    }

    /// Whether at least one assignment exists.
    pub fn is_updatable(&self) -> bool {
        !self.updates.is_empty()
    }

    // ==================== RETURNING ====================

    /// Append columns to the `RETURNING` list.
    pub fn set_return_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIdent,
    {
        if self.require(
            "set_return_fields",
            &[
                StatementKind::Insert,
                StatementKind::Update,
                StatementKind::Upsert,
                StatementKind::Delete,
            ],
        ) {
            let fields = self.idents(fields);
            self.return_fields.extend(fields);
        }
        self
    }

    // ==================== Render ====================

    /// Render the statement.
    ///
    /// Placeholders are numbered in textual order: join conditions, then SET
    /// values or insert rows, then WHERE values.
    pub fn generate_sql(self) -> StoreResult<BuiltQuery> {
        if let Some(err) = &self.error {
            return Err(StoreError::builder(err.clone()));
        }
        let Some(table) = &self.table else {
            return Err(StoreError::builder("missing table"));
        };

        let mut w = SqlWriter::new();
        match self.kind {
            StatementKind::Select => self.render_select(&mut w, table)?,
            StatementKind::Insert | StatementKind::Upsert => self.render_insert(&mut w, table)?,
            StatementKind::Update => self.render_update(&mut w, table)?,
            StatementKind::Delete => self.render_delete(&mut w, table)?,
        }

        let selector = self.where_bracket.debug_string();
        let (sql, params) = w.finish();
        Ok(BuiltQuery {
            kind: self.kind,
            sql,
            params,
            selector,
        })
    }

    fn render_select(&self, w: &mut SqlWriter, table: &Ident) -> StoreResult<()> {
        w.push_str("SELECT ");
        if self.select_fields.is_empty() {
            w.push_str("*");
        } else {
            w.push_separated(&self.select_fields, ", ", |w, item| match item {
                SelectItem::Field(f) => w.push_ident(f),
                SelectItem::Expr(e) => w.push_str(e),
            });
        }
        w.push_str(" FROM ");
        w.push_ident(table);
        for join in &self.joins {
            join.render(w)?;
        }
        self.render_where(w)?;

        if !self.order.is_empty() {
            w.push_str(" ORDER BY ");
            w.push_separated(&self.order, ", ", |w, (field, order)| {
                w.push_ident(field);
                w.push_str(match order {
                    Order::Asc => " ASC",
                    Order::Desc => " DESC",
                });
            });
        }
        let mut tail = String::new();
        if let Some(limit) = self.limit {
            let _ = write!(tail, " LIMIT {limit}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(tail, " OFFSET {offset}");
        }
        w.push_str(&tail);
        Ok(())
    }

    fn render_insert(&self, w: &mut SqlWriter, table: &Ident) -> StoreResult<()> {
        if self.insert_fields.is_empty() {
            return Err(StoreError::builder(format!(
                "insert into {table} has no fields"
            )));
        }
        if self.insert_rows.is_empty() {
            return Err(StoreError::builder(format!(
                "insert into {table} has no value rows"
            )));
        }

        if let Some(row) = self
            .insert_rows
            .iter()
            .find(|row| row.len() != self.insert_fields.len())
        {
            return Err(StoreError::builder(format!(
                "insert arity mismatch: {} fields registered, row has {} values",
                self.insert_fields.len(),
                row.len()
            )));
        }

        w.push_str("INSERT INTO ");
        w.push_ident(table);
        w.push_str(" (");
        w.push_separated(&self.insert_fields, ", ", |w, f| w.push_ident(f));
        w.push_str(") VALUES ");
        w.push_separated(&self.insert_rows, ", ", |w, row| {
            w.push_str("(");
            w.push_separated(row, ", ", |w, p| w.push_param(p));
            w.push_str(")");
        });

        if self.kind == StatementKind::Upsert {
            self.render_conflict(w, table)?;
        }
        self.render_returning(w);
        Ok(())
    }

    fn render_conflict(&self, w: &mut SqlWriter, table: &Ident) -> StoreResult<()> {
        if self.conflict_columns.is_empty() {
            return Err(StoreError::builder(format!(
                "upsert into {table} has no conflict columns"
            )));
        }
        let is_key = |f: &Ident| {
            self.conflict_columns
                .iter()
                .any(|k| k.unqualified() == f.unqualified())
        };
        let mut assigned: Vec<&Ident> = self.insert_fields.iter().filter(|f| !is_key(*f)).collect();
        if assigned.is_empty() {
            // Every field is a key: assign the keys so RETURNING yields the row.
            assigned = self.conflict_columns.iter().collect();
        }

        w.push_str(" ON CONFLICT (");
        w.push_separated(&self.conflict_columns, ", ", |w, k| w.push_ident(k));
        w.push_str(") DO UPDATE SET ");
        w.push_separated(assigned, ", ", |w, f| {
            let column = unqualified(f);
            w.push_ident(&column);
            w.push_str(" = EXCLUDED.");
            w.push_ident(&column);
        });
        Ok(())
    }

    fn render_update(&self, w: &mut SqlWriter, table: &Ident) -> StoreResult<()> {
        if !self.is_updatable() {
            return Err(StoreError::builder(format!(
                "update on {table} has no assignments"
            )));
        }
        self.check_guarded(table)?;

        w.push_str("UPDATE ");
        w.push_ident(table);
        w.push_str(" SET ");
        w.push_separated(&self.updates, ", ", |w, (field, value)| {
            w.push_ident(field);
            w.push_str(" = ");
            match value {
                SetValue::Param(p) => w.push_param(p),
                SetValue::Expr(e) => w.push_str(e),
            }
        });
        self.render_where(w)?;
        self.render_returning(w);
        Ok(())
    }

    fn render_delete(&self, w: &mut SqlWriter, table: &Ident) -> StoreResult<()> {
        self.check_guarded(table)?;
        w.push_str("DELETE FROM ");
        w.push_ident(table);
        self.render_where(w)?;
        self.render_returning(w);
        Ok(())
    }

    fn check_guarded(&self, table: &Ident) -> StoreResult<()> {
        if self.where_bracket.is_empty() && !self.allow_all_rows {
            return Err(StoreError::builder(format!(
                "{} on {table} has no WHERE selector",
                self.kind.as_str().to_lowercase()
            )));
        }
        Ok(())
    }

    fn render_where(&self, w: &mut SqlWriter) -> StoreResult<()> {
        if self.where_bracket.is_empty() {
            return Ok(());
        }
        w.push_str(" WHERE ");
        self.where_bracket.render(w)
    }

    fn render_returning(&self, w: &mut SqlWriter) {
        if !self.return_fields.is_empty() {
            w.push_str(" RETURNING ");
            w.push_separated(&self.return_fields, ", ", |w, f| w.push_ident(f));
        }
    }
}

/// The last segment of an identifier as a standalone identifier.
fn unqualified(ident: &Ident) -> Ident {
    // Quoted segments come back unescaped and need quoting again.
    Ident::parse(ident.unqualified())
        .or_else(|_| Ident::parse(&format!("\"{}\"", ident.unqualified().replace('"', "\"\""))))
        .unwrap_or_else(|_| ident.clone())
}
