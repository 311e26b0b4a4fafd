//! Transactional write helpers.
//!
//! Single-statement helpers take any [`GenericClient`], normally an open
//! transaction, and enforce the expected row cardinality:
//!
//! - [`tx_write`]: exactly one row (0 → `NotFound`, >1 → `TooManyRows`)
//! - [`tx_bulk_write`]: zero or more rows
//! - [`tx_execute`]: affected-row count only
//!
//! [`execute_tx_write`] and [`execute_tx_bulk_write`] own the transaction:
//! they check out a pooled connection, begin, run the statement, commit on
//! success and roll back on failure. A serialization conflict re-runs the
//! whole transaction according to a [`RetryPolicy`].
//!
//! Multi-statement atomic writes are built with [`transaction!`] or
//! [`retry_transaction!`]:
//!
//! ```ignore
//! let mut client = pool.get().await?;
//! let recipient = refstore::retry_transaction!(&mut client, policy, tx, {
//!     let recipient = refstore::tx_write_as::<_, Recipient>(&tx, &insert_recipient).await?;
//!     let account = refstore::tx_write_as::<_, BankAccount>(&tx, &insert_account).await?;
//!     refstore::tx_execute(&tx, &link).await?;
//!     Ok(recipient)
//! })?;
//! ```

use crate::client::GenericClient;
use crate::config::RetryConfig;
use crate::error::{StoreError, StoreResult};
use crate::qb::BuiltQuery;
use crate::row::FromRow;
use deadpool_postgres::Pool;
use std::time::Duration;
use tokio_postgres::Row;

const MAX_LOGGED_SQL: usize = 200;

/// How often and how fast a transaction is re-run after a serialization
/// conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first run; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Run once, never retry.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before attempt `attempt + 1`: `base * 2^(attempt - 1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << shift)
            .min(self.max_delay)
    }

    /// Whether `err` after `attempt` runs should trigger another run.
    pub fn should_retry(&self, attempt: u32, err: &StoreError) -> bool {
        err.is_retryable() && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

fn truncate_sql(sql: &str) -> &str {
    if sql.len() <= MAX_LOGGED_SQL {
        return sql;
    }
    let mut end = MAX_LOGGED_SQL;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn log_statement(query: &BuiltQuery) {
    tracing::debug!(
        target: "refstore.sql",
        kind = %query.kind,
        param_count = query.params.len(),
        sql = %truncate_sql(&query.sql),
        selector = %query.selector,
        "executing statement"
    );
}

/// Log and sleep before the next attempt. Used by [`retry_transaction!`].
#[doc(hidden)]
pub async fn __retry_backoff(policy: &RetryPolicy, attempt: u32, err: &StoreError) {
    let delay = policy.delay_for(attempt);
    tracing::warn!(
        target: "refstore.sql",
        attempt,
        max_attempts = policy.max_attempts(),
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "retrying transaction after serialization failure"
    );
    tokio::time::sleep(delay).await;
}

/// Result of a transaction whose body failed with `error`. A failed rollback
/// is logged; the body's error is returned either way so its retryability
/// survives. Used by [`transaction!`].
#[doc(hidden)]
pub fn __after_rollback<T, E: std::fmt::Display>(
    error: StoreError,
    rollback: Result<(), E>,
) -> StoreResult<T> {
    if let Err(rollback_err) = rollback {
        tracing::warn!(
            target: "refstore.sql",
            error = %error,
            rollback_error = %rollback_err,
            "rollback failed"
        );
    }
    Err(error)
}

// ==================== In-transaction helpers ====================

/// Run `query` and scan exactly one resulting row.
pub async fn tx_write<C, T, F>(tx: &C, query: &BuiltQuery, scan: F) -> StoreResult<T>
where
    C: GenericClient,
    F: FnOnce(&Row) -> StoreResult<T>,
{
    log_statement(query);
    let rows = tx.query(&query.sql, &query.params_ref()).await?;
    match rows.len() {
        0 => Err(StoreError::not_found(no_rows_message(query))),
        1 => scan(&rows[0]),
        got => Err(StoreError::too_many_rows(1, got)),
    }
}

/// [`tx_write`] scanning with `FromRow`.
pub async fn tx_write_as<C, T>(tx: &C, query: &BuiltQuery) -> StoreResult<T>
where
    C: GenericClient,
    T: FromRow,
{
    tx_write(tx, query, T::from_row).await
}

/// Run `query` and scan every resulting row (zero or more).
pub async fn tx_bulk_write<C, T, F>(tx: &C, query: &BuiltQuery, mut scan: F) -> StoreResult<Vec<T>>
where
    C: GenericClient,
    F: FnMut(&Row) -> StoreResult<T>,
{
    log_statement(query);
    let rows = tx.query(&query.sql, &query.params_ref()).await?;
    rows.iter().map(&mut scan).collect()
}

/// [`tx_bulk_write`] scanning with `FromRow`.
pub async fn tx_bulk_write_as<C, T>(tx: &C, query: &BuiltQuery) -> StoreResult<Vec<T>>
where
    C: GenericClient,
    T: FromRow,
{
    tx_bulk_write(tx, query, T::from_row).await
}

/// Run `query` and return the number of affected rows.
pub async fn tx_execute<C>(tx: &C, query: &BuiltQuery) -> StoreResult<u64>
where
    C: GenericClient,
{
    log_statement(query);
    tx.execute(&query.sql, &query.params_ref()).await
}

fn no_rows_message(query: &BuiltQuery) -> String {
    if query.selector.is_empty() {
        format!("{} returned no rows", query.kind)
    } else {
        format!("{} returned no rows for {}", query.kind, query.selector)
    }
}

// ==================== Self-contained transactions ====================

/// Begin a transaction on a pooled connection, run [`tx_write`], commit.
///
/// Any failure rolls back. Serialization conflicts re-run the whole
/// transaction up to `policy.max_attempts()` times; `scan` may therefore be
/// called more than once.
pub async fn execute_tx_write<T, F>(
    pool: &Pool,
    policy: &RetryPolicy,
    query: &BuiltQuery,
    scan: F,
) -> StoreResult<T>
where
    F: Fn(&Row) -> StoreResult<T>,
{
    let mut client = pool.get().await?;
    let mut attempt = 1;
    loop {
        let result = crate::transaction!(&mut client, tx, { tx_write(&tx, query, &scan).await });
        match result {
            Err(e) if policy.should_retry(attempt, &e) => {
                __retry_backoff(policy, attempt, &e).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// [`execute_tx_write`] scanning with `FromRow`.
pub async fn execute_tx_write_as<T: FromRow>(
    pool: &Pool,
    policy: &RetryPolicy,
    query: &BuiltQuery,
) -> StoreResult<T> {
    execute_tx_write(pool, policy, query, T::from_row).await
}

/// Many-row counterpart of [`execute_tx_write`].
pub async fn execute_tx_bulk_write<T, F>(
    pool: &Pool,
    policy: &RetryPolicy,
    query: &BuiltQuery,
    scan: F,
) -> StoreResult<Vec<T>>
where
    F: Fn(&Row) -> StoreResult<T>,
{
    let mut client = pool.get().await?;
    let mut attempt = 1;
    loop {
        let result =
            crate::transaction!(&mut client, tx, { tx_bulk_write(&tx, query, &scan).await });
        match result {
            Err(e) if policy.should_retry(attempt, &e) => {
                __retry_backoff(policy, attempt, &e).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// [`execute_tx_bulk_write`] scanning with `FromRow`.
pub async fn execute_tx_bulk_write_as<T: FromRow>(
    pool: &Pool,
    policy: &RetryPolicy,
    query: &BuiltQuery,
) -> StoreResult<Vec<T>> {
    execute_tx_bulk_write(pool, policy, query, T::from_row).await
}

// ==================== Macros ====================

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `refstore::StoreResult<T>`; the macro
/// evaluates to the same type, including begin/commit failures.
///
/// ```ignore
/// let mut client = pool.get().await?;
/// let account = refstore::transaction!(&mut client, tx, {
///     let account = refstore::tx_write_as::<_, BankAccount>(&tx, &insert).await?;
///     refstore::tx_execute(&tx, &link).await?;
///     Ok(account)
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let __refstore_tx_result: $crate::StoreResult<_> = async {
            let $tx = ($client)
                .transaction()
                .await
                .map_err($crate::StoreError::from_db_error)?;

            let __refstore_body_result: $crate::StoreResult<_> = async { $body }.await;
            match __refstore_body_result {
                Ok(value) => {
                    $tx.commit()
                        .await
                        .map_err($crate::StoreError::from_db_error)?;
                    Ok(value)
                }
                Err(error) => $crate::tx::__after_rollback(error, $tx.rollback().await),
            }
        }
        .await;
        __refstore_tx_result
    }};
}

/// Like [`transaction!`], but re-runs the whole transaction when it fails
/// with a serialization conflict, following a [`RetryPolicy`].
///
/// The block runs once per attempt, so it must be safe to re-execute.
#[macro_export]
macro_rules! retry_transaction {
    ($client:expr, $policy:expr, $tx:ident, $body:block) => {{
        let __refstore_policy: $crate::RetryPolicy = $policy;
        let mut __refstore_attempt: u32 = 1;
        loop {
            match $crate::transaction!($client, $tx, $body) {
                Err(e) if __refstore_policy.should_retry(__refstore_attempt, &e) => {
                    $crate::tx::__retry_backoff(&__refstore_policy, __refstore_attempt, &e).await;
                    __refstore_attempt += 1;
                }
                other => break other,
            }
        }
    }};
}
