//! Concurrent lookup of related entities.
//!
//! Before a write is validated, every entity it references (branch, currency,
//! country, ...) is fetched by its selector. The lookups are independent, so
//! a per-entity resolver runs them together with `tokio::try_join!`:
//!
//! ```ignore
//! let (branch, currency) = with_deadline(timeout, async {
//!     tokio::try_join!(
//!         resolve_opt(store, branch_selector),
//!         resolve_opt(store, currency_selector),
//!     )
//! })
//! .await?;
//! ```
//!
//! - An absent selector resolves to `None` without touching the database.
//! - A lookup that finds nothing resolves to `None`; the caller decides
//!   whether that is a validation error.
//! - Any other failure is returned and drops the sibling lookups.
//! - Everything runs inside the caller's future, so cancelling the caller
//!   (or hitting the deadline) cancels every in-flight lookup.

use crate::error::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;

/// Point lookup of one entity by selector `S`.
pub trait Lookup<S>: Send + Sync {
    type Output: Send;

    /// Fetch the entity. `StoreError::NotFound` when nothing matches.
    fn lookup(&self, selector: S) -> impl Future<Output = StoreResult<Self::Output>> + Send;
}

/// Resolve an optional selector.
///
/// `None` selector and `NotFound` both give `Ok(None)`; other errors pass
/// through.
pub async fn resolve_opt<L, S>(lookup: &L, selector: Option<S>) -> StoreResult<Option<L::Output>>
where
    L: Lookup<S>,
    S: std::fmt::Debug,
{
    let Some(selector) = selector else {
        return Ok(None);
    };
    tracing::trace!(target: "refstore.resolve", ?selector, "resolving relation");
    match lookup.lookup(selector).await {
        Ok(found) => Ok(Some(found)),
        Err(e) if e.is_not_found() => {
            tracing::trace!(target: "refstore.resolve", "relation not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Bound `fut` by `timeout`; expiry drops it and returns `StoreError::Timeout`.
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Turn a missing required relation into a validation error.
pub fn require<T>(value: Option<T>, what: &str) -> StoreResult<T> {
    value.ok_or_else(|| StoreError::validation(format!("{what} does not exist")))
}
