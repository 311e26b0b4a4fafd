//! The service handle shared by every entity repository.

use crate::client::GenericClient;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::pool::create_pool_with_config;
use crate::qb::{self, BuiltQuery, FilterBracket, Order, Predicate};
use crate::resolve::Lookup;
use crate::row::{FromRow, Table};
use crate::tx::{self, RetryPolicy};
use deadpool_postgres::Pool;
use std::fmt::Debug;
use std::time::Duration;

/// A persisted record type.
pub trait Entity: Table + FromRow + Send + 'static {
    /// Human-readable name for error messages.
    const NAME: &'static str;
    /// Lifecycle status column, if the entity is soft-deleted.
    const STATUS_COLUMN: Option<&'static str> = Some("status");
}

/// One way of identifying a single entity.
pub trait Selector: Debug + Send + Sync {
    type Entity: Entity;

    /// WHERE predicate matching the selected entity.
    fn predicate(&self) -> Predicate;
}

/// Lifecycle state stored in every soft-deletable table.
#[derive(crate::TextEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
    Terminated,
}

/// Filtering and paging for [`Store::get_list`].
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub filter: Option<FilterBracket>,
    pub order_by: Option<(&'static str, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Include soft-deleted rows.
    pub include_terminated: bool,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FilterBracket) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order_by = Some((column, order));
        self
    }

    pub fn page(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn include_terminated(mut self) -> Self {
        self.include_terminated = true;
        self
    }
}

/// Pool, retry policy and resolver deadline, constructed once at startup and
/// passed to whoever needs data access.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
    retry: RetryPolicy,
    resolve_timeout: Duration,
}

impl Store {
    pub fn new(pool: Pool, retry: RetryPolicy, resolve_timeout: Duration) -> Self {
        Self {
            pool,
            retry,
            resolve_timeout,
        }
    }

    /// Build the pool from `config` without connecting.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let pool = create_pool_with_config(config)?;
        Ok(Self::new(
            pool,
            RetryPolicy::from(&config.retry),
            config.resolver.timeout(),
        ))
    }

    /// Build the pool and check out one connection to fail fast.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let store = Self::from_config(config)?;
        let client = store.pool.get().await?;
        drop(client);
        tracing::info!(
            target: "refstore",
            max_connections = config.database.max_connections,
            "connected"
        );
        Ok(store)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }

    // ==================== Generic repository operations ====================

    /// Fetch exactly one entity; more than one match is an error.
    pub async fn get<S: Selector>(&self, selector: S) -> StoreResult<S::Entity> {
        let query = get_query(&selector)?;
        tx::log_statement(&query);
        let row = match self.pool.query_one_strict(&query.sql, &query.params_ref()).await {
            Err(StoreError::NotFound(_)) => {
                return Err(StoreError::not_found(format!(
                    "{} not found: {}",
                    <S::Entity as Entity>::NAME,
                    query.selector
                )));
            }
            other => other?,
        };
        S::Entity::from_row(&row)
    }

    /// List entities. Terminated rows are excluded unless asked for.
    pub async fn get_list<E: Entity>(&self, params: ListParams) -> StoreResult<Vec<E>> {
        let query = list_query::<E>(params)?;
        tx::log_statement(&query);
        let rows = self.pool.query(&query.sql, &query.params_ref()).await?;
        rows.iter().map(E::from_row).collect()
    }

    /// Mark the selected entity terminated and return it.
    pub async fn soft_delete<S: Selector>(&self, selector: S) -> StoreResult<S::Entity> {
        let query = soft_delete_query(&selector)?;
        tx::execute_tx_write_as(&self.pool, &self.retry, &query).await
    }

    /// Physically delete matching rows; returns the number removed.
    pub async fn purge<S: Selector>(&self, selector: S) -> StoreResult<u64> {
        let query = qb::delete(<S::Entity as Table>::TABLE)
            .filter(selector.predicate())
            .generate_sql()?;
        let mut client = self.pool.get().await?;
        crate::transaction!(&mut client, tx, { tx::tx_execute(&tx, &query).await })
    }
}

impl<S: Selector> Lookup<S> for Store {
    type Output = S::Entity;

    async fn lookup(&self, selector: S) -> StoreResult<S::Entity> {
        self.get(selector).await
    }
}

pub(crate) fn get_query<S: Selector>(selector: &S) -> StoreResult<BuiltQuery> {
    qb::select(<S::Entity as Table>::TABLE)
        .select(<S::Entity as Table>::COLUMNS)
        .filter(selector.predicate())
        .generate_sql()
}

pub(crate) fn list_query<E: Entity>(params: ListParams) -> StoreResult<BuiltQuery> {
    let mut qb = qb::select(E::TABLE).select(E::COLUMNS);
    if let (Some(status), false) = (E::STATUS_COLUMN, params.include_terminated) {
        qb = qb.filter(Predicate::ne(status, EntityStatus::Terminated));
    }
    if let Some(filter) = params.filter {
        qb = qb.filter_bracket(filter);
    }
    if let Some((column, order)) = params.order_by {
        qb = qb.order_by(column, order);
    }
    if let Some(limit) = params.limit {
        qb = qb.limit(limit);
    }
    if let Some(offset) = params.offset {
        qb = qb.offset(offset);
    }
    qb.generate_sql()
}

pub(crate) fn soft_delete_query<S: Selector>(selector: &S) -> StoreResult<BuiltQuery> {
    let Some(status) = <S::Entity as Entity>::STATUS_COLUMN else {
        return Err(StoreError::builder(format!(
            "{} has no status column",
            <S::Entity as Entity>::NAME
        )));
    };
    qb::update(<S::Entity as Table>::TABLE)
        .set_update(status, EntityStatus::Terminated)
        .filter(selector.predicate())
        .set_return_fields(<S::Entity as Table>::COLUMNS)
        .generate_sql()
}
