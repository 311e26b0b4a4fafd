//! # refstore
//!
//! Data-access core for reference-data services on Postgres/CockroachDB.
//!
//! ## Features
//!
//! - **Typed statement building**: identifiers, constant SQL and bound values
//!   are different types, and placeholders are numbered in one place
//! - **AND/OR composition**: [`FilterBracket`](qb::FilterBracket) nests to
//!   any depth with balanced parentheses
//! - **Transactional writes**: cardinality-checked helpers plus
//!   [`transaction!`] / [`retry_transaction!`] with retry on serialization
//!   conflicts
//! - **Concurrent relation lookups**: related entities resolve in parallel
//!   under one deadline
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use refstore::qb::{self, Predicate};
//!
//! let query = qb::update("core.blockchains")
//!     .set_update("status", "TERMINATED")
//!     .filter(Predicate::eq("id", "abc-123"))
//!     .generate_sql()?;
//! assert_eq!(query.sql, "UPDATE core.blockchains SET status = $1 WHERE id = $2");
//! ```
//!
//! ## Store
//!
//! ```ignore
//! let store = refstore::Store::connect(&refstore::StoreConfig::from_env()?).await?;
//! let chain = store
//!     .update_blockchain(
//!         BlockchainSelector::Symbol("ETH".into()),
//!         BlockchainUpdate { status: Some(EntityStatus::Inactive), ..Default::default() },
//!     )
//!     .await?;
//! ```

// Derive output refers to `::refstore`, which must also resolve in here.
extern crate self as refstore;

pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod qb;
pub mod resolve;
pub mod row;
pub mod tx;

#[cfg(feature = "derive")]
pub mod domain;
#[cfg(feature = "derive")]
pub mod store;

pub use client::GenericClient;
pub use config::{DatabaseConfig, ResolverConfig, RetryConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
pub use resolve::{Lookup, require, resolve_opt, with_deadline};
pub use row::{FromRow, RowExt, Table};
pub use tx::{
    RetryPolicy, execute_tx_bulk_write, execute_tx_bulk_write_as, execute_tx_write,
    execute_tx_write_as, tx_bulk_write, tx_bulk_write_as, tx_execute, tx_write, tx_write_as,
};

#[cfg(feature = "derive")]
pub use store::{Entity, EntityStatus, ListParams, Selector, Store};

#[cfg(feature = "derive")]
pub use refstore_derive::{FromRow, Table, TextEnum};

#[doc(hidden)]
pub mod __private {
    pub use bytes::BytesMut;
}
