use super::{non_blank, normalize_code};
use crate::error::{StoreError, StoreResult};
use crate::qb::{self, BuiltQuery, Predicate};
use crate::store::{Entity, EntityStatus, Selector, Store};
use crate::tx::execute_tx_write_as;
use crate::{FromRow, Table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.blockchains")]
pub struct Blockchain {
    #[store(id)]
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Blockchain {
    const NAME: &'static str = "blockchain";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainSelector {
    Id(Uuid),
    Name(String),
    Symbol(String),
}

impl Selector for BlockchainSelector {
    type Entity = Blockchain;

    fn predicate(&self) -> Predicate {
        match self {
            BlockchainSelector::Id(id) => Predicate::eq("id", *id),
            BlockchainSelector::Name(name) => Predicate::eq("name", name.clone()),
            BlockchainSelector::Symbol(symbol) => Predicate::eq("symbol", normalize_code(symbol)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBlockchain {
    pub name: String,
    pub symbol: String,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BlockchainUpdate {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<EntityStatus>,
}

impl Store {
    pub async fn create_blockchain(&self, new: NewBlockchain) -> StoreResult<Blockchain> {
        let query = insert_query(Uuid::new_v4(), &new)?;
        execute_tx_write_as(self.pool(), self.retry_policy(), &query).await
    }

    /// Apply `update` to the selected blockchain and return the new row.
    pub async fn update_blockchain(
        &self,
        selector: BlockchainSelector,
        update: BlockchainUpdate,
    ) -> StoreResult<Blockchain> {
        let query = update_query(&selector, update)?;
        execute_tx_write_as(self.pool(), self.retry_policy(), &query).await
    }
}

fn insert_query(id: Uuid, new: &NewBlockchain) -> StoreResult<BuiltQuery> {
    non_blank(&new.name, "blockchain name")?;
    non_blank(&new.symbol, "blockchain symbol")?;

    qb::insert(Blockchain::TABLE)
        .set_insert_fields(["id", "name", "symbol", "status"])
        .set_insert_values(crate::row![
            id,
            new.name.trim().to_owned(),
            normalize_code(&new.symbol),
            EntityStatus::Active
        ])?
        .set_return_fields(Blockchain::COLUMNS)
        .generate_sql()
}

fn update_query(selector: &BlockchainSelector, update: BlockchainUpdate) -> StoreResult<BuiltQuery> {
    if let Some(name) = &update.name {
        non_blank(name, "blockchain name")?;
    }
    if let Some(symbol) = &update.symbol {
        non_blank(symbol, "blockchain symbol")?;
    }
    let qb = qb::update(Blockchain::TABLE)
        .set_update_opt("name", update.name.map(|n| n.trim().to_owned()))
        .set_update_opt("symbol", update.symbol.as_deref().map(normalize_code))
        .set_update_opt("status", update.status);
    if !qb.is_updatable() {
        return Err(StoreError::validation("blockchain update changes nothing"));
    }
    qb.set_update_expr("updated_at", "now()")
        .filter(selector.predicate())
        .set_return_fields(Blockchain::COLUMNS)
        .generate_sql()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETURNING: &str = " RETURNING id, name, symbol, status, created_at, updated_at";

    #[test]
    fn insert_normalizes_symbol() {
        let id = Uuid::nil();
        let query = insert_query(
            id,
            &NewBlockchain {
                name: "Ethereum".into(),
                symbol: "eth".into(),
            },
        )
        .unwrap();
        assert_eq!(
            query.sql,
            format!(
                "INSERT INTO core.blockchains (id, name, symbol, status) VALUES ($1, $2, $3, $4){RETURNING}"
            )
        );
        let debug: Vec<String> = query.params.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(debug[2], "\"ETH\"");
        assert_eq!(debug[3], "Active");
    }

    #[test]
    fn insert_requires_name_and_symbol() {
        let err = insert_query(Uuid::nil(), &NewBlockchain::default()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{err}");
    }

    #[test]
    fn status_update_by_id() {
        let id = Uuid::nil();
        let query = update_query(
            &BlockchainSelector::Id(id),
            BlockchainUpdate {
                status: Some(EntityStatus::Terminated),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            query.sql,
            format!("UPDATE core.blockchains SET status = $1, updated_at = now() WHERE id = $2{RETURNING}")
        );
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.selector, format!("id = {id:?}"));
    }

    #[test]
    fn blank_symbol_update_is_rejected() {
        let err = update_query(
            &BlockchainSelector::Name("Ethereum".into()),
            BlockchainUpdate {
                symbol: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: blockchain symbol must not be empty"
        );
    }

    #[test]
    fn empty_update_is_rejected_before_building() {
        let err = update_query(
            &BlockchainSelector::Symbol("btc".into()),
            BlockchainUpdate::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: blockchain update changes nothing");
    }
}
