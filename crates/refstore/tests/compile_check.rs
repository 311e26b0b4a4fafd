//! Compile-only tests for the data-access API.
//!
//! These tests verify that key API surfaces compile against the real driver
//! types. They do NOT execute against a database.

#![allow(dead_code)]

use refstore::domain::{
    BankAccount, BankAccountSelector, Blockchain, BlockchainSelector, BlockchainUpdate,
    CurrencySelector, NewBankAccount, NewRecipient, Recipient, RecipientSelector,
};
use refstore::qb::{self, FilterBracket, Order, Predicate};
use refstore::{
    EntityStatus, GenericClient, ListParams, RetryPolicy, Store, StoreResult, tx_bulk_write_as,
    tx_execute, tx_write, tx_write_as,
};

// ── Compile checks ──────────────────────────────────────────────────────────

#[test]
fn compile_tx_helpers_on_driver_types() {
    async fn on_transaction(tx: &tokio_postgres::Transaction<'_>) -> StoreResult<()> {
        let insert = qb::insert("core.currencies")
            .set_insert_fields(["id", "code"])
            .set_insert_values(refstore::row![1_i64, "CHF"])?
            .set_return_fields(["id"])
            .generate_sql()?;
        let _id: i64 = tx_write(tx, &insert, |row| Ok(row.get(0))).await?;
        Ok(())
    }

    async fn on_pool(pool: &deadpool_postgres::Pool) -> StoreResult<Vec<Blockchain>> {
        let query = qb::select("core.blockchains")
            .filter(Predicate::eq("status", EntityStatus::Active))
            .generate_sql()?;
        let client = pool.get().await?;
        let _ = client.query_opt(&query.sql, &query.params_ref()).await?;
        tx_bulk_write_as(&client, &query).await
    }

    let _ = on_transaction;
    let _ = on_pool;
}

#[test]
fn compile_transaction_macros() {
    async fn link(pool: &deadpool_postgres::Pool, policy: RetryPolicy) -> StoreResult<u64> {
        let delete = qb::delete("core.recipient_bank_accounts")
            .filter(Predicate::eq("recipient_id", 7_i64))
            .generate_sql()?;
        let mut client = pool.get().await?;

        refstore::transaction!(&mut client, tx, { tx_execute(&tx, &delete).await })?;

        refstore::retry_transaction!(&mut client, policy, tx, {
            let removed = tx_execute(&tx, &delete).await?;
            Ok(removed)
        })
    }

    async fn plain_client(client: &mut tokio_postgres::Client) -> StoreResult<Blockchain> {
        let update = qb::update("core.blockchains")
            .set_update("status", EntityStatus::Terminated)
            .filter(Predicate::eq("symbol", "ETH"))
            .set_return_fields(["id", "name", "symbol", "status", "created_at", "updated_at"])
            .generate_sql()?;
        refstore::transaction!(client, tx, { tx_write_as(&tx, &update).await })
    }

    let _ = link;
    let _ = plain_client;
}

#[test]
fn compile_store_operations() {
    async fn service(store: &Store) -> StoreResult<()> {
        let _chain: Blockchain = store
            .update_blockchain(
                BlockchainSelector::Symbol("ETH".into()),
                BlockchainUpdate {
                    status: Some(EntityStatus::Inactive),
                    ..Default::default()
                },
            )
            .await?;

        let _active: Vec<Blockchain> = store
            .get_list(
                ListParams::new()
                    .filter(
                        FilterBracket::or()
                            .set_filter(Predicate::eq("symbol", "BTC"))
                            .set_filter(Predicate::eq("symbol", "ETH")),
                    )
                    .order_by("name", Order::Asc)
                    .page(20, 0),
            )
            .await?;

        let (_recipient, _account): (Recipient, BankAccount) = store
            .create_recipient_with_bank_account(
                NewRecipient {
                    display_name: "Ada".into(),
                    email: None,
                    country: None,
                    metadata: serde_json::json!({}),
                },
                NewBankAccount {
                    iban: "CH93 0076 2011 6238 5295 7".into(),
                    account_holder: "Ada".into(),
                    bank_branch: None,
                    currency: CurrencySelector::Code("CHF".into()),
                    country: None,
                },
            )
            .await?;

        let _links = store
            .link_recipient_bank_accounts(
                RecipientSelector::Id(uuid::Uuid::nil()),
                vec![BankAccountSelector::Iban("CH93 0076 2011 6238 5295 7".into())],
            )
            .await?;

        let _gone = store
            .soft_delete(BlockchainSelector::Name("Dogecoin".into()))
            .await?;
        Ok(())
    }

    fn assert_send<T: Send>(_: &T) {}

    let _ = |store: &'static Store| {
        assert_send(&service(store));
    };
}
