use super::{BankAccount, BankAccountSelector, Country, CountrySelector, NewBankAccount};
use super::{live, non_blank};
use crate::error::{StoreError, StoreResult};
use crate::qb::{self, BuiltQuery, Param, Predicate};
use crate::resolve::{require, resolve_opt, with_deadline};
use crate::store::{Entity, EntityStatus, Selector, Store};
use crate::tx::{execute_tx_bulk_write_as, tx_write_as};
use crate::{FromRow, Table};
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.recipients")]
pub struct Recipient {
    #[store(id)]
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub country_id: Option<Uuid>,
    /// Free-form JSONB attributes.
    pub metadata: serde_json::Value,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity for Recipient {
    const NAME: &'static str = "recipient";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSelector {
    Id(Uuid),
}

impl Selector for RecipientSelector {
    type Entity = Recipient;

    fn predicate(&self) -> Predicate {
        match self {
            RecipientSelector::Id(id) => Predicate::eq("id", *id),
        }
    }
}

/// Association between a recipient and one of its bank accounts.
#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.recipient_bank_accounts")]
pub struct RecipientBankAccount {
    #[store(id)]
    pub recipient_id: Uuid,
    #[store(id)]
    pub bank_account_id: Uuid,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for RecipientBankAccount {
    const NAME: &'static str = "recipient bank account";
    const STATUS_COLUMN: Option<&'static str> = None;
}

#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub display_name: String,
    pub email: Option<String>,
    pub country: Option<CountrySelector>,
    pub metadata: serde_json::Value,
}

impl Store {
    /// Create a recipient together with its first (primary) bank account.
    ///
    /// Both inserts and the link run in one transaction; a serialization
    /// conflict re-runs all three.
    pub async fn create_recipient_with_bank_account(
        &self,
        recipient: NewRecipient,
        account: NewBankAccount,
    ) -> StoreResult<(Recipient, BankAccount)> {
        non_blank(&recipient.display_name, "display name")?;
        let recipient_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        let (insert_account, country) = tokio::try_join!(
            self.prepare_bank_account_insert(account_id, &account),
            with_deadline(
                self.resolve_timeout(),
                resolve_opt(self, recipient.country.clone())
            ),
        )?;
        let country = live(
            recipient.country.is_some(),
            country,
            |c: &Country| c.status,
            Country::NAME,
        )?;

        let insert_recipient = insert_query(recipient_id, &recipient, country.map(|c| c.id))?;
        let link = link_query(recipient_id, &[account_id], true)?;

        let mut client = self.pool().get().await?;
        crate::retry_transaction!(&mut client, *self.retry_policy(), tx, {
            let recipient = tx_write_as::<_, Recipient>(&tx, &insert_recipient).await?;
            let account = tx_write_as::<_, BankAccount>(&tx, &insert_account).await?;
            tx_write_as::<_, RecipientBankAccount>(&tx, &link).await?;
            Ok((recipient, account))
        })
    }

    /// Link existing bank accounts to a recipient. Already-linked accounts
    /// are left as they are; returns one association row per account.
    pub async fn link_recipient_bank_accounts(
        &self,
        recipient: RecipientSelector,
        accounts: Vec<BankAccountSelector>,
    ) -> StoreResult<Vec<RecipientBankAccount>> {
        if accounts.is_empty() {
            return Err(StoreError::validation("no bank accounts to link"));
        }

        let account_lookups: Vec<_> = accounts
            .iter()
            .map(|selector| resolve_opt(self, Some(selector.clone())))
            .collect();
        let (found_recipient, found_accounts) = with_deadline(self.resolve_timeout(), async {
            tokio::try_join!(
                resolve_opt(self, Some(recipient.clone())),
                try_join_all(account_lookups),
            )
        })
        .await?;

        let recipient = live(true, found_recipient, |r| r.status, Recipient::NAME)?;
        let recipient = require(recipient, Recipient::NAME)?;

        let mut account_ids = Vec::with_capacity(accounts.len());
        for (selector, found) in accounts.iter().zip(found_accounts) {
            let Some(account) = found else {
                return Err(StoreError::validation(format!(
                    "{} does not exist: {selector:?}",
                    BankAccount::NAME
                )));
            };
            if account.status == EntityStatus::Terminated {
                return Err(StoreError::validation(format!(
                    "{} is terminated: {selector:?}",
                    BankAccount::NAME
                )));
            }
            if !account_ids.contains(&account.id) {
                account_ids.push(account.id);
            }
        }

        let query = link_query(recipient.id, &account_ids, false)?;
        execute_tx_bulk_write_as(self.pool(), self.retry_policy(), &query).await
    }
}

fn insert_query(
    id: Uuid,
    recipient: &NewRecipient,
    country_id: Option<Uuid>,
) -> StoreResult<BuiltQuery> {
    qb::insert(Recipient::TABLE)
        .set_insert_fields([
            "id",
            "display_name",
            "email",
            "country_id",
            "metadata",
            "status",
        ])
        .set_insert_values(crate::row![
            id,
            recipient.display_name.trim().to_owned(),
            recipient.email.as_deref().map(str::trim).map(str::to_owned),
            country_id,
            recipient.metadata.clone(),
            EntityStatus::Active,
        ])?
        .set_return_fields(Recipient::COLUMNS)
        .generate_sql()
}

/// Multi-row association upsert.
///
/// With `primary` the first account is marked primary and an existing link's
/// flag is overwritten; without it only the keys are written, so existing
/// links keep their flag.
fn link_query(recipient_id: Uuid, account_ids: &[Uuid], primary: bool) -> StoreResult<BuiltQuery> {
    let mut qb = qb::upsert(RecipientBankAccount::TABLE).conflict_on(RecipientBankAccount::KEY_COLUMNS);
    if primary {
        qb = qb.set_insert_fields(["recipient_id", "bank_account_id", "is_primary"]);
    } else {
        qb = qb.set_insert_fields(RecipientBankAccount::KEY_COLUMNS);
    }
    for (i, account_id) in account_ids.iter().enumerate() {
        let mut row = vec![Param::new(recipient_id), Param::new(*account_id)];
        if primary {
            row.push(Param::new(i == 0));
        }
        qb = qb.set_insert_values(row)?;
    }
    qb.set_return_fields(RecipientBankAccount::COLUMNS)
        .generate_sql()
}
