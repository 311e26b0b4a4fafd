use super::{BankBranch, BankBranchSelector, Country, CountrySelector, Currency, CurrencySelector};
use super::{live, non_blank, normalize_code};
use crate::error::{StoreError, StoreResult};
use crate::qb::{self, BuiltQuery, Predicate};
use crate::resolve::{Lookup, require, resolve_opt, with_deadline};
use crate::store::{Entity, EntityStatus, Selector, Store};
use crate::tx::execute_tx_write_as;
use crate::{FromRow, Table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.bank_accounts")]
pub struct BankAccount {
    #[store(id)]
    pub id: Uuid,
    pub iban: String,
    pub account_holder: String,
    pub bank_branch_id: Option<Uuid>,
    pub currency_id: Uuid,
    pub country_id: Option<Uuid>,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for BankAccount {
    const NAME: &'static str = "bank account";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankAccountSelector {
    Id(Uuid),
    /// IBAN, with or without grouping spaces.
    Iban(String),
}

impl Selector for BankAccountSelector {
    type Entity = BankAccount;

    fn predicate(&self) -> Predicate {
        match self {
            BankAccountSelector::Id(id) => Predicate::eq("id", *id),
            BankAccountSelector::Iban(iban) => Predicate::eq("iban", normalize_code(iban)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub iban: String,
    pub account_holder: String,
    pub bank_branch: Option<BankBranchSelector>,
    pub currency: CurrencySelector,
    /// Defaults to the branch's country when absent.
    pub country: Option<CountrySelector>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BankAccountUpdate {
    pub iban: Option<String>,
    pub account_holder: Option<String>,
    pub bank_branch: Option<BankBranchSelector>,
    pub currency: Option<CurrencySelector>,
    pub country: Option<CountrySelector>,
    pub status: Option<EntityStatus>,
}

/// Related entities a bank account references. A field is `None` when it
/// was not requested or does not exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankAccountRelations {
    pub bank_branch: Option<BankBranch>,
    pub currency: Option<Currency>,
    pub country: Option<Country>,
}

/// Look up the branch, currency and country concurrently.
///
/// Missing relations come back as `None`; any other failure (or the deadline)
/// aborts all three lookups.
pub async fn resolve_bank_account_relations<L>(
    lookup: &L,
    timeout: Duration,
    bank_branch: Option<BankBranchSelector>,
    currency: Option<CurrencySelector>,
    country: Option<CountrySelector>,
) -> StoreResult<BankAccountRelations>
where
    L: Lookup<BankBranchSelector, Output = BankBranch>
        + Lookup<CurrencySelector, Output = Currency>
        + Lookup<CountrySelector, Output = Country>,
{
    let (bank_branch, currency, country) = with_deadline(timeout, async {
        tokio::try_join!(
            resolve_opt(lookup, bank_branch),
            resolve_opt(lookup, currency),
            resolve_opt(lookup, country),
        )
    })
    .await?;
    Ok(BankAccountRelations {
        bank_branch,
        currency,
        country,
    })
}

/// Which relations the caller asked for.
#[derive(Debug, Clone, Copy, Default)]
struct Requested {
    bank_branch: bool,
    currency: bool,
    country: bool,
}

/// Foreign keys after validation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RelationIds {
    bank_branch_id: Option<Uuid>,
    currency_id: Option<Uuid>,
    country_id: Option<Uuid>,
}

impl BankAccountRelations {
    /// Every requested relation must exist and must not be terminated.
    fn validate(self, requested: Requested) -> StoreResult<RelationIds> {
        let bank_branch = live(
            requested.bank_branch,
            self.bank_branch,
            |b| b.status,
            BankBranch::NAME,
        )?;
        let currency = live(requested.currency, self.currency, |c| c.status, Currency::NAME)?;
        let country = live(requested.country, self.country, |c| c.status, Country::NAME)?;
        Ok(RelationIds {
            bank_branch_id: bank_branch.as_ref().map(|b| b.id),
            currency_id: currency.map(|c| c.id),
            country_id: country
                .map(|c| c.id)
                .or_else(|| bank_branch.map(|b| b.country_id)),
        })
    }
}

impl Store {
    /// [`resolve_bank_account_relations`] against this store with its
    /// configured deadline.
    pub async fn bank_account_relations(
        &self,
        bank_branch: Option<BankBranchSelector>,
        currency: Option<CurrencySelector>,
        country: Option<CountrySelector>,
    ) -> StoreResult<BankAccountRelations> {
        resolve_bank_account_relations(self, self.resolve_timeout(), bank_branch, currency, country)
            .await
    }

    pub async fn create_bank_account(&self, new: NewBankAccount) -> StoreResult<BankAccount> {
        let query = self.prepare_bank_account_insert(Uuid::new_v4(), &new).await?;
        execute_tx_write_as(self.pool(), self.retry_policy(), &query).await
    }

    /// Apply `update` to the selected bank account. Changed relations are
    /// resolved and validated like on create.
    pub async fn update_bank_account(
        &self,
        selector: BankAccountSelector,
        update: BankAccountUpdate,
    ) -> StoreResult<BankAccount> {
        let requested = Requested {
            bank_branch: update.bank_branch.is_some(),
            currency: update.currency.is_some(),
            country: update.country.is_some(),
        };
        let mut ids = self
            .bank_account_relations(
                update.bank_branch.clone(),
                update.currency.clone(),
                update.country.clone(),
            )
            .await?
            .validate(requested)?;
        // The branch's country is only a default on create.
        if update.country.is_none() {
            ids.country_id = None;
        }
        let query = update_query(&selector, &update, ids)?;
        execute_tx_write_as(self.pool(), self.retry_policy(), &query).await
    }

    /// Resolve and validate the relations of `new`, then build its INSERT.
    pub(crate) async fn prepare_bank_account_insert(
        &self,
        id: Uuid,
        new: &NewBankAccount,
    ) -> StoreResult<BuiltQuery> {
        validate_new(new)?;
        let ids = self
            .bank_account_relations(
                new.bank_branch.clone(),
                Some(new.currency.clone()),
                new.country.clone(),
            )
            .await?
            .validate(requested_for(new))?;
        insert_query(id, new, ids)
    }
}

fn requested_for(new: &NewBankAccount) -> Requested {
    Requested {
        bank_branch: new.bank_branch.is_some(),
        currency: true,
        country: new.country.is_some(),
    }
}

fn validate_new(new: &NewBankAccount) -> StoreResult<()> {
    non_blank(&new.iban, "iban")?;
    non_blank(&new.account_holder, "account holder")
}

fn insert_query(id: Uuid, new: &NewBankAccount, ids: RelationIds) -> StoreResult<BuiltQuery> {
    let currency_id = require(ids.currency_id, Currency::NAME)?;
    qb::insert(BankAccount::TABLE)
        .set_insert_fields([
            "id",
            "iban",
            "account_holder",
            "bank_branch_id",
            "currency_id",
            "country_id",
            "status",
        ])
        .set_insert_values(crate::row![
            id,
            normalize_code(&new.iban),
            new.account_holder.trim().to_owned(),
            ids.bank_branch_id,
            currency_id,
            ids.country_id,
            EntityStatus::Active,
        ])?
        .set_return_fields(BankAccount::COLUMNS)
        .generate_sql()
}

fn update_query(
    selector: &BankAccountSelector,
    update: &BankAccountUpdate,
    ids: RelationIds,
) -> StoreResult<BuiltQuery> {
    if let Some(iban) = &update.iban {
        non_blank(iban, "iban")?;
    }
    if let Some(holder) = &update.account_holder {
        non_blank(holder, "account holder")?;
    }
    let qb = qb::update(BankAccount::TABLE)
        .set_update_opt("iban", update.iban.as_deref().map(normalize_code))
        .set_update_opt(
            "account_holder",
            update.account_holder.as_deref().map(|h| h.trim().to_owned()),
        )
        .set_update_opt("bank_branch_id", ids.bank_branch_id)
        .set_update_opt("currency_id", ids.currency_id)
        .set_update_opt("country_id", ids.country_id)
        .set_update_opt("status", update.status);
    if !qb.is_updatable() {
        return Err(StoreError::validation("bank account update changes nothing"));
    }
    qb.set_update_expr("updated_at", "now()")
        .filter(selector.predicate())
        .set_return_fields(BankAccount::COLUMNS)
        .generate_sql()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn branch(status: EntityStatus) -> BankBranch {
        BankBranch {
            id: Uuid::from_u128(1),
            name: "Zurich Main".into(),
            swift: Some("UBSWCHZH80A".into()),
            bank_code: "00230".into(),
            branch_code: "001".into(),
            country_id: Uuid::from_u128(41),
            status,
        }
    }

    fn chf() -> Currency {
        Currency {
            id: Uuid::from_u128(756),
            code: "CHF".into(),
            name: "Swiss franc".into(),
            minor_units: 2,
            status: EntityStatus::Active,
        }
    }

    fn germany() -> Country {
        Country {
            id: Uuid::from_u128(49),
            alpha2: "DE".into(),
            alpha3: "DEU".into(),
            name: "Germany".into(),
            status: EntityStatus::Active,
        }
    }

    /// In-memory reference data: one branch (swift UBSWCHZH80A), CHF, DE.
    /// Codes match case-insensitively, like the selector predicates.
    #[derive(Default)]
    struct Fixtures {
        terminated_branch: bool,
        lookups: AtomicUsize,
    }

    impl Lookup<BankBranchSelector> for Fixtures {
        type Output = BankBranch;

        async fn lookup(&self, selector: BankBranchSelector) -> StoreResult<BankBranch> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let status = if self.terminated_branch {
                EntityStatus::Terminated
            } else {
                EntityStatus::Active
            };
            match selector {
                BankBranchSelector::Swift(s) if normalize_code(&s) == "UBSWCHZH80A" => Ok(branch(status)),
                other => Err(StoreError::not_found(format!("{other:?}"))),
            }
        }
    }

    impl Lookup<CurrencySelector> for Fixtures {
        type Output = Currency;

        async fn lookup(&self, selector: CurrencySelector) -> StoreResult<Currency> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match selector {
                CurrencySelector::Code(c) if normalize_code(&c) == "CHF" => Ok(chf()),
                CurrencySelector::Code(c) if normalize_code(&c) == "ERR" => {
                    Err(StoreError::Connection("connection reset".into()))
                }
                other => Err(StoreError::not_found(format!("{other:?}"))),
            }
        }
    }

    impl Lookup<CountrySelector> for Fixtures {
        type Output = Country;

        async fn lookup(&self, selector: CountrySelector) -> StoreResult<Country> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match selector {
                CountrySelector::Alpha2(c) if normalize_code(&c) == "DE" => Ok(germany()),
                other => Err(StoreError::not_found(format!("{other:?}"))),
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn new_account(branch: Option<&str>, currency: &str, country: Option<&str>) -> NewBankAccount {
        NewBankAccount {
            iban: "CH93 0076 2011 6238 5295 7".into(),
            account_holder: "Ada Lovelace".into(),
            bank_branch: branch.map(|s| BankBranchSelector::Swift(s.into())),
            currency: CurrencySelector::Code(currency.into()),
            country: country.map(|s| CountrySelector::Alpha2(s.into())),
        }
    }

    async fn resolve(fixtures: &Fixtures, new: &NewBankAccount) -> StoreResult<RelationIds> {
        resolve_bank_account_relations(
            fixtures,
            TIMEOUT,
            new.bank_branch.clone(),
            Some(new.currency.clone()),
            new.country.clone(),
        )
        .await?
        .validate(requested_for(new))
    }

    #[tokio::test]
    async fn country_defaults_to_the_branch_country() {
        let fixtures = Fixtures::default();
        let ids = resolve(&fixtures, &new_account(Some("UBSWCHZH80A"), "CHF", None))
            .await
            .unwrap();
        assert_eq!(
            ids,
            RelationIds {
                bank_branch_id: Some(Uuid::from_u128(1)),
                currency_id: Some(Uuid::from_u128(756)),
                country_id: Some(Uuid::from_u128(41)),
            }
        );
        assert_eq!(fixtures.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_country_wins() {
        let fixtures = Fixtures::default();
        let ids = resolve(&fixtures, &new_account(Some("ubswchzh80a"), "chf", Some("de")))
            .await
            .unwrap();
        assert_eq!(ids.country_id, Some(Uuid::from_u128(49)));
        assert_eq!(ids.currency_id, Some(Uuid::from_u128(756)));
    }

    #[tokio::test]
    async fn missing_relation_is_a_validation_error() {
        let fixtures = Fixtures::default();
        let err = resolve(&fixtures, &new_account(None, "XXX", None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: currency does not exist");

        let err = resolve(&fixtures, &new_account(Some("NOPE"), "CHF", None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: bank branch does not exist");
    }

    #[tokio::test]
    async fn terminated_relation_is_rejected() {
        let fixtures = Fixtures {
            terminated_branch: true,
            ..Default::default()
        };
        let err = resolve(&fixtures, &new_account(Some("UBSWCHZH80A"), "CHF", None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: bank branch is terminated");
    }

    #[tokio::test]
    async fn lookup_failure_is_not_a_validation_error() {
        let fixtures = Fixtures::default();
        let err = resolve(&fixtures, &new_account(Some("UBSWCHZH80A"), "ERR", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)), "{err}");
    }

    #[test]
    fn insert_binds_resolved_ids() {
        let ids = RelationIds {
            bank_branch_id: None,
            currency_id: Some(Uuid::from_u128(756)),
            country_id: None,
        };
        let query = insert_query(Uuid::nil(), &new_account(None, "CHF", None), ids).unwrap();
        assert!(query.sql.starts_with(
            "INSERT INTO core.bank_accounts (id, iban, account_holder, bank_branch_id, currency_id, country_id, status) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id, iban,"
        ));
        let debug: Vec<String> = query.params.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(debug[1], "\"CH9300762011623852957\"");
        assert_eq!(debug[3], "None");
    }

    #[test]
    fn insert_without_currency_fails() {
        let err = insert_query(
            Uuid::nil(),
            &new_account(None, "CHF", None),
            RelationIds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{err}");
    }

    #[test]
    fn update_only_sets_changed_columns() {
        let update = BankAccountUpdate {
            account_holder: Some("Grace Hopper".into()),
            ..Default::default()
        };
        let query = update_query(
            &BankAccountSelector::Iban("ch93 0076".into()),
            &update,
            RelationIds::default(),
        )
        .unwrap();
        assert!(query.sql.starts_with(
            "UPDATE core.bank_accounts SET account_holder = $1, updated_at = now() WHERE iban = $2 RETURNING"
        ));
        assert_eq!(query.selector, r#"iban = "CH930076""#);
    }

    #[test]
    fn blank_iban_update_is_rejected() {
        let update = BankAccountUpdate {
            iban: Some("   ".into()),
            ..Default::default()
        };
        let err = update_query(
            &BankAccountSelector::Id(Uuid::nil()),
            &update,
            RelationIds::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: iban must not be empty");
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = update_query(
            &BankAccountSelector::Id(Uuid::nil()),
            &BankAccountUpdate::default(),
            RelationIds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{err}");
    }
}
