use super::normalize_code;
use crate::qb::{FilterBracket, Predicate};
use crate::store::{Entity, EntityStatus, Selector};
use crate::{FromRow, Table};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.bank_branches")]
pub struct BankBranch {
    #[store(id)]
    pub id: Uuid,
    pub name: String,
    pub swift: Option<String>,
    pub bank_code: String,
    pub branch_code: String,
    pub country_id: Uuid,
    pub status: EntityStatus,
}

impl Entity for BankBranch {
    const NAME: &'static str = "bank branch";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankBranchSelector {
    Id(Uuid),
    /// SWIFT/BIC code.
    Swift(String),
    /// National bank code plus branch code; only unique together.
    BranchCode {
        bank_code: String,
        branch_code: String,
    },
}

impl Selector for BankBranchSelector {
    type Entity = BankBranch;

    fn predicate(&self) -> Predicate {
        match self {
            BankBranchSelector::Id(id) => Predicate::eq("id", *id),
            BankBranchSelector::Swift(swift) => Predicate::eq("swift", normalize_code(swift)),
            BankBranchSelector::BranchCode {
                bank_code,
                branch_code,
            } => FilterBracket::and()
                .set_filter(Predicate::eq("bank_code", bank_code.clone()))
                .set_filter(Predicate::eq("branch_code", branch_code.clone()))
                .into(),
        }
    }
}
