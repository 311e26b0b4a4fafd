use super::normalize_code;
use crate::qb::Predicate;
use crate::store::{Entity, EntityStatus, Selector};
use crate::{FromRow, Table};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.currencies")]
pub struct Currency {
    #[store(id)]
    pub id: Uuid,
    /// ISO 4217 code.
    pub code: String,
    pub name: String,
    pub minor_units: i16,
    pub status: EntityStatus,
}

impl Entity for Currency {
    const NAME: &'static str = "currency";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrencySelector {
    Id(Uuid),
    Code(String),
}

impl Selector for CurrencySelector {
    type Entity = Currency;

    fn predicate(&self) -> Predicate {
        match self {
            CurrencySelector::Id(id) => Predicate::eq("id", *id),
            CurrencySelector::Code(code) => Predicate::eq("code", normalize_code(code)),
        }
    }
}
