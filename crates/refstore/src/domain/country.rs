use super::normalize_code;
use crate::qb::Predicate;
use crate::store::{Entity, EntityStatus, Selector};
use crate::{FromRow, Table};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Table, Serialize)]
#[store(table = "core.countries")]
pub struct Country {
    #[store(id)]
    pub id: Uuid,
    pub alpha2: String,
    pub alpha3: String,
    pub name: String,
    pub status: EntityStatus,
}

impl Entity for Country {
    const NAME: &'static str = "country";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountrySelector {
    Id(Uuid),
    /// ISO 3166-1 alpha-2 code, any case.
    Alpha2(String),
}

impl Selector for CountrySelector {
    type Entity = Country;

    fn predicate(&self) -> Predicate {
        match self {
            CountrySelector::Id(id) => Predicate::eq("id", *id),
            CountrySelector::Alpha2(code) => Predicate::eq("alpha2", normalize_code(code)),
        }
    }
}
