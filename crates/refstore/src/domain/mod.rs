//! Reference-data entities and their repository operations.
//!
//! Each entity derives [`FromRow`](crate::FromRow) and [`Table`](crate::Table)
//! and has a selector enum naming the ways a single record can be addressed.
//! Write operations follow one shape: validate the input, resolve referenced
//! entities concurrently, build the statement, then execute it in a retried
//! transaction and scan the returned row.

mod bank_account;
mod bank_branch;
mod blockchain;
mod country;
mod currency;
mod recipient;

pub use bank_account::{
    BankAccount, BankAccountRelations, BankAccountSelector, BankAccountUpdate, NewBankAccount,
    resolve_bank_account_relations,
};
pub use bank_branch::{BankBranch, BankBranchSelector};
pub use blockchain::{Blockchain, BlockchainSelector, BlockchainUpdate, NewBlockchain};
pub use country::{Country, CountrySelector};
pub use currency::{Currency, CurrencySelector};
pub use recipient::{NewRecipient, Recipient, RecipientBankAccount, RecipientSelector};

use crate::error::{StoreError, StoreResult};
use crate::store::EntityStatus;

/// Reject blank required text input.
fn non_blank(value: &str, what: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

/// Check a resolved relation: it must exist if it was requested and must
/// not be terminated.
fn live<T>(
    requested: bool,
    found: Option<T>,
    status: impl Fn(&T) -> EntityStatus,
    what: &str,
) -> StoreResult<Option<T>> {
    match found {
        None if requested => Err(StoreError::validation(format!("{what} does not exist"))),
        Some(value) if status(&value) == EntityStatus::Terminated => {
            Err(StoreError::validation(format!("{what} is terminated")))
        }
        other => Ok(other),
    }
}

/// Upper-case a code and strip embedded whitespace.
fn normalize_code(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code(" ch93 0076 2011 "), "CH9300762011");
        assert_eq!(normalize_code("eth"), "ETH");
    }

    #[test]
    fn blank_input_is_rejected() {
        let err = non_blank("  ", "name").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: name must not be empty");
        assert!(non_blank("x", "name").is_ok());
    }
}
