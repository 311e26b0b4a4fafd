//! Derive macro output, checked without a database.

#![allow(dead_code)]

use refstore::{FromRow, Table, TextEnum};

#[derive(Debug, FromRow, Table)]
#[store(table = "core.bank_branches")]
struct Branch {
    #[store(id)]
    id: i64,
    #[store(column = "swift_code")]
    swift: Option<String>,
    bank_code: String,
    branch_code: String,
}

#[derive(Debug, FromRow, Table)]
#[store(table = "core.recipient_bank_accounts")]
struct Link {
    #[store(id)]
    recipient_id: i64,
    #[store(id)]
    bank_account_id: i64,
    is_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TextEnum)]
enum Network {
    MainNet,
    #[store(rename = "TEST")]
    TestNet,
}

#[test]
fn table_metadata_follows_field_order() {
    assert_eq!(Branch::TABLE, "core.bank_branches");
    assert_eq!(
        Branch::COLUMNS,
        ["id", "swift_code", "bank_code", "branch_code"]
    );
    assert_eq!(Branch::KEY_COLUMNS, ["id"]);
    assert_eq!(
        Branch::value_columns(),
        ["swift_code", "bank_code", "branch_code"]
    );
}

#[test]
fn composite_keys() {
    assert_eq!(Link::KEY_COLUMNS, ["recipient_id", "bank_account_id"]);
    assert_eq!(Link::value_columns(), ["is_primary"]);
}

#[test]
fn text_enum_round_trip() {
    assert_eq!(Network::MainNet.as_str(), "MAIN_NET");
    assert_eq!(Network::TestNet.to_string(), "TEST");
    assert_eq!(Network::from_text("TEST"), Some(Network::TestNet));
    assert_eq!(Network::from_text("MAIN_NET"), Some(Network::MainNet));
    assert_eq!(Network::from_text("main_net"), None);
}

#[test]
fn text_enum_binds_as_text() {
    use tokio_postgres::types::{ToSql, Type};

    assert!(<Network as ToSql>::accepts(&Type::TEXT));
    assert!(<Network as ToSql>::accepts(&Type::VARCHAR));
    assert!(!<Network as ToSql>::accepts(&Type::INT4));

    let mut buf = bytes::BytesMut::new();
    Network::TestNet.to_sql(&Type::TEXT, &mut buf).unwrap();
    assert_eq!(&buf[..], b"TEST");
}

#[test]
fn select_list_comes_from_table_metadata() {
    let query = refstore::qb::select(Branch::TABLE)
        .select(Branch::COLUMNS)
        .generate_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT id, swift_code, bank_code, branch_code FROM core.bank_branches"
    );
}
