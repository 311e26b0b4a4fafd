//! Cross-cutting tests for the qb module.

use crate::qb::{
    BuiltQuery, FilterBracket, Fragment, Join, Order, Predicate, StatementKind,
    create_query_builder, delete, insert, select, update, upsert,
};

/// Placeholder numbers in textual order.
fn placeholders(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                out.push(sql[start..end].parse().unwrap());
            }
            i = end.max(start);
        } else {
            i += 1;
        }
    }
    out
}

fn assert_aligned(q: &BuiltQuery) {
    let found = placeholders(&q.sql);
    let expected: Vec<usize> = (1..=q.params.len()).collect();
    assert_eq!(found, expected, "placeholders out of order in: {}", q.sql);
}

fn values(q: &BuiltQuery) -> Vec<String> {
    q.params.iter().map(|p| format!("{p:?}")).collect()
}

#[test]
fn blockchain_soft_delete_update() {
    let q = update("core.blockchains")
        .set_update("status", "TERMINATED")
        .filter(Predicate::eq("id", "abc-123"))
        .generate_sql()
        .unwrap();

    assert_eq!(q.sql, "UPDATE core.blockchains SET status = $1 WHERE id = $2");
    assert_eq!(values(&q), ["\"TERMINATED\"", "\"abc-123\""]);
    assert_eq!(q.selector, "id = \"abc-123\"");
    assert_eq!(q.kind, StatementKind::Update);
}

#[test]
fn select_basic() {
    let q = select("core.countries").generate_sql().unwrap();
    assert_eq!(q.sql, "SELECT * FROM core.countries");
    assert!(q.params.is_empty());
    assert_eq!(q.selector, "");
}

#[test]
fn select_with_filters_order_and_paging() {
    let q = select("core.currencies")
        .select(["id", "code", "name"])
        .filter(Predicate::ne("status", "TERMINATED"))
        .filter_bracket(
            FilterBracket::or()
                .set_filter(Predicate::eq("code", "CHF"))
                .set_filter(Predicate::eq("code", "EUR")),
        )
        .order_by("code", Order::Asc)
        .order_by("name", Order::Desc)
        .limit(50)
        .offset(100)
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "SELECT id, code, name FROM core.currencies \
         WHERE (status <> $1) AND ((code = $2) OR (code = $3)) \
         ORDER BY code ASC, name DESC LIMIT 50 OFFSET 100"
    );
    assert_aligned(&q);
    assert_eq!(values(&q), ["\"TERMINATED\"", "\"CHF\"", "\"EUR\""]);
}

#[test]
fn join_values_are_numbered_before_where() {
    let q = select("core.bank_accounts")
        .select_expr("ba.*")
        .join(
            Join::inner("core.bank_branches")
                .alias("bb")
                .on_columns("ba.bank_branch_id", "bb.id")
                .on(Predicate::ne("bb.status", "TERMINATED")),
        )
        .join(
            Join::left("core.currencies")
                .alias("cur")
                .on_columns("ba.currency_id", "cur.id"),
        )
        .filter(Predicate::eq("bb.swift", "UBSWCHZH80A"))
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "SELECT ba.* FROM core.bank_accounts \
         INNER JOIN core.bank_branches AS bb ON (ba.bank_branch_id = bb.id) AND (bb.status <> $1) \
         LEFT JOIN core.currencies AS cur ON ba.currency_id = cur.id \
         WHERE bb.swift = $2"
    );
    assert_aligned(&q);
    assert_eq!(values(&q), ["\"TERMINATED\"", "\"UBSWCHZH80A\""]);
}

#[test]
fn join_without_condition_fails() {
    let err = select("core.bank_accounts")
        .join(Join::inner("core.currencies"))
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn fragment_predicates_share_the_counter() {
    let q = select("core.bank_branches")
        .filter(Predicate::eq("status", "ACTIVE"))
        .filter(Predicate::fragment(
            Fragment::new()
                .sql("lower(")
                .ident("name")
                .sql(") = lower(")
                .bind("Zurich Main")
                .sql(")"),
        ))
        .filter(Predicate::in_list("country_id", [1_i64, 2, 3]))
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "SELECT * FROM core.bank_branches WHERE (status = $1) AND \
         (lower(name) = lower($2)) AND (country_id IN ($3, $4, $5))"
    );
    assert_aligned(&q);
}

#[test]
fn insert_single_row() {
    let q = insert("core.countries")
        .set_insert_fields(["id", "alpha2", "name"])
        .set_insert_values(crate::row![7_i64, "CH", "Switzerland"])
        .unwrap()
        .set_return_fields(["id", "alpha2", "name"])
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "INSERT INTO core.countries (id, alpha2, name) VALUES ($1, $2, $3) \
         RETURNING id, alpha2, name"
    );
    assert_aligned(&q);
}

#[test]
fn multi_row_insert_binds_every_value() {
    let q = insert("core.currencies")
        .set_insert_fields(["code", "name"])
        .set_insert_values(crate::row!["CHF", "Swiss franc"])
        .unwrap()
        .set_insert_values(crate::row!["EUR", "Euro"])
        .unwrap()
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "INSERT INTO core.currencies (code, name) VALUES ($1, $2), ($3, $4)"
    );
    assert_eq!(q.params.len(), 2 * 2);
    assert_eq!(
        values(&q),
        ["\"CHF\"", "\"Swiss franc\"", "\"EUR\"", "\"Euro\""]
    );
}

#[test]
fn insert_arity_mismatch_fails() {
    // One field.
    let err = insert("core.countries")
        .set_insert_fields(["alpha2"])
        .set_insert_values(crate::row!["CH", "Switzerland"])
        .unwrap_err();
    assert!(err.is_builder());

    let err = insert("core.countries")
        .set_insert_fields(["alpha2"])
        .set_insert_values(Vec::new())
        .unwrap_err();
    assert!(err.is_builder());

    // N fields.
    let err = insert("core.countries")
        .set_insert_fields(["id", "alpha2", "name"])
        .set_insert_values(crate::row![1_i64, "CH"])
        .unwrap_err();
    assert!(err.is_builder());
    assert!(err.to_string().contains("arity"));

    // A good row followed by a bad one still fails on the bad one.
    let qb = insert("core.countries")
        .set_insert_fields(["alpha2", "name"])
        .set_insert_values(crate::row!["CH", "Switzerland"])
        .unwrap();
    assert!(qb.set_insert_values(crate::row!["DE"]).is_err());
}

#[test]
fn changing_insert_fields_after_rows_fails() {
    let err = insert("core.countries")
        .set_insert_fields(["alpha2", "name"])
        .set_insert_values(crate::row!["CH", "Switzerland"])
        .unwrap()
        .set_insert_fields(["alpha2"])
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder(), "{err}");
    assert!(err.to_string().contains("arity"), "{err}");

    // Same count, different names: rows still line up.
    let query = insert("core.countries")
        .set_insert_fields(["alpha2", "name"])
        .set_insert_values(crate::row!["CH", "Switzerland"])
        .unwrap()
        .set_insert_fields(["alpha3", "name"])
        .generate_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO core.countries (alpha3, name) VALUES ($1, $2)"
    );
    assert_aligned(&query);
}

#[test]
fn insert_without_rows_fails() {
    let err = insert("core.countries")
        .set_insert_fields(["alpha2"])
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn update_without_assignments_fails() {
    let qb = update("core.blockchains").filter(Predicate::eq("id", "abc-123"));
    assert!(!qb.is_updatable());
    let err = qb.generate_sql().unwrap_err();
    assert!(err.is_builder());
    assert!(err.to_string().contains("no assignments"));
}

#[test]
fn update_and_delete_need_a_selector() {
    let err = update("core.blockchains")
        .set_update("status", "TERMINATED")
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());

    let err = delete("core.blockchains").generate_sql().unwrap_err();
    assert!(err.is_builder());

    // An empty bracket is not a selector either.
    let err = delete("core.blockchains")
        .filter_bracket(FilterBracket::or())
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());

    let q = delete("core.blockchains").allow_all_rows().generate_sql().unwrap();
    assert_eq!(q.sql, "DELETE FROM core.blockchains");
}

#[test]
fn update_with_expression_and_returning() {
    let q = update("core.bank_accounts")
        .set_update("iban", "CH9300762011623852957")
        .set_update_opt("currency_id", None::<i64>)
        .set_update_expr("updated_at", "now()")
        .set_update_opt("country_id", Some(41_i64))
        .filter(Predicate::eq("id", 10_i64))
        .set_return_fields(["id", "iban"])
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "UPDATE core.bank_accounts SET iban = $1, updated_at = now(), country_id = $2 \
         WHERE id = $3 RETURNING id, iban"
    );
    assert_aligned(&q);
}

#[test]
fn delete_with_returning() {
    let q = delete("core.recipient_bank_accounts")
        .filter(Predicate::eq("recipient_id", 5_i64))
        .set_return_fields(["bank_account_id"])
        .generate_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        "DELETE FROM core.recipient_bank_accounts WHERE recipient_id = $1 RETURNING bank_account_id"
    );
}

#[test]
fn upsert_updates_non_key_fields() {
    let q = upsert("core.recipient_bank_accounts")
        .set_insert_fields(["recipient_id", "bank_account_id", "is_primary"])
        .conflict_on(["recipient_id", "bank_account_id"])
        .set_insert_values(crate::row![1_i64, 10_i64, true])
        .unwrap()
        .set_insert_values(crate::row![1_i64, 11_i64, false])
        .unwrap()
        .set_return_fields(["recipient_id", "bank_account_id", "is_primary"])
        .generate_sql()
        .unwrap();

    assert_eq!(
        q.sql,
        "INSERT INTO core.recipient_bank_accounts (recipient_id, bank_account_id, is_primary) \
         VALUES ($1, $2, $3), ($4, $5, $6) \
         ON CONFLICT (recipient_id, bank_account_id) DO UPDATE SET is_primary = EXCLUDED.is_primary \
         RETURNING recipient_id, bank_account_id, is_primary"
    );
    assert_aligned(&q);
}

#[test]
fn upsert_of_key_only_rows_assigns_keys() {
    let q = upsert("core.recipient_bank_accounts")
        .set_insert_fields(["recipient_id", "bank_account_id"])
        .conflict_on(["recipient_id", "bank_account_id"])
        .set_insert_values(crate::row![1_i64, 10_i64])
        .unwrap()
        .generate_sql()
        .unwrap();

    assert!(q.sql.ends_with(
        "ON CONFLICT (recipient_id, bank_account_id) DO UPDATE SET \
         recipient_id = EXCLUDED.recipient_id, bank_account_id = EXCLUDED.bank_account_id"
    ));
}

#[test]
fn upsert_without_conflict_columns_fails() {
    let err = upsert("core.currencies")
        .set_insert_fields(["code"])
        .set_insert_values(crate::row!["CHF"])
        .unwrap()
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn wrong_kind_operations_fail() {
    let err = select("core.countries")
        .set_update("name", "x")
        .generate_sql()
        .unwrap_err();
    assert!(err.to_string().contains("set_update"));

    let err = update("core.countries")
        .set_update("name", "x")
        .filter(Predicate::eq("id", 1_i64))
        .limit(1)
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());

    assert!(
        select("core.countries")
            .set_insert_values(crate::row!["x"])
            .is_err()
    );

    let err = insert("core.countries")
        .conflict_on(["id"])
        .generate_sql()
        .unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn invalid_identifiers_fail_before_rendering() {
    for qb in [
        select("core.countries; DROP TABLE x"),
        select("core.countries").select(["name, secret"]),
        select("core.countries").order_by("name DESC", Order::Asc),
        select("core.countries").filter(Predicate::eq("1=1 --", 1_i32)),
        update("core.countries")
            .set_update("name = 'x', status", "y")
            .allow_all_rows(),
    ] {
        let err = qb.generate_sql().unwrap_err();
        assert!(err.is_builder(), "{err}");
    }
}

#[test]
fn create_query_builder_matches_shortcuts() {
    let a = create_query_builder(StatementKind::Delete, "core.recipients")
        .filter(Predicate::eq("id", 1_i64))
        .generate_sql()
        .unwrap();
    let b = delete("core.recipients")
        .filter(Predicate::eq("id", 1_i64))
        .generate_sql()
        .unwrap();
    assert_eq!(a.sql, b.sql);
}

#[test]
fn placeholder_alignment_across_many_filters() {
    let mut bracket = FilterBracket::or();
    for code in ["CHF", "EUR", "USD", "GBP"] {
        bracket.push(
            FilterBracket::and()
                .set_filter(Predicate::eq("code", code))
                .set_filter(Predicate::is_not_null("name")),
        );
    }
    let q = select("core.currencies")
        .filter(Predicate::gte("id", 1_i64))
        .filter_bracket(bracket)
        .filter(Predicate::lt("id", 1000_i64))
        .generate_sql()
        .unwrap();

    assert_aligned(&q);
    assert_eq!(q.params.len(), 6);
    assert_eq!(
        values(&q),
        ["1", "\"CHF\"", "\"EUR\"", "\"USD\"", "\"GBP\"", "1000"]
    );
    assert_eq!(q.sql.matches('(').count(), q.sql.matches(')').count());
}
