//! Derive macros for refstore
//!
//! Provides `#[derive(FromRow)]`, `#[derive(Table)]` and `#[derive(TextEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod from_row;
mod table;
mod text_enum;

/// Derive `FromRow` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use refstore::FromRow;
///
/// #[derive(FromRow)]
/// struct Currency {
///     id: i64,
///     code: String,
///     #[store(column = "display_name")]
///     name: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[store(column = "name")]` - Map field to a different column name
#[proc_macro_derive(FromRow, attributes(store))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Table` metadata for a struct.
///
/// # Example
///
/// ```ignore
/// use refstore::Table;
///
/// #[derive(Table)]
/// #[store(table = "core.currencies")]
/// struct Currency {
///     #[store(id)]
///     id: i64,
///     code: String,
/// }
/// ```
///
/// # Generated
///
/// - `TABLE` - Qualified table name
/// - `COLUMNS` - Every column, in field order
/// - `KEY_COLUMNS` - Columns marked `#[store(id)]`
///
/// # Attributes
///
/// - `#[store(table = "schema.name")]` - Table name (required)
/// - `#[store(id)]` - Mark field as (part of) the primary key
/// - `#[store(column = "name")]` - Map field to a different column name
#[proc_macro_derive(Table, attributes(store))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    table::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `ToSql`/`FromSql` for a unit-only enum stored in a text column.
///
/// Variants map to `SCREAMING_SNAKE_CASE` by default.
///
/// # Example
///
/// ```ignore
/// #[derive(TextEnum)]
/// enum EntityStatus {
///     Active,
///     #[store(rename = "DISABLED")]
///     Inactive,
///     Terminated,
/// }
/// ```
#[proc_macro_derive(TextEnum, attributes(store))]
pub fn derive_text_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    text_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
