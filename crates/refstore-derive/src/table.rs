//! Table derive macro implementation

use crate::attrs::{column_name, field_attrs, named_fields, table_name};
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{DeriveInput, Error, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = table_name(&input)?;
    let fields = named_fields(&input, "Table")?;

    let mut columns = Vec::new();
    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    for field in fields {
        let column = column_name(field)?;
        if !seen.insert(column.clone()) {
            return Err(Error::new_spanned(
                field,
                format!("duplicate column '{column}'"),
            ));
        }
        if field_attrs(field)?.id {
            keys.push(column.clone());
        }
        columns.push(column);
    }
    if keys.is_empty() {
        return Err(Error::new_spanned(
            name,
            "Table requires at least one #[store(id)] field",
        ));
    }

    Ok(quote! {
        impl #impl_generics ::refstore::Table for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const COLUMNS: &'static [&'static str] = &[#(#columns),*];
            const KEY_COLUMNS: &'static [&'static str] = &[#(#keys),*];
        }
    })
}
