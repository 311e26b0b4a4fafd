//! FromRow derive macro implementation

use crate::attrs::{column_name, named_fields};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = named_fields(&input, "FromRow")?;

    let field_extracts = fields
        .iter()
        .map(|field| {
            let field_name = &field.ident;
            let column_name = column_name(field)?;
            Ok(quote! {
                #field_name: row.try_get_column(#column_name)?
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::refstore::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::tokio_postgres::Row) -> ::refstore::StoreResult<Self> {
                use ::refstore::RowExt;
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
