//! `#[derive(TextEnum)]`: map a unit-only Rust enum to a text column.

use crate::attrs::rename;
use heck::ToShoutySnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let type_name = name.to_string();

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "TextEnum can only be derived for enums",
            ));
        }
    };

    let mut as_str_arms = Vec::new();
    let mut parse_arms = Vec::new();

    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "TextEnum variants must be unit variants (no fields)",
            ));
        }

        let variant_ident = &variant.ident;
        let text =
            rename(variant)?.unwrap_or_else(|| variant_ident.to_string().to_shouty_snake_case());

        as_str_arms.push(quote! {
            #name::#variant_ident => #text,
        });
        parse_arms.push(quote! {
            #text => ::std::option::Option::Some(#name::#variant_ident),
        });
    }

    Ok(quote! {
        impl #name {
            /// The stored text form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    #(#as_str_arms)*
                }
            }

            /// Parse the stored text form.
            pub fn from_text(s: &str) -> ::std::option::Option<Self> {
                match s {
                    #(#parse_arms)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::tokio_postgres::types::ToSql for #name {
            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::refstore::__private::BytesMut,
            ) -> ::std::result::Result<
                ::tokio_postgres::types::IsNull,
                ::std::boxed::Box<dyn ::std::error::Error + ::std::marker::Sync + ::std::marker::Send>,
            > {
                <&str as ::tokio_postgres::types::ToSql>::to_sql(&self.as_str(), ty, out)
            }

            fn accepts(ty: &::tokio_postgres::types::Type) -> bool {
                <&str as ::tokio_postgres::types::ToSql>::accepts(ty)
            }

            ::tokio_postgres::types::to_sql_checked!();
        }

        impl<'__refstore_a> ::tokio_postgres::types::FromSql<'__refstore_a> for #name {
            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &'__refstore_a [u8],
            ) -> ::std::result::Result<
                Self,
                ::std::boxed::Box<dyn ::std::error::Error + ::std::marker::Sync + ::std::marker::Send>,
            > {
                let s = <&str as ::tokio_postgres::types::FromSql>::from_sql(ty, raw)?;
                #name::from_text(s).ok_or_else(|| {
                    ::std::format!("unknown {} value: {:?}", #type_name, s).into()
                })
            }

            fn accepts(ty: &::tokio_postgres::types::Type) -> bool {
                <&str as ::tokio_postgres::types::FromSql>::accepts(ty)
            }
        }
    })
}
