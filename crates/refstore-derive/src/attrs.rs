//! `#[store(...)]` attribute parsing shared by the derives.

use proc_macro2::Span;
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Error, Expr, ExprLit, Field, Fields, Lit, Meta, Result, Token};

/// Field-level `#[store(...)]` options.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub column: Option<String>,
    pub id: bool,
}

pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> Result<&'a Punctuated<Field, Token![,]>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

fn store_metas(attrs: &[syn::Attribute]) -> Result<Vec<Meta>> {
    let mut out = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("store") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        out.extend(nested);
    }
    Ok(out)
}

fn lit_str(meta: &syn::MetaNameValue) -> Result<syn::LitStr> {
    match &meta.value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.clone()),
        other => Err(Error::new_spanned(other, "expected a string literal")),
    }
}

pub(crate) fn field_attrs(field: &Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for meta in store_metas(&field.attrs)? {
        match &meta {
            Meta::Path(p) if p.is_ident("id") => attrs.id = true,
            Meta::NameValue(nv) if nv.path.is_ident("column") => {
                let lit = lit_str(nv)?;
                attrs.column = Some(parse_sql_ident(&lit.value(), lit.span(), "column")?);
            }
            other => return Err(Error::new_spanned(other, "unknown store attribute")),
        }
    }
    Ok(attrs)
}

/// Column name for a field: `#[store(column = "..")]` or the field name.
pub(crate) fn column_name(field: &Field) -> Result<String> {
    let attrs = field_attrs(field)?;
    match (attrs.column, &field.ident) {
        (Some(column), _) => Ok(column),
        (None, Some(ident)) => Ok(ident.to_string().trim_start_matches("r#").to_string()),
        (None, None) => Err(Error::new_spanned(field, "expected a named field")),
    }
}

/// `#[store(table = "..")]` on the struct.
pub(crate) fn table_name(input: &DeriveInput) -> Result<String> {
    for meta in store_metas(&input.attrs)? {
        if let Meta::NameValue(nv) = &meta {
            if nv.path.is_ident("table") {
                let lit = lit_str(nv)?;
                let value = lit.value();
                for segment in value.split('.') {
                    parse_sql_ident(segment, lit.span(), "table")?;
                }
                return Ok(value);
            }
        }
    }
    Err(Error::new_spanned(
        &input.ident,
        "Table requires #[store(table = \"...\")] attribute",
    ))
}

/// `#[store(rename = "..")]` on an enum variant.
pub(crate) fn rename(variant: &syn::Variant) -> Result<Option<String>> {
    for meta in store_metas(&variant.attrs)? {
        if let Meta::NameValue(nv) = &meta {
            if nv.path.is_ident("rename") {
                return Ok(Some(lit_str(nv)?.value()));
            }
        }
    }
    Ok(None)
}

fn is_valid_sql_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_sql_ident(s: &str, span: Span, what: &str) -> Result<String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::new(span, format!("{what} must not be empty")));
    }
    if !is_valid_sql_ident(s) {
        return Err(Error::new(
            span,
            format!("{what} must be a valid SQL identifier (expected [A-Za-z_][A-Za-z0-9_]*)"),
        ));
    }
    Ok(s.to_string())
}
