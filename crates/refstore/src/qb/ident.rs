//! Trusted SQL identifiers.
//!
//! Identifiers (schema, table, column, alias) cannot be sent as bind
//! parameters, so they are the only caller-supplied text that ends up inside
//! the rendered SQL. [`Ident`] is the gate: every identifier the builders
//! accept is parsed here first.
//!
//! - Unquoted segments must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted segments (`"CamelCase"`) may hold anything except NUL; `""` escapes `"`
//! - Segments are joined with `.` (`core.bank_accounts`, `ba.id`)

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// A validated, ready-to-render SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    sql: String,
    last: String,
}

impl Ident {
    /// Parse an identifier, accepting dotted and quoted forms.
    pub fn parse(s: &str) -> StoreResult<Self> {
        if s.is_empty() {
            return Err(invalid(s, "identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(invalid(s, "identifier cannot contain NUL"));
        }

        let mut sql = String::with_capacity(s.len());
        let mut last: String;
        let mut rest = s;

        loop {
            let (segment, tail) = if let Some(quoted) = rest.strip_prefix('"') {
                let (name, consumed) = read_quoted(quoted).ok_or_else(|| invalid(s, "unclosed quoted identifier"))?;
                if name.is_empty() {
                    return Err(invalid(s, "empty quoted identifier"));
                }
                push_quoted(&mut sql, &name);
                (name, &quoted[consumed..])
            } else {
                let end = rest.find('.').unwrap_or(rest.len());
                let name = &rest[..end];
                check_unquoted(s, name)?;
                sql.push_str(name);
                (name.to_string(), &rest[end..])
            };
            last = segment;

            match tail.strip_prefix('.') {
                Some("") => return Err(invalid(s, "trailing '.'")),
                Some(next) => {
                    sql.push('.');
                    rest = next;
                }
                None if tail.is_empty() => break,
                None => return Err(invalid(s, "expected '.' between identifier segments")),
            }
        }

        Ok(Self { sql, last })
    }

    /// The identifier as it appears in SQL.
    pub fn as_sql(&self) -> &str {
        &self.sql
    }

    /// The final (unqualified) segment, e.g. `status` for `ba.status`.
    pub fn unqualified(&self) -> &str {
        &self.last
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

fn invalid(input: &str, reason: &str) -> StoreError {
    StoreError::builder(format!("invalid identifier '{input}': {reason}"))
}

fn check_unquoted(input: &str, name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid(input, "empty identifier segment")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => return Err(invalid(input, &format!("invalid start character '{c}'"))),
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(invalid(input, &format!("invalid character '{c}'")));
    }
    Ok(())
}

/// Read a quoted segment body (after the opening quote). Returns the
/// unescaped name and the number of bytes consumed including the closing quote.
fn read_quoted(s: &str) -> Option<(String, usize)> {
    let mut name = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            name.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
        } else {
            return Some((name, i + 1));
        }
    }
    None
}

fn push_quoted(out: &mut String, name: &str) {
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Conversion into a validated [`Ident`].
pub trait IntoIdent {
    fn into_ident(self) -> StoreResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> StoreResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> StoreResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> StoreResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for &&str {
    fn into_ident(self) -> StoreResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> StoreResult<Ident> {
        Ident::parse(&self)
    }
}
