//! SQL identifier handling.
//!
//! Table and column names are never bound as parameters. [`Ident`] validates
//! them and always renders every part double-quoted, so names keep their exact
//! spelling and reserved words such as `user` or `order` need no special care.
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts (`"Weird Name"`) allow anything except NUL; `""` escapes `"`
//!
//! ```ignore
//! use pgcompose::Ident;
//!
//! assert_eq!(Ident::parse("shop.user")?.to_sql(), r#""shop"."user""#);
//! # Ok::<(), pgcompose::DbError>(())
//! ```

use crate::error::{DbError, DbResult};

/// A validated, possibly schema-qualified SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse a dotted identifier such as `shop.user` or `public."Order Items"`.
    pub fn parse(input: &str) -> DbResult<Self> {
        if input.is_empty() {
            return Err(DbError::validation("Identifier cannot be empty"));
        }
        if input.contains('\0') {
            return Err(DbError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut rest = input;
        loop {
            let (part, tail) = if let Some(quoted) = rest.strip_prefix('"') {
                split_quoted(quoted)?
            } else {
                split_unquoted(rest)?
            };
            parts.push(part);

            match tail.strip_prefix('.') {
                Some("") => return Err(DbError::validation("Trailing '.' in identifier")),
                Some(next) => rest = next,
                None if tail.is_empty() => break,
                None => {
                    return Err(DbError::validation(format!(
                        "Unexpected characters after identifier part: '{tail}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Parse an identifier that must consist of exactly one part (a column name).
    pub fn single(input: &str) -> DbResult<Self> {
        let ident = Self::parse(input)?;
        if ident.parts.len() != 1 {
            return Err(DbError::validation(format!(
                "Expected a plain column name, got '{input}'"
            )));
        }
        Ok(ident)
    }

    /// The unqualified name (last part).
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The schema qualifier, if any.
    pub fn schema(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [.., schema, _] => Some(schema.as_str()),
            _ => None,
        }
    }

    /// Render the identifier with every part quoted.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            push_quoted(out, part);
        }
    }
}

fn split_quoted(input: &str) -> DbResult<(String, &str)> {
    let mut name = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            name.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
            continue;
        }
        if name.is_empty() {
            return Err(DbError::validation("Empty quoted identifier"));
        }
        return Ok((name, &input[i + 1..]));
    }
    Err(DbError::validation("Unclosed quoted identifier"))
}

fn split_unquoted(input: &str) -> DbResult<(String, &str)> {
    let end = input.find('.').unwrap_or(input.len());
    let (name, tail) = input.split_at(end);

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(DbError::validation("Empty identifier segment")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(DbError::validation(format!(
                "Invalid identifier start character: '{c}'"
            )));
        }
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(DbError::validation(format!(
            "Invalid character in identifier: '{c}'"
        )));
    }
    Ok((name.to_string(), tail))
}

fn push_quoted(out: &mut String, name: &str) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Quote a single, already-trusted name (generated aliases).
pub(crate) fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_quoted(&mut out, name);
    out
}

/// Render a string as a SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
