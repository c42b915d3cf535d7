//! Safe SQL identifier handling.
//!
//! Table and column names cannot be bound as parameters, so this module is the only
//! thing standing between a caller-supplied name and the SQL text.
//!
//! - Each dot-separated part must be non-empty and match `[A-Za-z0-9_]+`
//! - Every part is rendered double-quoted, with embedded `"` doubled
//!
//! # Example
//! ```ignore
//! use qset::Ident;
//!
//! let t = Ident::parse("public.users")?;
//! assert_eq!(t.to_sql(), r#""public"."users""#);
//! # Ok::<(), qset::QueryError>(())
//! ```

use crate::error::{QueryError, QueryResult};

fn is_safe_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// A validated SQL identifier (column, table, or schema-qualified name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse a possibly schema-qualified identifier (`schema.table`).
    ///
    /// Fails with [`QueryError::InvalidIdentifier`] on empty input, empty parts,
    /// or characters outside `[A-Za-z0-9_.]`.
    pub fn parse(s: &str) -> QueryResult<Self> {
        if s.is_empty() {
            return Err(QueryError::invalid_identifier("Identifier cannot be empty"));
        }

        let mut parts = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(QueryError::invalid_identifier(format!(
                    "Empty identifier component in {s:?}"
                )));
            }
            if let Some(c) = part.chars().find(|c| !is_safe_char(*c)) {
                return Err(QueryError::invalid_identifier(format!(
                    "Invalid character {c:?} in identifier {s:?}"
                )));
            }
            parts.push(part.to_string());
        }

        Ok(Self { parts })
    }

    /// Parse a single field (column) name.
    ///
    /// Fields never carry a schema prefix, so `.` is rejected along with every other
    /// character outside `[A-Za-z0-9_]`. Fails with [`QueryError::InvalidField`].
    pub fn field(s: &str) -> QueryResult<Self> {
        if s.is_empty() {
            return Err(QueryError::invalid_field("Field name cannot be empty"));
        }
        if let Some(c) = s.chars().find(|c| !is_safe_char(*c)) {
            return Err(QueryError::invalid_field(format!(
                "Invalid character {c:?} in field {s:?}; only [A-Za-z0-9_] is allowed"
            )));
        }
        Ok(Self {
            parts: vec![s.to_string()],
        })
    }

    /// The unquoted parts.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The last part (the bare column or table name).
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Render the identifier as quoted SQL.
    pub fn to_sql(&self) -> String {
        // quotes + dots
        let cap = self.parts.iter().map(|p| p.len() + 2).sum::<usize>() + self.parts.len();
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('"');
            for ch in part.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Validate and quote a (possibly schema-qualified) identifier in one step.
pub fn quote_identifier(s: &str) -> QueryResult<String> {
    Ident::parse(s).map(|i| i.to_sql())
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> QueryResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> QueryResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> QueryResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> QueryResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> QueryResult<Ident> {
        Ident::parse(&self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> QueryResult<Ident> {
        Ident::parse(self)
    }
}
