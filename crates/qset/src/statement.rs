//! Parameterized SQL text.
//!
//! [`Statement`] keeps SQL text and its bound values side by side so that
//! every placeholder is appended together with the value it stands for.
//!
//! ```ignore
//! use qset::{Statement, Value};
//!
//! let mut stmt = Statement::new("?");
//! stmt.push("SELECT * FROM \"users\" WHERE \"id\" = ").push_bind(7);
//! assert_eq!(stmt.sql(), "SELECT * FROM \"users\" WHERE \"id\" = ?");
//! assert_eq!(stmt.params(), [Value::Int(7)]);
//! ```

use crate::value::Value;
use std::fmt;

/// SQL text plus the values for its placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
    placeholder: &'static str,
}

impl Statement {
    /// Create an empty statement using the given placeholder token.
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            placeholder,
        }
    }

    /// Create a statement from finished text and its parameters.
    pub fn from_parts(placeholder: &'static str, sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            placeholder,
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append one placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.sql.push_str(self.placeholder);
        self.params.push(value.into());
        self
    }

    /// Append `?, ?, ?` for each value.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Append pre-built SQL text together with the values it already binds.
    pub fn push_fragment(&mut self, sql: &str, params: &[Value]) -> &mut Self {
        self.sql.push_str(sql);
        self.params.extend_from_slice(params);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Count placeholder tokens in `sql`, skipping quoted literals and identifiers.
///
/// `%%` is a literal percent sign, not a `%s` placeholder.
pub(crate) fn count_placeholders(sql: &str, placeholder: &str) -> usize {
    let bytes = sql.as_bytes();
    let token = placeholder.as_bytes();
    let mut count = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'%' && bytes.get(i + 1) == Some(&b'%') => {
                i += 2;
            }
            None if bytes[i..].starts_with(token) => {
                count += 1;
                i += token.len();
            }
            None => i += 1,
        }
    }
    count
}
