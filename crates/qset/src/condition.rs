//! Predicate fragments and the `field__operator` translator.
//!
//! A [`Condition`] is finished SQL boolean text plus the values it binds, in
//! placeholder order. Field names always pass through [`Ident::field`] and
//! every operand is bound, so a condition never carries caller text.

use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::ident::Ident;
use crate::lookup::{Lookup, split_key};
use crate::value::Value;

/// Statically false predicate used for empty `IN` lists.
pub const ALWAYS_FALSE: &str = "1 = 0";

/// A SQL predicate plus the parameters it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    sql: String,
    params: Vec<Value>,
}

impl Condition {
    /// Wrap pre-built SQL. The text is used verbatim, so it must be trusted
    /// and carry a placeholder for every value.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A predicate that never matches.
    pub fn always_false() -> Self {
        Self::raw(ALWAYS_FALSE, Vec::new())
    }

    /// Translate one `key = value` pair (`age__gte`, `name`, ...).
    pub fn from_key<D: Dialect>(dialect: &D, key: &str, value: Value) -> QueryResult<Self> {
        let (field, lookup) = split_key(key);
        Self::lookup(dialect, field, lookup, value)
    }

    /// Translate a `(field, operator, value)` triple into a predicate.
    pub fn lookup<D: Dialect>(
        dialect: &D,
        field: &str,
        lookup: Lookup,
        value: Value,
    ) -> QueryResult<Self> {
        let column = Ident::field(field)?.to_sql();
        let ph = dialect.placeholder();

        let cond = match lookup {
            Lookup::Exact => {
                if value.is_null() {
                    Self::raw(format!("{column} IS NULL"), Vec::new())
                } else if value.as_list().is_some() {
                    return Err(QueryError::invalid_lookup(
                        field,
                        lookup.as_str(),
                        "a list cannot be compared for equality; use __in",
                    ));
                } else {
                    Self::raw(format!("{column} = {ph}"), vec![value])
                }
            }
            Lookup::In => {
                let items = value.as_list().ok_or_else(|| {
                    QueryError::invalid_lookup(
                        field,
                        lookup.as_str(),
                        format!("expected a list, got {}", value.type_name()),
                    )
                })?;
                if items.is_empty() {
                    Self::always_false()
                } else {
                    let marks = vec![ph; items.len()].join(", ");
                    Self::raw(format!("{column} IN ({marks})"), items)
                }
            }
            Lookup::IsNull => {
                let op = if value.is_truthy() { "IS NULL" } else { "IS NOT NULL" };
                Self::raw(format!("{column} {op}"), Vec::new())
            }
            Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
                let op = lookup.comparison_operator().unwrap_or("=");
                Self::raw(format!("{column} {op} {ph}"), vec![value])
            }
            Lookup::StartsWith
            | Lookup::EndsWith
            | Lookup::Contains
            | Lookup::IContains
            | Lookup::IStartsWith
            | Lookup::IEndsWith => {
                // NULL never matches a pattern.
                if value.is_null() {
                    return Ok(Self::always_false());
                }
                let pattern = lookup.like_pattern(&value.to_text()).unwrap_or_default();
                let mut sql = String::new();
                if lookup.is_case_insensitive() {
                    dialect.write_ilike(&mut sql, &column);
                } else {
                    dialect.write_like(&mut sql, &column);
                }
                Self::raw(sql, vec![Value::Text(pattern)])
            }
        };
        Ok(cond)
    }

    /// Case-insensitive substring match against `%needle%`.
    pub fn search<D: Dialect>(dialect: &D, field: &str, needle: &str) -> QueryResult<Self> {
        Self::lookup(dialect, field, Lookup::IContains, Value::from(needle))
    }

    /// Wrap in `NOT (...)`.
    pub fn negate(self) -> Self {
        Self {
            sql: format!("NOT ({})", self.sql),
            params: self.params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Translate every pair, preserving pair order.
pub(crate) fn translate_all<D, I, K, V>(dialect: &D, predicates: I) -> QueryResult<Vec<Condition>>
where
    D: Dialect,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    predicates
        .into_iter()
        .map(|(k, v)| Condition::from_key(dialect, k.as_ref(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DialectKind, Postgres, Sqlite, TSql};

    fn parts<D: Dialect>(d: &D, key: &str, value: impl Into<Value>) -> (String, Vec<Value>) {
        Condition::from_key(d, key, value.into()).unwrap().into_parts()
    }

    #[test]
    fn exact_uses_dialect_placeholder() {
        assert_eq!(parts(&Sqlite, "id", 1), (r#""id" = ?"#.into(), vec![Value::Int(1)]));
        assert_eq!(parts(&Postgres, "id", 1), (r#""id" = %s"#.into(), vec![Value::Int(1)]));
        assert_eq!(parts(&TSql, "id__exact", 1).0, r#""id" = ?"#);
    }

    #[test]
    fn exact_none_is_is_null() {
        assert_eq!(parts(&Sqlite, "email", Value::Null), (r#""email" IS NULL"#.into(), vec![]));
    }

    #[test]
    fn exact_rejects_list() {
        let err = Condition::from_key(&Sqlite, "id", Value::from(vec![1, 2])).unwrap_err();
        assert!(matches!(err, QueryError::InvalidLookup { .. }));
    }

    #[test]
    fn in_binds_each_element() {
        let (sql, params) = parts(&Postgres, "id__in", vec![1, 2, 3]);
        assert_eq!(sql, r#""id" IN (%s, %s, %s)"#);
        assert_eq!(params, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn empty_in_is_statically_false() {
        for kind in DialectKind::ALL {
            let (sql, params) = parts(&kind, "id__in", Vec::<i64>::new());
            assert_eq!(sql, "1 = 0");
            assert!(params.is_empty());
        }
    }

    #[test]
    fn in_requires_a_list() {
        let err = Condition::from_key(&Sqlite, "id__in", Value::Int(3)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidLookup { lookup: "in", .. }));
    }

    #[test]
    fn in_accepts_json_array() {
        let (sql, params) = parts(&Sqlite, "id__in", serde_json::json!([4, 5]));
        assert_eq!(sql, r#""id" IN (?, ?)"#);
        assert_eq!(params, vec![Value::Int(4), Value::Int(5)]);
    }

    #[test]
    fn isnull_follows_truthiness() {
        assert_eq!(parts(&Sqlite, "x__isnull", true).0, r#""x" IS NULL"#);
        assert_eq!(parts(&Sqlite, "x__isnull", false).0, r#""x" IS NOT NULL"#);
    }

    #[test]
    fn comparisons() {
        assert_eq!(parts(&Sqlite, "age__gt", 1).0, r#""age" > ?"#);
        assert_eq!(parts(&Sqlite, "age__gte", 1).0, r#""age" >= ?"#);
        assert_eq!(parts(&Postgres, "age__lt", 1).0, r#""age" < %s"#);
        assert_eq!(parts(&TSql, "age__lte", 1).0, r#""age" <= ?"#);
    }

    #[test]
    fn contains_escapes_metacharacters() {
        let (sql, params) = parts(&Sqlite, "name__contains", "100%_done");
        assert_eq!(sql, r#""name" LIKE ? ESCAPE '\'"#);
        assert_eq!(params, vec![Value::from(r"%100\%\_done%")]);

        let (sql, params) = parts(&Postgres, "name__startswith", "a_b");
        assert_eq!(sql, r#""name" LIKE %s"#);
        assert_eq!(params, vec![Value::from(r"a\_b%")]);
    }

    #[test]
    fn case_insensitive_per_dialect() {
        assert_eq!(parts(&Postgres, "name__icontains", "jo").0, r#""name" ILIKE %s"#);
        assert_eq!(
            parts(&Sqlite, "name__istartswith", "jo").0,
            r#"UPPER("name") LIKE UPPER(?) ESCAPE '\'"#
        );
        let (sql, params) = parts(&TSql, "name__iendswith", "son");
        assert_eq!(sql, r#"UPPER("name") LIKE UPPER(?) ESCAPE '\'"#);
        assert_eq!(params, vec![Value::from("%son")]);
    }

    #[test]
    fn pattern_with_null_never_matches() {
        assert_eq!(parts(&Sqlite, "name__contains", Value::Null).0, "1 = 0");
    }

    #[test]
    fn unknown_suffix_is_exact() {
        assert_eq!(parts(&Sqlite, "name__regex", "x").0, r#""name" = ?"#);
    }

    #[test]
    fn invalid_field_is_rejected_before_sql() {
        for key in ["na me", "id;--", "t.id__gt", "", "\"id\""] {
            let err = Condition::from_key(&Sqlite, key, Value::Int(1)).unwrap_err();
            assert!(matches!(err, QueryError::InvalidField(_)), "{key}: {err}");
        }
    }

    #[test]
    fn negate_wraps() {
        let c = Condition::from_key(&Sqlite, "id", Value::Int(1)).unwrap().negate();
        assert_eq!(c.sql(), r#"NOT ("id" = ?)"#);
        assert_eq!(c.params(), [Value::Int(1)]);
    }

    #[test]
    fn translate_all_keeps_order() {
        let conds = translate_all(&Sqlite, [("id", Value::Int(1)), ("name", Value::from("John"))]).unwrap();
        assert_eq!(conds.len(), 2);
        assert_eq!(conds[1].params(), [Value::from("John")]);
    }
}
