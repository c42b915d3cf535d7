//! `tokio-postgres` adapter.

use super::Connection;
use crate::error::{QueryError, QueryResult};
use crate::row::Row;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use std::net::IpAddr;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// Rewrite `%s` placeholders to `$1, $2, ...` and `%%` to `%`.
///
/// Quoted literals and identifiers are copied unchanged.
pub(crate) fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut n = 0;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            out.push(c);
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '%' if chars.peek() == Some(&'s') => {
                chars.next();
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            '%' if chars.peek() == Some(&'%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push(c),
        }
    }
    out
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} to a column of type {ty}", value.type_name()).into()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                    i.to_string().to_sql(ty, out)
                }
                Type::JSON | Type::JSONB => serde_json::Value::from(*i).to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::JSON | Type::JSONB => self.to_json().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Text(s) => match *ty {
                Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => {
                    let ts = crate::memory::parse_iso8601(s)
                        .ok_or_else(|| format!("'{s}' is not an ISO 8601 timestamp"))?;
                    Value::Timestamp(ts).to_sql(ty, out)
                }
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Blob(b) => b.as_slice().to_sql(ty, out),
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => self.to_text().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => match Value::from_json(v.clone()) {
                    Value::Json(_) => Err(mismatch(self, ty)),
                    scalar => scalar.to_sql(ty, out),
                },
            },
            Value::List(_) => match *ty {
                Type::JSON | Type::JSONB => self.to_json().to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => self.to_json().to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// How a column of a given PostgreSQL type becomes a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    /// Decimal text, so no precision is lost.
    Numeric,
    Text,
    Bytes,
    Uuid,
    Time,
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Inet,
    Array,
    Enum,
    /// Wire bytes as a blob.
    Raw,
}

pub(crate) fn decoder_for(ty: &Type) -> Decoder {
    match *ty {
        Type::BOOL => Decoder::Bool,
        Type::INT2 => Decoder::Int2,
        Type::INT4 => Decoder::Int4,
        Type::INT8 => Decoder::Int8,
        Type::OID => Decoder::Oid,
        Type::FLOAT4 => Decoder::Float4,
        Type::FLOAT8 => Decoder::Float8,
        Type::NUMERIC => Decoder::Numeric,
        Type::BYTEA => Decoder::Bytes,
        Type::UUID => Decoder::Uuid,
        Type::TIME => Decoder::Time,
        Type::DATE => Decoder::Date,
        Type::TIMESTAMP => Decoder::Timestamp,
        Type::TIMESTAMPTZ => Decoder::TimestampTz,
        Type::JSON | Type::JSONB => Decoder::Json,
        Type::INET => Decoder::Inet,
        _ => match ty.kind() {
            Kind::Array(_) => Decoder::Array,
            Kind::Enum(_) => Decoder::Enum,
            Kind::Domain(inner) => decoder_for(inner),
            _ if <String as FromSql<'_>>::accepts(ty) => Decoder::Text,
            _ => Decoder::Raw,
        },
    }
}

fn decode(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    if let Kind::Domain(inner) = ty.kind() {
        return decode(inner, raw);
    }
    let value = match decoder_for(ty) {
        Decoder::Bool => bool::from_sql(ty, raw)?.into(),
        Decoder::Int2 => i16::from_sql(ty, raw)?.into(),
        Decoder::Int4 => i32::from_sql(ty, raw)?.into(),
        Decoder::Int8 => i64::from_sql(ty, raw)?.into(),
        Decoder::Oid => u32::from_sql(ty, raw)?.into(),
        Decoder::Float4 => f32::from_sql(ty, raw)?.into(),
        Decoder::Float8 => f64::from_sql(ty, raw)?.into(),
        Decoder::Numeric => Value::Text(Decimal::from_sql(ty, raw)?.to_string()),
        Decoder::Text => Value::Text(String::from_sql(ty, raw)?),
        Decoder::Bytes => Value::Blob(<Vec<u8>>::from_sql(ty, raw)?),
        Decoder::Uuid => Value::Text(Uuid::from_sql(ty, raw)?.to_string()),
        Decoder::Time => Value::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
        Decoder::Date => NaiveDate::from_sql(ty, raw)?.into(),
        Decoder::Timestamp => NaiveDateTime::from_sql(ty, raw)?.into(),
        Decoder::TimestampTz => DateTime::<Utc>::from_sql(ty, raw)?.into(),
        Decoder::Json => Value::Json(serde_json::Value::from_sql(ty, raw)?),
        Decoder::Inet => Value::Text(IpAddr::from_sql(ty, raw)?.to_string()),
        Decoder::Array => Value::List(
            <Vec<Cell>>::from_sql(ty, raw)?
                .into_iter()
                .map(|cell| cell.0)
                .collect(),
        ),
        Decoder::Enum => Value::Text(std::str::from_utf8(raw)?.to_owned()),
        Decoder::Raw => Value::Blob(raw.to_vec()),
    };
    Ok(value)
}

/// One decoded column. Accepts every type; NULL becomes [`Value::Null`].
struct Cell(Value);

impl<'a> FromSql<'a> for Cell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode(ty, raw).map(Cell)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Cell(Value::Null))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_column(row: &tokio_postgres::Row, idx: usize) -> Result<Value, tokio_postgres::Error> {
    row.try_get::<_, Cell>(idx).map(|cell| cell.0)
}

fn decode_row(row: &tokio_postgres::Row) -> QueryResult<Row> {
    let mut out = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx).map_err(|e| QueryError::decode(column.name(), e.to_string()))?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Runs on an autocommitting client; `commit` has nothing to flush.
impl Connection for tokio_postgres::Client {
    async fn execute_result(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        let sql = rewrite_placeholders(sql);
        let rows = tokio_postgres::Client::query(self, &sql, &param_refs(params)).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        let sql = rewrite_placeholders(sql);
        Ok(tokio_postgres::Client::execute(self, &sql, &param_refs(params)).await?)
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> QueryResult<u64> {
        let sql = rewrite_placeholders(sql);
        let stmt = tokio_postgres::Client::prepare(self, &sql).await?;
        let mut total = 0;
        for params in batches {
            total += tokio_postgres::Client::execute(self, &stmt, &param_refs(params)).await?;
        }
        Ok(total)
    }

    async fn commit(&self) -> QueryResult<()> {
        Ok(())
    }
}
