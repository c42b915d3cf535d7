//! In-memory query engine.
//!
//! [`MemoryQuery`] applies the same `field__operator` grammar as
//! [`Query`](crate::Query) to a collection of records, without SQL. Like the
//! SQL builder it is immutable: every chained call returns a new query that
//! shares the underlying items, and filtering, ordering and bounds are only
//! evaluated by the terminal operations.
//!
//! ```ignore
//! use qset::lookups;
//! use qset::memory::{FieldKind, FieldRegistry, MemoryQuery};
//!
//! let items = vec![
//!     serde_json::json!({"name": "a", "age": "31"}),
//!     serde_json::json!({"name": "b", "age": "9"}),
//! ];
//! let fields = FieldRegistry::new().field("age", FieldKind::Integer);
//! let adults = MemoryQuery::new(items)
//!     .with_fields(fields)
//!     .filter(lookups! { "age__gte" => 18 })?
//!     .list();
//! assert_eq!(adults.len(), 1);
//! ```

mod fields;

pub use fields::{FieldKind, FieldRegistry};
pub(crate) use fields::parse_iso8601;

use crate::error::{QueryError, QueryResult};
use crate::lookup::{Lookup, split_key};
use crate::row::Row;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

/// Anything with named fields.
pub trait Record {
    /// The raw value of `name`, or `None` if the record has no such field.
    fn field(&self, name: &str) -> Option<Value>;
}

impl Record for Row {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Record for HashMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Record for serde_json::Map<String, serde_json::Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Value::from_json)
    }
}

impl Record for serde_json::Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|obj| obj.field(name))
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }
}

impl<R: Record + ?Sized> Record for Arc<R> {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    field: String,
    lookup: Lookup,
    operand: Value,
    negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct OrderKey {
    field: String,
    descending: bool,
}

/// An immutable, lazily evaluated query over in-memory records.
#[derive(Debug)]
pub struct MemoryQuery<R> {
    items: Arc<Vec<R>>,
    fields: Arc<FieldRegistry>,
    predicates: Vec<Predicate>,
    ordering: Vec<OrderKey>,
    offset: usize,
    limit: Option<usize>,
}

impl<R> Clone for MemoryQuery<R> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            fields: Arc::clone(&self.fields),
            predicates: self.predicates.clone(),
            ordering: self.ordering.clone(),
            offset: self.offset,
            limit: self.limit,
        }
    }
}

impl<R: Record> MemoryQuery<R> {
    /// Query over `items` with no field coercions.
    pub fn new(items: impl IntoIterator<Item = R>) -> Self {
        Self {
            items: Arc::new(items.into_iter().collect()),
            fields: Arc::new(FieldRegistry::default()),
            predicates: Vec::new(),
            ordering: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Use `fields` to coerce stored values and operands.
    pub fn with_fields(&self, fields: FieldRegistry) -> Self {
        let mut next = self.clone();
        next.fields = Arc::new(fields);
        next
    }

    fn push_predicates<I, K, V>(&self, predicates: I, negated: bool) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut next = self.clone();
        for (key, value) in predicates {
            let (field, lookup) = split_key(key.as_ref());
            let value = value.into();
            let operand = match lookup {
                Lookup::In => Value::List(value.as_list().ok_or_else(|| {
                    QueryError::invalid_lookup(
                        field,
                        lookup.as_str(),
                        format!("expected a list, got {}", value.type_name()),
                    )
                })?),
                Lookup::Exact if value.as_list().is_some() => {
                    return Err(QueryError::invalid_lookup(
                        field,
                        lookup.as_str(),
                        "a list cannot be compared for equality; use __in",
                    ));
                }
                _ => value,
            };
            next.predicates.push(Predicate {
                field: field.to_string(),
                lookup,
                operand,
                negated,
            });
        }
        Ok(next)
    }

    /// Keep records matching every predicate.
    pub fn filter<I, K, V>(&self, predicates: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.push_predicates(predicates, false)
    }

    /// Drop records matching any predicate.
    pub fn exclude<I, K, V>(&self, predicates: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.push_predicates(predicates, true)
    }

    /// Case-insensitive substring match; no-op when `field` or `needle` is empty.
    pub fn search(&self, field: &str, needle: &str) -> QueryResult<Self> {
        if field.is_empty() || needle.is_empty() {
            return Ok(self.clone());
        }
        self.filter([(format!("{field}__icontains"), needle)])
    }

    /// Sort by the given fields (`-field` for descending).
    ///
    /// The sort is stable. NULLs sort first ascending and last descending.
    pub fn order<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for spec in fields {
            let spec = spec.as_ref();
            let (field, descending) = match spec.strip_prefix('-') {
                Some(field) => (field, true),
                None => (spec, false),
            };
            if field.is_empty() {
                continue;
            }
            next.ordering.push(OrderKey {
                field: field.to_string(),
                descending,
            });
        }
        next
    }

    pub fn limit(&self, n: usize) -> Self {
        let mut next = self.clone();
        next.limit = Some(n);
        next
    }

    pub fn offset(&self, n: usize) -> Self {
        let mut next = self.clone();
        next.offset = n;
        next
    }

    /// Rows `range.start..range.end` of the current result.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let len = range.end.saturating_sub(range.start);
        let mut next = self.clone();
        next.offset = self.offset.saturating_add(range.start);
        next.limit = Some(match self.limit {
            Some(limit) => len.min(limit.saturating_sub(range.start)),
            None => len,
        });
        next
    }

    /// 1-indexed page of `page_size` records.
    pub fn paginate(&self, page: usize, page_size: usize) -> Self {
        self.offset(page.saturating_sub(1).saturating_mul(page_size))
            .limit(page_size)
    }

    fn coerced(&self, record: &R, field: &str) -> Value {
        let raw = record.field(field).unwrap_or(Value::Null);
        self.fields.coerce(field, raw)
    }

    fn matches(&self, record: &R, pred: &Predicate) -> bool {
        let item = self.coerced(record, &pred.field);
        let operand = match &pred.operand {
            Value::List(values) if pred.lookup == Lookup::In => Value::List(
                values
                    .iter()
                    .map(|v| self.fields.coerce(&pred.field, v.clone()))
                    .collect(),
            ),
            other => self.fields.coerce(&pred.field, other.clone()),
        };
        let hit = evaluate(&item, pred.lookup, &operand, &pred.operand);
        hit != pred.negated
    }

    /// Matching records in final order, before bounds.
    fn matching(&self) -> Vec<&R> {
        let mut hits: Vec<&R> = self
            .items
            .iter()
            .filter(|r| self.predicates.iter().all(|p| self.matches(r, p)))
            .collect();

        if !self.ordering.is_empty() {
            let mut keyed: Vec<(Vec<Value>, &R)> = hits
                .into_iter()
                .map(|r| {
                    let keys = self.ordering.iter().map(|k| self.coerced(r, &k.field)).collect();
                    (keys, r)
                })
                .collect();
            keyed.sort_by(|(a, _), (b, _)| {
                for (key, (x, y)) in self.ordering.iter().zip(a.iter().zip(b)) {
                    let ord = compare_nulls_first(x, y);
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            hits = keyed.into_iter().map(|(_, r)| r).collect();
        }
        hits
    }

    /// Borrow the matching records within bounds.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        let take = self.limit.unwrap_or(usize::MAX);
        self.matching().into_iter().skip(self.offset).take(take)
    }

    /// Number of matching records, ignoring limit and offset.
    pub fn count(&self) -> usize {
        self.items
            .iter()
            .filter(|r| self.predicates.iter().all(|p| self.matches(r, p)))
            .count()
    }

    /// Same as [`MemoryQuery::count`].
    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn exists(&self) -> bool {
        self.iter().next().is_some()
    }
}

impl<R: Record + Clone> MemoryQuery<R> {
    /// The matching records within bounds.
    pub fn list(&self) -> Vec<R> {
        self.iter().cloned().collect()
    }

    pub fn first(&self) -> Option<R> {
        self.iter().next().cloned()
    }

    /// Exactly one record matching `predicates`.
    pub fn get<I, K, V>(&self, predicates: I) -> QueryResult<R>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let narrowed = self.filter(predicates)?;
        let mut hits = narrowed.iter();
        match (hits.next(), hits.next()) {
            (Some(record), None) => Ok(record.clone()),
            (None, _) => Err(QueryError::not_found("no record matches the given predicates")),
            (Some(_), Some(_)) => Err(QueryError::multiple_results(
                "more than one record matches the given predicates",
            )),
        }
    }
}

impl<R: Record + Clone> IntoIterator for MemoryQuery<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.list().into_iter()
    }
}

fn compare_nulls_first(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        // Incomparable keys keep their relative order.
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn text_match(item: &Value, operand: &Value, lookup: Lookup) -> bool {
    if item.is_null() || operand.is_null() {
        return false;
    }
    let (mut hay, mut needle) = (item.to_text(), operand.to_text());
    if lookup.is_case_insensitive() {
        hay = hay.to_lowercase();
        needle = needle.to_lowercase();
    }
    match lookup {
        Lookup::StartsWith | Lookup::IStartsWith => hay.starts_with(&needle),
        Lookup::EndsWith | Lookup::IEndsWith => hay.ends_with(&needle),
        _ => hay.contains(&needle),
    }
}

/// Evaluate one lookup against coerced operands.
///
/// `raw_operand` is the uncoerced filter value, used by `isnull`.
fn evaluate(item: &Value, lookup: Lookup, operand: &Value, raw_operand: &Value) -> bool {
    match lookup {
        Lookup::Exact => {
            if operand.is_null() {
                item.is_null()
            } else {
                item.loosely_equals(operand)
            }
        }
        Lookup::IsNull => item.is_null() == raw_operand.is_truthy(),
        Lookup::In => match operand {
            Value::List(values) => values.iter().any(|v| item.loosely_equals(v)),
            _ => false,
        },
        Lookup::StartsWith
        | Lookup::EndsWith
        | Lookup::Contains
        | Lookup::IContains
        | Lookup::IStartsWith
        | Lookup::IEndsWith => text_match(item, operand, lookup),
        Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte => {
            if item.is_null() || operand.is_null() {
                return false;
            }
            match item.compare(operand) {
                Ok(ord) => match lookup {
                    Lookup::Gt => ord == Ordering::Greater,
                    Lookup::Gte => ord != Ordering::Less,
                    Lookup::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                },
                Err(err) => {
                    tracing::trace!(target: "qset.query", %err, "incomparable values never match");
                    false
                }
            }
        }
    }
}
