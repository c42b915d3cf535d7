//! The structured clause model behind [`Query`](crate::Query).
//!
//! A base statement is split once, at construction, into its head
//! (`SELECT .. FROM ..`) and the WHERE / GROUP BY / ORDER BY text it already
//! carries. Chained calls only append structured pieces; SQL is assembled from
//! those pieces on demand and never by editing previously generated text.

use crate::condition::Condition;
use crate::dialect::{Bounds, Dialect};
use crate::error::{QueryError, QueryResult};
use crate::ident::Ident;
use crate::statement::{Statement, count_placeholders};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    From,
    Where,
    GroupBy,
    OrderBy,
    Limit,
    Offset,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    keyword: Keyword,
    start: usize,
    end: usize,
}

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80
}

fn word_at(bytes: &[u8], i: usize, word: &str) -> Option<usize> {
    let end = i + word.len();
    if end > bytes.len() || !bytes[i..end].eq_ignore_ascii_case(word.as_bytes()) {
        return None;
    }
    if bytes.get(end).is_some_and(|b| is_word_byte(*b)) {
        return None;
    }
    Some(end)
}

fn phrase_at(bytes: &[u8], i: usize, first: &str, second: &str) -> Option<usize> {
    let mut j = word_at(bytes, i, first)?;
    let gap = j;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    if j == gap {
        return None;
    }
    word_at(bytes, j, second)
}

/// Find clause keywords outside quotes, comments and parentheses.
fn scan_keywords(sql: &str) -> Vec<Mark> {
    let bytes = sql.as_bytes();
    let mut marks = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            _ if depth == 0 && (i == 0 || !is_word_byte(bytes[i - 1])) => {
                let found = word_at(bytes, i, "FROM")
                    .map(|end| (Keyword::From, end))
                    .or_else(|| word_at(bytes, i, "WHERE").map(|end| (Keyword::Where, end)))
                    .or_else(|| phrase_at(bytes, i, "GROUP", "BY").map(|end| (Keyword::GroupBy, end)))
                    .or_else(|| phrase_at(bytes, i, "ORDER", "BY").map(|end| (Keyword::OrderBy, end)))
                    .or_else(|| word_at(bytes, i, "LIMIT").map(|end| (Keyword::Limit, end)))
                    .or_else(|| word_at(bytes, i, "OFFSET").map(|end| (Keyword::Offset, end)));
                if let Some((keyword, end)) = found {
                    marks.push(Mark {
                        keyword,
                        start: i,
                        end,
                    });
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    marks
}

/// Resolve the text after `FROM` to a single, quoted table reference.
fn parse_target(text: &str) -> QueryResult<String> {
    let text = text.trim();
    if let Ok(ident) = Ident::parse(text) {
        return Ok(ident.to_sql());
    }
    let quoted = text.split('.').all(|part| {
        part.len() >= 2
            && part.starts_with('"')
            && part.ends_with('"')
            && !part[1..part.len() - 1].contains('"')
            && Ident::field(&part[1..part.len() - 1]).is_ok()
    });
    if quoted {
        Ok(text.to_string())
    } else {
        Err(QueryError::malformed(format!(
            "FROM target {text:?} is not a single table"
        )))
    }
}

/// Read a base-level `LIMIT` or `OFFSET` clause into `bounds`.
///
/// Accepts an integer literal or a single placeholder bound to an integer,
/// plus the `OFFSET n ROWS [FETCH NEXT m ROWS ONLY]` form.
fn lift_bound(keyword: Keyword, section: Section, placeholder: &str, bounds: &mut Bounds) -> QueryResult<()> {
    let malformed = || {
        QueryError::malformed(format!(
            "unsupported {} clause in base statement: {:?}",
            if keyword == Keyword::Limit { "LIMIT" } else { "OFFSET" },
            section.sql
        ))
    };
    let mut params = section.params.iter();
    let mut number = |token: &str| -> Option<i64> {
        if token == placeholder {
            match params.next() {
                Some(Value::Int(n)) => Some(*n),
                _ => None,
            }
        } else {
            token.parse().ok()
        }
    };
    let is_rows = |t: &str| t.eq_ignore_ascii_case("ROWS") || t.eq_ignore_ascii_case("ROW");

    let tokens: Vec<&str> = section.sql.split_whitespace().collect();
    match (keyword, tokens.as_slice()) {
        (Keyword::Limit, [n]) => bounds.limit = Some(number(*n).ok_or_else(malformed)?),
        (Keyword::Offset, [n]) => bounds.offset = Some(number(*n).ok_or_else(malformed)?),
        (Keyword::Offset, [n, rows]) if is_rows(*rows) => {
            bounds.offset = Some(number(*n).ok_or_else(malformed)?);
        }
        (Keyword::Offset, [n, rows, fetch, next, m, rows2, only])
            if is_rows(*rows)
                && fetch.eq_ignore_ascii_case("FETCH")
                && (next.eq_ignore_ascii_case("NEXT") || next.eq_ignore_ascii_case("FIRST"))
                && is_rows(*rows2)
                && only.eq_ignore_ascii_case("ONLY") =>
        {
            bounds.offset = Some(number(*n).ok_or_else(malformed)?);
            bounds.limit = Some(number(*m).ok_or_else(malformed)?);
        }
        _ => return Err(malformed()),
    }
    Ok(())
}

/// Free-standing SQL text with the parameters it carries.
#[derive(Debug, Clone, PartialEq, Default)]
struct Section {
    sql: String,
    params: Vec<Value>,
}

impl Section {
    fn take(sql: &str, placeholder: &str, params: &mut std::vec::IntoIter<Value>) -> Self {
        let n = count_placeholders(sql, placeholder);
        Self {
            sql: sql.trim().to_string(),
            params: params.by_ref().take(n).collect(),
        }
    }

    fn write(&self, stmt: &mut Statement) {
        stmt.push_fragment(&self.sql, &self.params);
    }
}

/// WHERE / GROUP BY / ORDER BY / LIMIT / OFFSET state of a query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Clauses {
    head: Section,
    wheres: Vec<Condition>,
    group_by: Option<Section>,
    order_by: Vec<Section>,
    pub(crate) bounds: Bounds,
}

impl Clauses {
    /// Split a base statement into its clauses.
    ///
    /// `params` are assigned to sections in text order by counting placeholders.
    /// A trailing `;` is dropped and base-level `LIMIT`/`OFFSET` become
    /// structured bounds, so chained clauses always land in valid positions.
    pub(crate) fn parse(base: &str, placeholder: &str, params: Vec<Value>) -> QueryResult<Self> {
        let base = base.trim_end().trim_end_matches(';').trim_end();
        let marks = scan_keywords(base);
        let from_end = marks
            .iter()
            .find(|m| m.keyword == Keyword::From)
            .map_or(0, |m| m.end);
        let first = |k: Keyword| {
            marks
                .iter()
                .find(|m| m.keyword == k && m.start >= from_end)
                .copied()
        };

        let mut cuts: Vec<Mark> = [
            Keyword::Where,
            Keyword::GroupBy,
            Keyword::OrderBy,
            Keyword::Limit,
            Keyword::Offset,
        ]
        .into_iter()
        .filter_map(first)
        .collect();
        cuts.sort_by_key(|m| m.start);

        let head_end = cuts.first().map_or(base.len(), |m| m.start);
        let body = |m: &Mark| {
            let next = cuts
                .iter()
                .map(|c| c.start)
                .find(|&s| s > m.start)
                .unwrap_or(base.len());
            &base[m.end..next]
        };

        let mut params = params.into_iter();
        let head = Section::take(&base[..head_end], placeholder, &mut params);
        let mut wheres = Vec::new();
        let mut group_by = None;
        let mut order_by = Vec::new();
        let mut bounds = Bounds::default();

        for mark in &cuts {
            let section = Section::take(body(mark), placeholder, &mut params);
            match mark.keyword {
                Keyword::Limit | Keyword::Offset => {
                    lift_bound(mark.keyword, section, placeholder, &mut bounds)?;
                }
                _ if section.sql.is_empty() => {}
                Keyword::Where => {
                    wheres.push(Condition::raw(format!("({})", section.sql), section.params));
                }
                Keyword::GroupBy => group_by = Some(section),
                Keyword::OrderBy => order_by.push(section),
                Keyword::From => {}
            }
        }

        Ok(Self {
            head,
            wheres,
            group_by,
            order_by,
            bounds,
        })
    }

    pub(crate) fn push_where(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.wheres.extend(conditions);
    }

    pub(crate) fn push_order(&mut self, terms: impl IntoIterator<Item = String>) {
        self.order_by.extend(terms.into_iter().map(|sql| Section {
            sql,
            params: Vec::new(),
        }));
    }

    pub(crate) fn set_group_by(&mut self, columns: Vec<Ident>) {
        let sql = columns
            .iter()
            .map(Ident::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        self.group_by = Some(Section {
            sql,
            params: Vec::new(),
        });
    }

    fn write_where(&self, stmt: &mut Statement) {
        for (i, cond) in self.wheres.iter().enumerate() {
            stmt.push(if i == 0 { " WHERE " } else { " AND " });
            stmt.push_fragment(cond.sql(), cond.params());
        }
    }

    fn write_filtered(&self, stmt: &mut Statement) {
        self.head.write(stmt);
        self.write_where(stmt);
        if let Some(group) = &self.group_by {
            stmt.push(" GROUP BY ");
            group.write(stmt);
        }
    }

    /// The full SELECT.
    pub(crate) fn select<D: Dialect>(&self, dialect: &D) -> Statement {
        let mut stmt = Statement::new(dialect.placeholder());
        self.write_filtered(&mut stmt);
        for (i, term) in self.order_by.iter().enumerate() {
            stmt.push(if i == 0 { " ORDER BY " } else { ", " });
            term.write(&mut stmt);
        }
        dialect.write_bounds(&mut stmt, self.bounds, !self.order_by.is_empty());
        stmt
    }

    /// `SELECT COUNT(*)` over the filtered, unordered, unbounded statement.
    pub(crate) fn count<D: Dialect>(&self, dialect: &D) -> Statement {
        let mut stmt = Statement::new(dialect.placeholder());
        stmt.push("SELECT COUNT(*) AS query_count FROM (");
        self.write_filtered(&mut stmt);
        stmt.push(") AS t");
        stmt
    }

    /// The table named by the head's single top-level `FROM`.
    pub(crate) fn from_target(&self) -> QueryResult<String> {
        let marks: Vec<Mark> = scan_keywords(&self.head.sql)
            .into_iter()
            .filter(|m| m.keyword == Keyword::From)
            .collect();
        match marks.as_slice() {
            [from] => parse_target(&self.head.sql[from.end..]),
            [] => Err(QueryError::malformed(format!(
                "base statement has no FROM target: {:?}",
                self.head.sql
            ))),
            _ => Err(QueryError::malformed(format!(
                "base statement has more than one FROM boundary: {:?}",
                self.head.sql
            ))),
        }
    }

    pub(crate) fn delete<D: Dialect>(&self, dialect: &D) -> QueryResult<Statement> {
        let target = self.from_target()?;
        let mut stmt = Statement::new(dialect.placeholder());
        stmt.push("DELETE FROM ").push(&target);
        self.write_where(&mut stmt);
        Ok(stmt)
    }

    pub(crate) fn update<D: Dialect>(
        &self,
        dialect: &D,
        assignments: Vec<(Ident, Value)>,
    ) -> QueryResult<Statement> {
        let target = self.from_target()?;
        if assignments.is_empty() {
            return Err(QueryError::malformed("update requires at least one assignment"));
        }
        let mut stmt = Statement::new(dialect.placeholder());
        stmt.push("UPDATE ").push(&target).push(" SET ");
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push(&column.to_sql()).push(" = ").push_bind(value.to_storage()?);
        }
        self.write_where(&mut stmt);
        Ok(stmt)
    }
}

/// `-field` → `"field" DESC`, `field` → `"field" ASC`.
pub(crate) fn order_term(spec: &str) -> QueryResult<String> {
    let (field, direction) = match spec.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (spec, "ASC"),
    };
    Ok(format!("{} {direction}", Ident::field(field)?.to_sql()))
}
