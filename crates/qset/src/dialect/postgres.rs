use super::{Bounds, Dialect};
use crate::statement::Statement;
use crate::value::Value;

/// PostgreSQL: `%s` placeholders, native `ILIKE`, `LIMIT .. OFFSET ..`.
///
/// Backslash is PostgreSQL's default LIKE escape character, so no `ESCAPE`
/// clause is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self) -> &'static str {
        "%s"
    }

    fn like_escape(&self) -> &'static str {
        ""
    }

    fn write_ilike(&self, out: &mut String, column: &str) {
        out.push_str(column);
        out.push_str(" ILIKE ");
        out.push_str(self.placeholder());
    }

    fn write_bounds(&self, stmt: &mut Statement, bounds: Bounds, _ordered: bool) {
        if let Some(limit) = bounds.limit {
            stmt.push(" LIMIT ").push_bind(Value::Int(limit));
        }
        if let Some(offset) = bounds.offset {
            stmt.push(" OFFSET ").push_bind(Value::Int(offset));
        }
    }
}
