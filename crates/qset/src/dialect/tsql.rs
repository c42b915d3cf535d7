use super::{Bounds, Dialect};
use crate::statement::Statement;
use crate::value::Value;

/// Legacy T-SQL: `?` placeholders, `UPPER()`-wrapped case-insensitive LIKE,
/// `OFFSET ? ROWS FETCH NEXT ? ROWS ONLY` paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TSql;

impl Dialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn placeholder(&self) -> &'static str {
        "?"
    }

    fn write_bounds(&self, stmt: &mut Statement, bounds: Bounds, ordered: bool) {
        if bounds.is_unbounded() {
            return;
        }
        // OFFSET/FETCH is only valid after ORDER BY.
        if !ordered {
            stmt.push(" ORDER BY (SELECT NULL)");
        }
        match bounds.offset {
            Some(offset) => {
                stmt.push(" OFFSET ").push_bind(Value::Int(offset)).push(" ROWS");
            }
            None => {
                stmt.push(" OFFSET 0 ROWS");
            }
        }
        if let Some(limit) = bounds.limit {
            stmt.push(" FETCH NEXT ").push_bind(Value::Int(limit)).push(" ROWS ONLY");
        }
    }
}
