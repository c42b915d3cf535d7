use super::{Bounds, Dialect};
use crate::statement::Statement;
use crate::value::Value;

/// SQLite: `?` placeholders, `UPPER()`-wrapped case-insensitive LIKE,
/// `LIMIT` always before `OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self) -> &'static str {
        "?"
    }

    fn write_bounds(&self, stmt: &mut Statement, bounds: Bounds, _ordered: bool) {
        match (bounds.limit, bounds.offset) {
            (None, None) => {}
            (Some(limit), offset) => {
                stmt.push(" LIMIT ").push_bind(Value::Int(limit));
                if let Some(offset) = offset {
                    stmt.push(" OFFSET ").push_bind(Value::Int(offset));
                }
            }
            // OFFSET is only valid after LIMIT; -1 means no upper bound.
            (None, Some(offset)) => {
                stmt.push(" LIMIT -1 OFFSET ").push_bind(Value::Int(offset));
            }
        }
    }
}
