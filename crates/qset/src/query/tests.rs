use super::*;
use crate::connection::mock::{FailingConnection, RecordingConnection};
use crate::dialect::{Postgres, Sqlite, TSql};
use crate::lookups;

#[derive(Debug, Clone, PartialEq)]
struct Thing {
    id: i64,
    name: String,
}

impl FromRow for Thing {
    fn from_row(row: &Row) -> QueryResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

fn thing_row(id: i64, name: &str) -> Row {
    Row::from_pairs([("id", Value::Int(id)), ("name", Value::from(name))])
}

fn lite() -> Query<Thing, Sqlite> {
    Query::new(Sqlite, "SELECT * FROM thing").unwrap()
}

fn pg() -> Query<Thing, Postgres> {
    Query::new(Postgres, "SELECT * FROM thing").unwrap()
}

// ==================== SQL assembly ====================

#[test]
fn filter_single_predicate() {
    let q = lite().filter(lookups! { "id" => 1 }).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "id" = ?"#);
    assert_eq!(q.params(), [Value::Int(1)]);

    let q = pg().filter(lookups! { "id" => 1 }).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "id" = %s"#);
}

#[test]
fn filter_two_predicates_keep_order() {
    let q = lite().filter(lookups! { "id" => 1, "name" => "John" }).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "id" = ? AND "name" = ?"#);
    assert_eq!(q.params(), [Value::Int(1), Value::from("John")]);
}

#[test]
fn exclude_wraps_in_not() {
    let q = lite().exclude(lookups! { "id" => 1 }).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE NOT ("id" = ?)"#);
    assert_eq!(q.params(), [Value::Int(1)]);
}

#[test]
fn order_directions() {
    let q = lite().order(["-priority", "name"]).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing ORDER BY "priority" DESC, "name" ASC"#);
}

#[test]
fn order_empty_is_noop() {
    let q = lite().order(Vec::<&str>::new()).unwrap();
    assert_eq!(q.sql(), "SELECT * FROM thing");
}

#[test]
fn empty_in_is_false_not_missing() {
    for q in [
        lite().filter(lookups! { "id__in" => Vec::<i64>::new() }).unwrap().sql(),
        pg().filter(lookups! { "id__in" => Vec::<i64>::new() }).unwrap().sql(),
    ] {
        assert_eq!(q, "SELECT * FROM thing WHERE 1 = 0");
    }
    assert!(lite().filter(lookups! { "id__in" => Vec::<i64>::new() }).unwrap().params().is_empty());
}

#[test]
fn invalid_field_fails_before_any_sql() {
    let err = lite().filter(lookups! { "id; DROP TABLE thing" => 1 }).unwrap_err();
    assert!(matches!(err, QueryError::InvalidField(_)));
    assert!(lite().order(["-na me"]).is_err());
    assert!(lite().group_by(["a.b"]).is_err());
    assert!(lite().search("x y", "z").is_err());
}

#[test]
fn chaining_leaves_receiver_untouched() {
    let base = lite();
    let filtered = base.filter(lookups! { "x" => 1 }).unwrap();
    let _ = filtered.order(["x"]).unwrap().limit(5);
    let _ = base.exclude(lookups! { "y" => 2 }).unwrap();
    assert_eq!(base.sql(), "SELECT * FROM thing");
    assert!(base.params().is_empty());
    assert_eq!(filtered.sql(), r#"SELECT * FROM thing WHERE "x" = ?"#);
    assert_eq!(filtered.params(), [Value::Int(1)]);
}

#[test]
fn branches_are_independent() {
    let base = lite().filter(lookups! { "status" => "open" }).unwrap();
    let a = base.filter(lookups! { "owner" => 1 }).unwrap();
    let b = base.filter(lookups! { "owner" => 2 }).unwrap();
    assert_eq!(a.params(), [Value::from("open"), Value::Int(1)]);
    assert_eq!(b.params(), [Value::from("open"), Value::Int(2)]);
}

#[test]
fn search_builds_case_insensitive_match() {
    let q = pg().search("name", "jo").unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "name" ILIKE %s"#);
    assert_eq!(q.params(), [Value::from("%jo%")]);

    let q = Query::<Thing, _>::new(TSql, "SELECT * FROM thing")
        .unwrap()
        .search("name", "jo")
        .unwrap();
    assert_eq!(
        q.sql(),
        r#"SELECT * FROM thing WHERE UPPER("name") LIKE UPPER(?) ESCAPE '\'"#
    );
}

#[test]
fn search_with_empty_input_is_noop() {
    assert_eq!(lite().search("", "x").unwrap().sql(), "SELECT * FROM thing");
    assert_eq!(lite().search("name", "").unwrap().sql(), "SELECT * FROM thing");
}

#[test]
fn pagination_matches_offset_limit() {
    for (page, offset) in [(1, 0), (2, 10), (3, 20)] {
        let paged = lite().paginate(page, 10);
        let manual = lite().offset(offset).limit(10);
        assert_eq!(paged.sql(), manual.sql());
        assert_eq!(paged.params(), manual.params());
    }
}

#[test]
fn pagination_order_per_dialect() {
    assert_eq!(lite().paginate(2, 10).sql(), "SELECT * FROM thing LIMIT ? OFFSET ?");
    assert_eq!(lite().paginate(2, 10).params(), [Value::Int(10), Value::Int(10)]);

    let q = pg().offset(5).limit(2);
    assert_eq!(q.sql(), "SELECT * FROM thing LIMIT %s OFFSET %s");
    assert_eq!(q.params(), [Value::Int(2), Value::Int(5)]);

    let q = Query::<Thing, _>::new(TSql, "SELECT * FROM thing")
        .unwrap()
        .order(["id"])
        .unwrap()
        .paginate(3, 10);
    assert_eq!(
        q.sql(),
        r#"SELECT * FROM thing ORDER BY "id" ASC OFFSET ? ROWS FETCH NEXT ? ROWS ONLY"#
    );
    assert_eq!(q.params(), [Value::Int(20), Value::Int(10)]);
}

#[test]
fn limit_and_offset_can_be_called_in_any_order() {
    let a = lite().limit(3).filter(lookups! { "id__gt" => 1 }).unwrap().offset(6);
    let b = lite().offset(6).filter(lookups! { "id__gt" => 1 }).unwrap().limit(3);
    assert_eq!(a.sql(), b.sql());
    assert_eq!(a.params(), [Value::Int(1), Value::Int(3), Value::Int(6)]);
}

#[test]
fn slice_is_relative_to_current_window() {
    let q = lite().slice(5..15);
    assert_eq!(q.params(), [Value::Int(10), Value::Int(5)]);
    let q = lite().slice(5..15).slice(2..4);
    assert_eq!(q.params(), [Value::Int(2), Value::Int(7)]);
}

#[test]
fn huge_bounds_saturate() {
    let q = lite().paginate(i64::MAX / 2, 10);
    assert_eq!(q.params(), [Value::Int(10), Value::Int(i64::MAX)]);
    let q = lite().offset(i64::MAX).slice(5..10);
    assert_eq!(q.params(), [Value::Int(5), Value::Int(i64::MAX)]);
    let q = lite().slice(3..i64::MIN);
    assert_eq!(q.params(), [Value::Int(0), Value::Int(3)]);
}

#[test]
fn base_statement_terminator_and_bounds() {
    let q: Query<Thing, _> = Query::new(Sqlite, "SELECT * FROM thing LIMIT 5;").unwrap();
    let q = q.filter(lookups! { "id__gt" => 1 }).unwrap().offset(10);
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "id" > ? LIMIT ? OFFSET ?"#);
    assert_eq!(q.params(), [Value::Int(1), Value::Int(5), Value::Int(10)]);

    let err = Query::<Thing, _>::new(Sqlite, "SELECT * FROM thing LIMIT 1, 2").unwrap_err();
    assert!(matches!(err, QueryError::MalformedQuery(_)));
}

#[test]
fn group_by_replaces_grouping() {
    let q: Query<Row, _> =
        Query::new(Sqlite, "SELECT status, COUNT(*) AS n FROM thing GROUP BY owner").unwrap();
    let q = q.group_by(["status"]).unwrap();
    assert_eq!(q.sql(), r#"SELECT status, COUNT(*) AS n FROM thing GROUP BY "status""#);
}

#[test]
fn base_statement_clauses_merge_with_chained_ones() {
    let q: Query<Thing, _> = Query::with_params(
        Sqlite,
        "SELECT * FROM thing WHERE owner = ? ORDER BY created",
        vec![Value::Int(9)],
    )
    .unwrap();
    let q = q.filter(lookups! { "id__lt" => 100 }).unwrap().order(["-id"]).unwrap().limit(5);
    assert_eq!(
        q.sql(),
        r#"SELECT * FROM thing WHERE (owner = ?) AND "id" < ? ORDER BY created, "id" DESC LIMIT ?"#
    );
    assert_eq!(q.params(), [Value::Int(9), Value::Int(100), Value::Int(5)]);
}

#[test]
fn with_params_checks_placeholder_count() {
    let err = Query::<Thing, _>::with_params(Sqlite, "SELECT * FROM thing WHERE a = ?", vec![])
        .unwrap_err();
    assert!(matches!(err, QueryError::MalformedQuery(_)));
}

#[test]
fn table_validates_name() {
    let q = Query::<Thing, _>::table(Postgres, "public.thing").unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM "public"."thing""#);
    assert!(matches!(
        Query::<Thing, _>::table(Postgres, "thing; DROP TABLE x"),
        Err(QueryError::InvalidIdentifier(_))
    ));
}

#[test]
fn runtime_dialect_selection() {
    let kind: DialectKind = "postgresql".parse().unwrap();
    let q: Query<Thing> = Query::new(kind, "SELECT * FROM thing").unwrap();
    let q = q.filter(lookups! { "id" => 1 }).unwrap();
    assert_eq!(q.sql(), r#"SELECT * FROM thing WHERE "id" = %s"#);
}

// ==================== Terminal operations ====================

#[tokio::test]
async fn execute_maps_rows() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![thing_row(1, "a"), thing_row(2, "b")]);

    let things = lite().filter(lookups! { "id__gte" => 1 }).unwrap().execute(&conn).await.unwrap();
    assert_eq!(
        things,
        [
            Thing { id: 1, name: "a".into() },
            Thing { id: 2, name: "b".into() }
        ]
    );
    let (sql, params) = conn.last_call();
    assert_eq!(sql, r#"SELECT * FROM thing WHERE "id" >= ?"#);
    assert_eq!(params, [Value::Int(1)]);
}

#[tokio::test]
async fn repeated_terminal_calls_send_identical_statements() {
    let conn = RecordingConnection::new();
    let q = lite().filter(lookups! { "name__contains" => "x" }).unwrap().limit(3);
    q.execute(&conn).await.unwrap();
    q.execute(&conn).await.unwrap();
    let calls = conn.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn count_drops_order_and_bounds() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![Row::from_pairs([("query_count", Value::Int(2))])]);

    let q = pg()
        .filter(lookups! { "status" => "open" })
        .unwrap()
        .order(["-id"])
        .unwrap()
        .paginate(2, 5);
    assert_eq!(q.count(&conn).await.unwrap(), 2);

    let (sql, params) = conn.last_call();
    assert_eq!(
        sql,
        r#"SELECT COUNT(*) AS query_count FROM (SELECT * FROM thing WHERE "status" = %s) AS t"#
    );
    assert_eq!(params, [Value::from("open")]);
}

#[tokio::test]
async fn len_is_count() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![Row::from_pairs([("query_count", Value::Int(7))])]);
    assert_eq!(lite().len(&conn).await.unwrap(), 7);
    assert!(conn.last_call().0.starts_with("SELECT COUNT(*)"));
}

#[tokio::test]
async fn first_overrides_limit_structurally() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![thing_row(4, "d")]);

    let q = lite().order(["id"]).unwrap().limit(10).offset(3);
    let first = q.first(&conn).await.unwrap();
    assert_eq!(first.map(|t| t.id), Some(4));

    let (sql, params) = conn.last_call();
    assert_eq!(sql, r#"SELECT * FROM thing ORDER BY "id" ASC LIMIT ? OFFSET ?"#);
    assert_eq!(params, [Value::Int(1), Value::Int(3)]);
    // the receiver keeps its own limit
    assert_eq!(q.params(), [Value::Int(10), Value::Int(3)]);
}

#[tokio::test]
async fn first_on_tsql_stays_valid_without_order() {
    let conn = RecordingConnection::new();
    let q: Query<Thing, _> = Query::new(TSql, "SELECT * FROM thing").unwrap();
    assert_eq!(q.first(&conn).await.unwrap(), None);
    assert_eq!(
        conn.last_call().0,
        "SELECT * FROM thing ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT ? ROWS ONLY"
    );
}

#[tokio::test]
async fn exists_reflects_first() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![thing_row(1, "a")]);
    assert!(lite().exists(&conn).await.unwrap());
    assert!(!lite().exists(&conn).await.unwrap());
}

#[tokio::test]
async fn get_one_statement_bounded_to_two() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![thing_row(5, "e")]);
    let got = lite().get(&conn, lookups! { "id" => 5 }).await.unwrap();
    assert_eq!(got.name, "e");
    assert_eq!(conn.calls().len(), 1);
    let (sql, params) = conn.last_call();
    assert_eq!(sql, r#"SELECT * FROM thing WHERE "id" = ? LIMIT ?"#);
    assert_eq!(params, [Value::Int(5), Value::Int(2)]);
}

#[tokio::test]
async fn get_reports_zero_and_many() {
    let conn = RecordingConnection::new();
    let err = lite().get(&conn, lookups! { "id" => 5 }).await.unwrap_err();
    assert!(err.is_not_found());

    conn.push_rows(vec![thing_row(1, "a"), thing_row(2, "a")]);
    let err = lite().get(&conn, lookups! { "name" => "a" }).await.unwrap_err();
    assert!(err.is_multiple_results());
}

#[tokio::test]
async fn delete_uses_from_target_and_commits() {
    let conn = RecordingConnection::with_affected(1);
    let q = lite().filter(lookups! { "status" => "done" }).unwrap().order(["id"]).unwrap().limit(3);
    assert_eq!(q.delete(&conn).await.unwrap(), 1);
    let (sql, params) = conn.last_call();
    assert_eq!(sql, r#"DELETE FROM "thing" WHERE "status" = ?"#);
    assert_eq!(params, [Value::from("done")]);
    assert_eq!(conn.commits(), 1);
}

#[tokio::test]
async fn update_serializes_structured_values() {
    let conn = RecordingConnection::with_affected(2);
    let q = pg().filter(lookups! { "id__in" => vec![1, 2] }).unwrap();
    let affected = q
        .update(
            &conn,
            lookups! {
                "name" => "x",
                "tags" => vec!["a", "b"],
                "meta" => serde_json::json!({"k": 1}),
            },
        )
        .await
        .unwrap();
    assert_eq!(affected, 2);
    let (sql, params) = conn.last_call();
    assert_eq!(
        sql,
        r#"UPDATE "thing" SET "name" = %s, "tags" = %s, "meta" = %s WHERE "id" IN (%s, %s)"#
    );
    assert_eq!(
        params,
        [
            Value::from("x"),
            Value::from(r#"["a","b"]"#),
            Value::from(r#"{"k":1}"#),
            Value::Int(1),
            Value::Int(2),
        ]
    );
    assert_eq!(conn.commits(), 1);
}

#[tokio::test]
async fn update_rejects_bad_column_before_sending() {
    let conn = RecordingConnection::new();
    let err = lite().update(&conn, lookups! { "na-me" => 1 }).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidField(_)));
    assert!(conn.calls().is_empty());
    assert_eq!(conn.commits(), 0);
}

#[tokio::test]
async fn delete_without_from_target_is_malformed() {
    let conn = RecordingConnection::new();
    let q: Query<Thing, _> = Query::new(Sqlite, "SELECT 1").unwrap();
    let err = q.delete(&conn).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedQuery(_)));
    assert!(conn.calls().is_empty());
}

#[tokio::test]
async fn connection_errors_propagate() {
    let err = lite().execute(&FailingConnection).await.unwrap_err();
    assert!(matches!(err, QueryError::Connection(_)));
    let err = lite().delete(&FailingConnection).await.unwrap_err();
    assert!(matches!(err, QueryError::Connection(_)));
}

#[tokio::test]
async fn decode_errors_surface() {
    let conn = RecordingConnection::new();
    conn.push_rows(vec![Row::from_pairs([("id", Value::from("not a number"))])]);
    let err = lite().execute(&conn).await.unwrap_err();
    assert!(matches!(err, QueryError::Decode { .. }));
}
