//! Query sets against PostgreSQL. Skipped unless `DATABASE_URL` is set.

use qset::prelude::*;
use qset::{create_table, insert_many};

async fn try_connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&database_url, tokio_postgres::NoTls)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("tokio-postgres connection error: {e}");
        }
    });
    Some(client)
}

/// A fresh table per test so tests can run concurrently.
async fn seeded(client: &tokio_postgres::Client, table: &str) {
    client
        .batch_execute(&format!("DROP TABLE IF EXISTS {table}"))
        .await
        .unwrap();
    create_table(
        client,
        &Postgres,
        table,
        &[
            ("id", "BIGINT PRIMARY KEY"),
            ("title", "TEXT NOT NULL"),
            ("status", "TEXT NOT NULL"),
            ("tags", "JSONB"),
        ],
    )
    .await
    .unwrap();
    let rows = [
        (1, "100%_done", "open"),
        (2, "Write Docs", "open"),
        (3, "ship", "done"),
    ]
    .map(|(id, title, status)| {
        Row::from_pairs([
            ("id", Value::Int(id)),
            ("title", Value::from(title)),
            ("status", Value::from(status)),
            ("tags", Value::Null),
        ])
    });
    insert_many(client, &Postgres, table, &rows).await.unwrap();
}

#[tokio::test]
async fn filter_count_delete() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    seeded(&client, "qset_pg_filter").await;

    let q: Query<Row, Postgres> = Query::table(Postgres, "qset_pg_filter").unwrap();
    let open = q.filter(lookups! { "status" => "open" }).unwrap();
    assert_eq!(open.count(&client).await.unwrap(), 2);

    let rest = q.exclude(lookups! { "status" => "done" }).unwrap().order(["id"]).unwrap();
    let ids: Vec<i64> = rest
        .execute(&client)
        .await
        .unwrap()
        .iter()
        .map(|r| r.try_get("id").unwrap())
        .collect();
    assert_eq!(ids, [1, 2]);

    let deleted = q
        .filter(lookups! { "status" => "done" })
        .unwrap()
        .delete(&client)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(q.count(&client).await.unwrap(), 2);
}

#[tokio::test]
async fn like_escaping_and_ilike() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    seeded(&client, "qset_pg_like").await;

    let q: Query<Row, Postgres> = Query::table(Postgres, "qset_pg_like").unwrap();
    let literal = q.filter(lookups! { "title__contains" => "100%_" }).unwrap();
    assert_eq!(literal.count(&client).await.unwrap(), 1);

    let ci = q.filter(lookups! { "title__istartswith" => "write" }).unwrap();
    assert_eq!(ci.count(&client).await.unwrap(), 1);
    let cs = q.filter(lookups! { "title__startswith" => "write" }).unwrap();
    assert_eq!(cs.count(&client).await.unwrap(), 0);
}

#[tokio::test]
async fn pagination_and_get() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    seeded(&client, "qset_pg_page").await;

    let q: Query<Row, Postgres> = Query::table(Postgres, "qset_pg_page")
        .unwrap()
        .order(["id"])
        .unwrap();
    let page = q.paginate(2, 1).execute(&client).await.unwrap();
    assert_eq!(page[0].try_get::<i64>("id").unwrap(), 2);

    let row = q.get(&client, lookups! { "id" => 3 }).await.unwrap();
    assert_eq!(row.try_get::<String>("title").unwrap(), "ship");
    assert!(q.get(&client, lookups! { "id" => 9 }).await.unwrap_err().is_not_found());
    assert!(
        q.get(&client, lookups! { "status" => "open" })
            .await
            .unwrap_err()
            .is_multiple_results()
    );

    let empty = q.filter(lookups! { "id__in" => Vec::<i64>::new() }).unwrap();
    assert!(empty.execute(&client).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_json_column() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    seeded(&client, "qset_pg_update").await;

    let q: Query<Row, Postgres> = Query::table(Postgres, "qset_pg_update").unwrap();
    let updated = q
        .filter(lookups! { "id" => 1 })
        .unwrap()
        .update(&client, lookups! { "tags" => serde_json::json!({"k": [1, 2]}) })
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let row = q.get(&client, lookups! { "id" => 1 }).await.unwrap();
    assert_eq!(
        row.try_get::<serde_json::Value>("tags").unwrap(),
        serde_json::json!({"k": [1, 2]})
    );
}
