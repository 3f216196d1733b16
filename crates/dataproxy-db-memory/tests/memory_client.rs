//! End-to-end behaviour of the in-memory client against the sample document.

use dataproxy_client::{ClientError, ClientOperation, CrudClient};
use dataproxy_core::IntrospectionDocument;
use dataproxy_db_memory::InMemoryClient;
use serde_json::{Value, json};

const SAMPLE: &str = include_str!("../../../fixtures/sample_dmmf.json");

async fn seeded() -> InMemoryClient {
    let doc = IntrospectionDocument::from_json(SAMPLE).unwrap();
    let client = InMemoryClient::new(&doc);
    client
        .seed(&json!({
            "Team": [
                { "id": "t1", "name": "Red", "language": ["ENGLISH"] },
                { "id": "t2", "name": "Blue" }
            ],
            "User": [
                { "email": "alice@example.com", "name": "Alice", "teamId": "t1" },
                { "email": "bob@example.com", "name": "Bob", "teamId": "t1" },
                { "email": "carol@example.com", "name": "Carol" }
            ],
            "LeaderboardRow": [
                { "leaderboardId": 1, "userId": 1, "rating": 1200 },
                { "leaderboardId": 1, "userId": 2, "rating": 1500 },
                { "leaderboardId": 2, "userId": 1, "rating": 900 }
            ]
        }))
        .await
        .unwrap();
    client
}

async fn run(client: &InMemoryClient, delegate: &str, op: ClientOperation, args: Value) -> Value {
    client.execute(delegate, op, args).await.unwrap()
}

#[tokio::test]
async fn seeding_applies_defaults() {
    let client = seeded().await;
    assert_eq!(client.row_count("User"), 3);

    let carol = run(
        &client,
        "user",
        ClientOperation::FindUnique,
        json!({ "where": { "email": "carol@example.com" } }),
    )
    .await;
    assert_eq!(carol["id"], json!(3));
    assert_eq!(carol["teamId"], Value::Null);
    assert!(carol["createdAt"].is_string());
    assert!(carol["updatedAt"].is_string());

    let blue = run(&client, "team", ClientOperation::FindUnique, json!({ "where": { "id": "t2" } })).await;
    assert_eq!(blue["language"], json!([]));
}

#[tokio::test]
async fn find_many_filters_orders_and_pages() {
    let client = seeded().await;

    let users = run(
        &client,
        "user",
        ClientOperation::FindMany,
        json!({
            "where": { "teamId": "t1" },
            "orderBy": { "name": "desc" },
            "select": { "name": true }
        }),
    )
    .await;
    assert_eq!(users, json!([{ "name": "Bob" }, { "name": "Alice" }]));

    let page = run(
        &client,
        "user",
        ClientOperation::FindMany,
        json!({ "orderBy": { "id": "asc" }, "skip": 1, "take": 1, "select": { "id": true } }),
    )
    .await;
    assert_eq!(page, json!([{ "id": 2 }]));
}

#[tokio::test]
async fn composite_key_lookup() {
    let client = seeded().await;
    let row = run(
        &client,
        "leaderboardRow",
        ClientOperation::FindUnique,
        json!({ "where": { "leaderboardId_userId": { "leaderboardId": 1, "userId": 2 } } }),
    )
    .await;
    assert_eq!(row["rating"], json!(1500));
}

#[tokio::test]
async fn or_throw_reports_not_found() {
    let client = seeded().await;
    let err = client
        .execute(
            "user",
            ClientOperation::FindUniqueOrThrow,
            json!({ "where": { "id": 99 } }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
    assert_eq!(err.to_string(), "No User found");
}

#[tokio::test]
async fn create_rejects_duplicates_and_missing_fields() {
    let client = seeded().await;

    let err = client
        .execute(
            "user",
            ClientOperation::Create,
            json!({ "data": { "email": "alice@example.com", "name": "Again" } }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "P2002");
    assert!(err.to_string().contains("email"));

    let err = client
        .execute("user", ClientOperation::Create, json!({ "data": { "name": "Nobody" } }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Argument `email` is missing.");
}

#[tokio::test]
async fn create_connects_relation_and_continues_sequence() {
    let client = seeded().await;
    let dave = run(
        &client,
        "user",
        ClientOperation::Create,
        json!({ "data": { "email": "dave@example.com", "name": "Dave", "Team": { "connect": { "id": "t2" } } } }),
    )
    .await;
    assert_eq!(dave["id"], json!(4));
    assert_eq!(dave["teamId"], json!("t2"));

    let err = client
        .execute(
            "user",
            ClientOperation::Create,
            json!({ "data": { "email": "e@example.com", "name": "E", "Team": { "connect": { "id": "nope" } } } }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
}

#[tokio::test]
async fn create_many_skips_duplicates() {
    let client = seeded().await;
    let out = run(
        &client,
        "user",
        ClientOperation::CreateMany,
        json!({
            "data": [
                { "email": "alice@example.com", "name": "Dup" },
                { "email": "erin@example.com", "name": "Erin" }
            ],
            "skipDuplicates": true
        }),
    )
    .await;
    assert_eq!(out, json!({ "count": 1 }));
    assert_eq!(client.row_count("User"), 4);
}

#[tokio::test]
async fn update_upsert_and_delete() {
    let client = seeded().await;

    let row = run(
        &client,
        "leaderboardRow",
        ClientOperation::Update,
        json!({
            "where": { "leaderboardId_userId": { "leaderboardId": 1, "userId": 1 } },
            "data": { "rating": { "increment": 50 } }
        }),
    )
    .await;
    assert_eq!(row["rating"], json!(1250));

    let out = run(
        &client,
        "user",
        ClientOperation::UpdateMany,
        json!({ "where": { "teamId": "t1" }, "data": { "teamId": null } }),
    )
    .await;
    assert_eq!(out, json!({ "count": 2 }));

    let upserted = run(
        &client,
        "team",
        ClientOperation::Upsert,
        json!({
            "where": { "id": "t3" },
            "create": { "id": "t3", "name": "Green" },
            "update": { "name": "unused" }
        }),
    )
    .await;
    assert_eq!(upserted["name"], json!("Green"));

    let deleted = run(&client, "team", ClientOperation::Delete, json!({ "where": { "id": "t3" } })).await;
    assert_eq!(deleted["id"], json!("t3"));

    let err = client
        .execute("team", ClientOperation::Delete, json!({ "where": { "id": "t3" } }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "P2025");

    let out = run(&client, "leaderboardRow", ClientOperation::DeleteMany, json!({})).await;
    assert_eq!(out, json!({ "count": 3 }));
}

#[tokio::test]
async fn count_aggregate_and_group_by() {
    let client = seeded().await;

    let n = run(&client, "user", ClientOperation::Count, json!({ "where": { "teamId": "t1" } })).await;
    assert_eq!(n, json!(2));

    let agg = run(
        &client,
        "user",
        ClientOperation::Aggregate,
        json!({ "where": { "id": 1 }, "_count": { "_all": true, "id": true } }),
    )
    .await;
    assert_eq!(agg, json!({ "_count": { "_all": 1, "id": 1 } }));

    let groups = run(
        &client,
        "leaderboardRow",
        ClientOperation::GroupBy,
        json!({ "by": ["leaderboardId"], "_max": { "rating": true }, "orderBy": { "leaderboardId": "asc" } }),
    )
    .await;
    assert_eq!(
        groups,
        json!([
            { "leaderboardId": 1, "_max": { "rating": 1500 } },
            { "leaderboardId": 2, "_max": { "rating": 900 } }
        ])
    );
}

#[tokio::test]
async fn relation_handle_follows_both_directions() {
    let client = seeded().await;

    let team = client
        .find_unique("user", json!({ "where": { "id": 1 } }))
        .await
        .unwrap()
        .relation("Team", json!({ "select": { "name": true } }))
        .await
        .unwrap();
    assert_eq!(team, json!({ "name": "Red" }));

    let users = client
        .find_unique("team", json!({ "where": { "id": "t1" } }))
        .await
        .unwrap()
        .relation("users", json!({ "where": { "name": "Bob" }, "select": { "email": true } }))
        .await
        .unwrap();
    assert_eq!(users, json!([{ "email": "bob@example.com" }]));

    let user = client
        .find_unique(
            "leaderboardRow",
            json!({ "where": { "leaderboardId_userId": { "leaderboardId": 2, "userId": 1 } } }),
        )
        .await
        .unwrap()
        .relation("User", json!({ "select": { "name": true } }))
        .await
        .unwrap();
    assert_eq!(user, json!({ "name": "Alice" }));
}

#[tokio::test]
async fn relation_handle_on_missing_parent_is_null() {
    let client = seeded().await;

    let team = client
        .find_unique("user", json!({ "where": { "id": 42 } }))
        .await
        .unwrap()
        .relation("Team", Value::Null)
        .await
        .unwrap();
    assert_eq!(team, Value::Null);

    // Carol has no team.
    let team = client
        .find_unique("user", json!({ "where": { "id": 3 } }))
        .await
        .unwrap()
        .relation("Team", Value::Null)
        .await
        .unwrap();
    assert_eq!(team, Value::Null);
}

#[tokio::test]
async fn include_and_relation_counts() {
    let client = seeded().await;
    let team = run(
        &client,
        "team",
        ClientOperation::FindUnique,
        json!({ "where": { "id": "t1" }, "include": { "_count": true } }),
    )
    .await;
    assert_eq!(team["_count"], json!({ "users": 2 }));
}

#[tokio::test]
async fn unknown_delegate_and_raw_are_rejected() {
    let client = seeded().await;

    let err = client
        .execute("post", ClientOperation::FindMany, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation { .. }));

    assert!(client.find_unique("post", json!({})).await.is_err());

    let err = client.query_raw("SELECT 1", vec![]).await.unwrap_err();
    assert!(matches!(err, ClientError::Unsupported { .. }));
}
