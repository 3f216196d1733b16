//! The synthesized schema running against the in-memory client.

use std::sync::Arc;

use async_graphql::Request;
use async_graphql::dynamic::Schema;
use dataproxy_client::DynClient;
use dataproxy_core::IntrospectionDocument;
use dataproxy_db_memory::InMemoryClient;
use dataproxy_graphql::{SchemaBuilderConfig, build_schema};
use serde_json::{Value, json};

const SAMPLE: &str = include_str!("../../../fixtures/sample_dmmf.json");

async fn setup() -> (Schema, Arc<InMemoryClient>) {
    let doc = IntrospectionDocument::from_json(SAMPLE).unwrap();
    let client = Arc::new(InMemoryClient::new(&doc));
    client
        .seed(&json!({
            "Team": [{ "id": "t1", "name": "Red", "language": ["JAPANESE", "FRENCH"] }],
            "User": [
                { "email": "alice@example.com", "name": "Alice", "teamId": "t1" },
                { "email": "bob@example.com", "name": "Bob" }
            ],
            "LeaderboardRow": [
                { "leaderboardId": 1, "userId": 1, "rating": 1200 },
                { "leaderboardId": 2, "userId": 1, "rating": 900 }
            ]
        }))
        .await
        .unwrap();

    let dyn_client: DynClient = client.clone();
    let schema = build_schema(&doc, dyn_client, SchemaBuilderConfig::default()).unwrap();
    (schema, client)
}

async fn data(schema: &Schema, query: &str) -> Value {
    let response = schema.execute(Request::new(query)).await;
    assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

#[tokio::test]
async fn created_records_are_visible_through_relations() {
    let (schema, client) = setup().await;

    let created = data(
        &schema,
        r#"mutation {
            createOneTeam(data: { name: "Blue", language: { set: ["ENGLISH"] } }) { id name language }
        }"#,
    )
    .await;
    let team = &created["createOneTeam"];
    assert_eq!(team["name"], "Blue");
    assert_eq!(team["language"], json!(["ENGLISH"]));
    let team_id = team["id"].as_str().unwrap().to_string();

    let query = format!(
        r#"mutation {{
            createOneUser(data: {{ email: "carol@example.com", name: "Carol", teamId: "{team_id}" }}) {{
                id
                Team {{ name language }}
            }}
        }}"#
    );
    let user = data(&schema, &query).await;
    assert_eq!(
        user["createOneUser"],
        json!({ "id": 3, "Team": { "name": "Blue", "language": ["ENGLISH"] } })
    );
    assert_eq!(client.row_count("User"), 3);
}

#[tokio::test]
async fn list_relations_honour_their_arguments() {
    let (schema, _client) = setup().await;
    let result = data(
        &schema,
        r#"{
            findManyUser(orderBy: { id: asc }) {
                name
                leaderboardRows(orderBy: { rating: desc }, take: 1) { leaderboardId rating }
            }
        }"#,
    )
    .await;

    assert_eq!(
        result,
        json!({
            "findManyUser": [
                { "name": "Alice", "leaderboardRows": [{ "leaderboardId": 1, "rating": 1200 }] },
                { "name": "Bob", "leaderboardRows": [] }
            ]
        })
    );
}

#[tokio::test]
async fn missing_optional_relation_is_null() {
    let (schema, _client) = setup().await;
    let result = data(
        &schema,
        r#"{ findUniqueUser(where: { email: "bob@example.com" }) { name Team { name } } }"#,
    )
    .await;
    assert_eq!(result, json!({ "findUniqueUser": { "name": "Bob", "Team": null } }));
}

#[tokio::test]
async fn unique_lookup_miss_is_null() {
    let (schema, _client) = setup().await;
    let result = data(
        &schema,
        r#"{
            findUniqueUser(where: { email: "nobody@example.com" }) { name }
            findFirstTeam(where: { name: "Green" }) { id name }
        }"#,
    )
    .await;
    assert_eq!(result, json!({ "findUniqueUser": null, "findFirstTeam": null }));
}

#[tokio::test]
async fn compound_key_traversal_reaches_the_user() {
    let (schema, _client) = setup().await;
    let result = data(
        &schema,
        "{ findManyLeaderboardRow(where: { leaderboardId: 2 }) { rating User { name Team { name } } } }",
    )
    .await;
    assert_eq!(
        result,
        json!({
            "findManyLeaderboardRow": [
                { "rating": 900, "User": { "name": "Alice", "Team": { "name": "Red" } } }
            ]
        })
    );
}

#[tokio::test]
async fn aggregate_and_group_by_follow_the_selection() {
    let (schema, _client) = setup().await;
    let result = data(
        &schema,
        r#"{
            aggregateLeaderboardRow(where: { userId: 1 }) {
                _count { _all }
                _max { rating }
                _min { rating }
            }
            groupByUser(by: ["teamId"], orderBy: { teamId: asc }) {
                teamId
                _count { _all }
            }
        }"#,
    )
    .await;

    assert_eq!(
        result["aggregateLeaderboardRow"],
        json!({ "_count": { "_all": 2 }, "_max": { "rating": 1200 }, "_min": { "rating": 900 } })
    );
    let groups = result["groupByUser"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups.contains(&json!({ "teamId": "t1", "_count": { "_all": 1 } })));
    assert!(groups.contains(&json!({ "teamId": null, "_count": { "_all": 1 } })));
}

#[tokio::test]
async fn or_throw_reports_the_missing_record() {
    let (schema, _client) = setup().await;
    let response = schema
        .execute(Request::new(
            "{ findUniqueTeamOrThrow(where: { id: \"nope\" }) { name } }",
        ))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "No Team found");
    let error = serde_json::to_value(&response.errors[0]).unwrap();
    assert_eq!(error["extensions"]["code"], "P2025");
}

#[tokio::test]
async fn raw_sql_is_rejected_by_the_in_memory_client() {
    let (schema, _client) = setup().await;
    let response = schema
        .execute(Request::new(r#"mutation { queryRaw(query: "SELECT 1") }"#))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Operation not supported: queryRaw");
}
