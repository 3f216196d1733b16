use std::path::PathBuf;

use dataproxy_server::config::{AuthConfig, IntrospectionConfig};
use dataproxy_server::{AppConfig, bootstrap, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const API_KEY: &str = "test-key";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
}

fn config() -> AppConfig {
    AppConfig {
        auth: AuthConfig {
            api_key: Some(API_KEY.into()),
        },
        introspection: IntrospectionConfig {
            path: Some(fixture("sample_dmmf.json")),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = config();
    let schema = bootstrap::schema(&cfg).await.expect("build schema");
    let app = build_app(&cfg, schema);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn graphql(client: &reqwest::Client, url: &str, query: &str) -> reqwest::Response {
    client
        .post(url)
        .bearer_auth(API_KEY)
        // edge clients do not always send a JSON content type
        .header("content-type", "text/plain;charset=UTF-8")
        .body(json!({ "query": query }).to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn server_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let endpoint = format!("{base}/5.22.0/0123abcd/graphql");

    // GET /healthz needs no key
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Missing key
    let resp = client
        .post(&endpoint)
        .json(&json!({ "query": "{ findManyUser { id } }" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(resp.headers().contains_key("x-request-id"));

    // Create then read back through a relation, on any path
    let resp = graphql(
        &client,
        &endpoint,
        r#"mutation { createOneTeam(data: { id: "t1", name: "Red" }) { id } }"#,
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = graphql(
        &client,
        &format!("{base}/"),
        r#"mutation { createOneUser(data: { email: "a@example.com", name: "A", teamId: "t1" }) { id Team { name } } }"#,
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "data": { "createOneUser": { "id": 1, "Team": { "name": "Red" } } } })
    );

    // Errors come back in the engine envelope
    let resp = graphql(
        &client,
        &endpoint,
        "{ findUniqueUserOrThrow(where: { id: 42 }) { id } }",
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["EngineNotStarted"]["reason"]["KnownEngineStartupError"],
        json!({ "msg": "No User found", "error_code": "P5006" })
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
