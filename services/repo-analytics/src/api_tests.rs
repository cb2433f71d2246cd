// Router tests: the app is served on an ephemeral port and driven over HTTP.

use crate::analytics::Analyzer;
use crate::api::{build_router, AppState, ANALYTICS_SOURCE_HEADER};
use crate::config::EngineConfig;
use crate::store::{InMemoryStore, NewTeam, Store};
use crate::tests::commit_file;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const FRONTEND: &str = "http://localhost:3000";

struct TestServer {
    base: String,
    store: Arc<InMemoryStore>,
    client: reqwest::Client,
}

async fn start_server(workspace_root: &Path) -> TestServer {
    start_server_with_timeout(workspace_root, Duration::from_secs(30)).await
}

async fn start_server_with_timeout(workspace_root: &Path, clone_timeout: Duration) -> TestServer {
    let store = Arc::new(InMemoryStore::with_demo_teams());
    let engine = EngineConfig {
        workspace_root: workspace_root.to_path_buf(),
        clone_timeout,
        ..EngineConfig::default()
    };
    let app = build_router(AppState {
        analyzer: Arc::new(Analyzer::new(&engine)),
        store: store.clone(),
        cors_origin: Arc::from(FRONTEND),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });

    TestServer {
        base: format!("http://{}", addr),
        store,
        client: reqwest::Client::new(),
    }
}

fn local_repository(dir: &Path) {
    let repo = git2::Repository::init(dir).unwrap();
    let now = Utc::now().timestamp();
    commit_file(&repo, "main.rs", "fn main() {}\n", "alice@x.com", now - 120);
    commit_file(&repo, "lib.rs", "pub fn lib() {}\n", "bob", now - 60);
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server.client.get(format!("{}/health", server.base)).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_analytics_requires_repo() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server.client.get(format!("{}/api/analytics", server.base)).send().await.unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "missing_parameter");
}

#[tokio::test]
async fn test_analytics_rejects_non_positive_days() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server
        .client
        .get(format!("{}/api/analytics", server.base))
        .query(&[("repo", "https://example.invalid/repo.git"), ("days", "0")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_parameter");
}

#[tokio::test]
async fn test_analytics_clone_failure_is_bad_gateway() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server
        .client
        .get(format!("{}/api/analytics", server.base))
        .query(&[("repo", "no/such/repository")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "fetch_error");
    assert!(body["error"].as_str().unwrap().contains("no/such/repository"));
}

#[tokio::test]
async fn test_analytics_rejects_days_beyond_range() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server
        .client
        .get(format!("{}/api/analytics", server.base))
        .query(&[("repo", "https://example.invalid/repo.git"), ("days", "5000000000")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_parameter");
    assert!(body["error"].as_str().unwrap().contains("too large"));
}

#[tokio::test]
async fn test_analytics_stalled_clone_is_gateway_timeout() {
    let stalled = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let repo = format!("http://{}/org/repo.git", stalled.local_addr().unwrap());
    let root = tempfile::tempdir().unwrap();
    let server = start_server_with_timeout(root.path(), Duration::from_secs(1)).await;

    let resp = server
        .client
        .get(format!("{}/api/analytics", server.base))
        .query(&[("repo", repo.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 504);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "fetch_timeout");
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_analytics_for_local_repository() {
    let source = tempfile::tempdir().unwrap();
    local_repository(source.path());
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server
        .client
        .get(format!("{}/api/analytics", server.base))
        .query(&[("repo", source.path().to_str().unwrap())])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[ANALYTICS_SOURCE_HEADER], "live");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["totalCommits"], 2);
    assert_eq!(body["summary"]["totalContributors"], 2);
    assert_eq!(body["summary"]["activeDays"], body["timeline"].as_array().unwrap().len());
    assert_eq!(body["contributors"][0]["name"], "bob");
    assert_eq!(body["contributors"][0]["activityScore"], 2);
    assert!(body["timeline"][0]["date"].as_str().unwrap().len() == 10);
    assert!(body["timeline"][0]["commitCount"].is_u64());
}

#[tokio::test]
async fn test_team_analytics_falls_back_to_placeholder() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;
    let team = server.store.create_team(NewTeam {
        name: "Team Offline".to_string(),
        members: vec!["Ana".to_string(), "Ben".to_string()],
        leader: Some("Ana".to_string()),
        repo_url: Some("no/such/repository".to_string()),
    });

    let resp = server
        .client
        .get(format!("{}/api/teams/{}/analytics", server.base, team.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[ANALYTICS_SOURCE_HEADER], "placeholder");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["totalCommits"], 0);
    assert_eq!(body["summary"]["totalContributors"], 2);
    assert_eq!(body["contributors"][1]["name"], "Ben");
    assert_eq!(body["timeline"], json!([]));
}

#[tokio::test]
async fn test_team_analytics_uses_team_repository() {
    let source = tempfile::tempdir().unwrap();
    local_repository(source.path());
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;
    let team = server.store.create_team(NewTeam {
        name: "Team Local".to_string(),
        members: vec![],
        leader: None,
        repo_url: Some(source.path().to_str().unwrap().to_string()),
    });

    let resp = server
        .client
        .get(format!("{}/api/teams/{}/analytics", server.base, team.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.headers()[ANALYTICS_SOURCE_HEADER], "live");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["totalCommits"], 2);
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    for path in ["/api/teams/missing", "/api/teams/missing/analytics"] {
        let resp = server.client.get(format!("{}{}", server.base, path)).send().await.unwrap();
        assert_eq!(resp.status(), 404, "{}", path);
    }
}

#[tokio::test]
async fn test_team_and_task_endpoints() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let teams: Vec<Value> = server
        .client
        .get(format!("{}/api/teams", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(teams.len(), 3);

    let created: Value = server
        .client
        .post(format!("{}/api/teams", server.base))
        .json(&json!({"name": "Team Vega", "members": ["Kim"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["id"], "team_4");

    let task: Value = server
        .client
        .post(format!("{}/api/tasks", server.base))
        .json(&json!({"title": "Write docs", "team_id": "team_4", "status": "todo"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();

    let updated: Value = server
        .client
        .put(format!("{}/api/tasks/{}", server.base, task_id))
        .json(&json!({"status": "done"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["status"], "done");
    assert_eq!(updated["title"], "Write docs");

    let filtered: Vec<Value> = server
        .client
        .get(format!("{}/api/tasks", server.base))
        .query(&[("team_id", "team_4")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);

    let missing = server
        .client
        .put(format!("{}/api/tasks/task_99", server.base))
        .json(&json!({"status": "done"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_cors_preflight_for_frontend_origin() {
    let root = tempfile::tempdir().unwrap();
    let server = start_server(root.path()).await;

    let resp = server
        .client
        .request(reqwest::Method::OPTIONS, format!("{}/api/tasks", server.base))
        .header("origin", FRONTEND)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(resp.headers()["access-control-allow-origin"], FRONTEND);

    let resp = server
        .client
        .get(format!("{}/health", server.base))
        .header("origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
