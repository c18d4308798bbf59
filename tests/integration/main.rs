//! Integration tests for budgetsync
//!
//! These tests run the service against a real HTTP budget server and a
//! file-backed local store.

use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use budgetsync_core::{BudgetSnapshot, FileStore, STORE_DIR};
use budgetsync_remote::{GatewayConfig, HttpGateway};
use budgetsync_service::{BudgetService, ChangeOrigin, ReadSource};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Stand-in for the Flask budget API.
#[derive(Clone)]
struct BudgetApi {
    budget: Arc<Mutex<Value>>,
    down: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl BudgetApi {
    fn new(budget: Value) -> Self {
        Self {
            budget: Arc::new(Mutex::new(budget)),
            down: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

async fn current_budget(State(api): State<BudgetApi>) -> Result<Json<Value>, StatusCode> {
    if api.down.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    api.reads.fetch_add(1, Ordering::SeqCst);
    Ok(Json(api.budget.lock().unwrap().clone()))
}

async fn update_file(State(api): State<BudgetApi>, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if api.down.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    *api.budget.lock().unwrap() = body;
    Ok(Json(json!({ "success": true, "message": "Budget file updated" })))
}

async fn reset(State(api): State<BudgetApi>) -> Result<Json<Value>, StatusCode> {
    if api.down.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    *api.budget.lock().unwrap() = json!({});
    Ok(Json(json!({ "success": true })))
}

async fn serve(api: BudgetApi) -> String {
    let router = Router::new()
        .route("/api/current_budget", get(current_budget))
        .route("/api/update-file", post(update_file))
        .route("/api/reset", post(reset))
        .with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn questionnaire_response() -> Value {
    json!({
        "budget_plan": {
            "Books & Media": 1000,
            "Electronics & Accessories": 1500,
            "Fashion & Clothing": 1200,
            "Home & Kitchen": 1800,
            "Food & Beverages": 2500,
            "Travel & Entertainment": 2000,
            "total_budget": 10000,
            "recommendations": ["Review and adjust your budget monthly based on actual spending."]
        },
        "questionnaire_answers": { "monthly_budget": "10000" }
    })
}

fn service(endpoints: Vec<String>, store_dir: &TempDir) -> BudgetService {
    let config = GatewayConfig::new(endpoints)
        .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
    BudgetService::new(
        Arc::new(HttpGateway::new(config)),
        Arc::new(FileStore::new(store_dir.path().join(STORE_DIR))),
        Duration::from_secs(60),
        Duration::from_secs(30),
    )
}

/// Test a text command end to end against the HTTP API
#[tokio::test]
async fn test_text_command_round_trip() {
    let api = BudgetApi::new(questionnaire_response());
    let base = serve(api.clone()).await;
    let store = TempDir::new().unwrap();
    let service = service(vec![base], &store);

    let outcome = service
        .process_text_command("increase electronics by 500 and reduce travel by 1000")
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.applied.len(), 2);

    let server = api.budget.lock().unwrap().clone();
    assert_eq!(server["budget_plan"]["Electronics & Accessories"], json!(2000.0));
    assert_eq!(server["budget_plan"]["Travel & Entertainment"], json!(1000.0));
    assert_eq!(server["budget_plan"]["total_budget"], json!(9500.0));
    assert_eq!(server["questionnaire_answers"]["monthly_budget"], json!("10000"));

    let snapshot = service.get_budget(false).await;
    assert_eq!(snapshot.total, snapshot.category_sum());
    assert_eq!(snapshot.recommendations.len(), 1);
}

/// Test that reads within the TTL reach the server once
#[tokio::test]
async fn test_cached_reads_issue_one_request() {
    let api = BudgetApi::new(questionnaire_response());
    let base = serve(api.clone()).await;
    let store = TempDir::new().unwrap();
    let service = service(vec![base], &store);

    service.get_budget(false).await;
    service.get_budget(false).await;
    assert_eq!(api.reads(), 1);

    service.get_budget(true).await;
    assert_eq!(api.reads(), 2);
}

/// Test the remote → local → empty fallback chain across restarts
#[tokio::test]
async fn test_offline_reads_use_persisted_mirror() {
    let api = BudgetApi::new(json!({ "Food": 2000, "Travel": 1000 }));
    let base = serve(api.clone()).await;
    let store = TempDir::new().unwrap();

    let online = service(vec![base.clone()], &store);
    assert_eq!(online.read_budget(false).await.source, ReadSource::Remote);

    api.set_down(true);
    let restarted = service(vec![base], &store);
    let read = restarted.read_budget(false).await;
    assert_eq!(read.source, ReadSource::Local);
    assert_eq!(read.snapshot.amount("Food"), Some(2000.0));
    assert_eq!(read.snapshot.total, 3000.0);

    let fresh_store = TempDir::new().unwrap();
    let nothing = service(vec!["http://127.0.0.1:9/api".to_string()], &fresh_store);
    assert_eq!(nothing.get_budget(false).await, BudgetSnapshot::empty());
}

/// Test that a failing first endpoint falls through to the second
#[tokio::test]
async fn test_second_endpoint_serves_when_first_is_down() {
    let primary = BudgetApi::new(json!({ "Food": 1 }));
    primary.set_down(true);
    let secondary = BudgetApi::new(json!({ "budget_plan": { "Food": 2 } }));
    let store = TempDir::new().unwrap();
    let service = service(vec![serve(primary).await, serve(secondary.clone()).await], &store);

    let outcome = service.process_text_command("set food to 0").await;
    assert!(outcome.success);
    assert_eq!(outcome.snapshot.unwrap().amount("Food"), Some(0.0));
    assert_eq!(secondary.budget.lock().unwrap()["budget_plan"]["Food"], json!(0.0));
}

/// Test that an offline write is reported and leaves the mirror alone
#[tokio::test]
async fn test_offline_write_is_not_silent() {
    let api = BudgetApi::new(json!({ "Food": 2000 }));
    let base = serve(api.clone()).await;
    let store = TempDir::new().unwrap();
    let service = service(vec![base], &store);
    service.get_budget(false).await;

    api.set_down(true);
    let outcome = service.process_text_command("increase food by 500").await;
    assert!(!outcome.success);

    let read = service.read_budget(true).await;
    assert_eq!(read.source, ReadSource::Local);
    assert_eq!(read.snapshot.amount("Food"), Some(2000.0));
}

/// Test that reset clears the server and the local mirror
#[tokio::test]
async fn test_reset_round_trip() {
    let api = BudgetApi::new(questionnaire_response());
    let base = serve(api.clone()).await;
    let store = TempDir::new().unwrap();
    let service = service(vec![base], &store);
    let mut events = service.subscribe();

    service.get_budget(false).await;
    assert!(store.path().join(STORE_DIR).join("budget_plan.json").exists());

    assert!(service.reset_budget().await.is_empty());
    assert!(!store.path().join(STORE_DIR).join("budget_plan.json").exists());
    assert_eq!(*api.budget.lock().unwrap(), json!({}));
    assert_eq!(events.recv().await.unwrap().origin, ChangeOrigin::Local);
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_budgetsync"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("budgetsync"));
    assert!(stdout.contains("say"));
}

/// Test the CLI against the in-memory gateway
#[test]
fn test_cli_show_with_memory_gateway() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_budgetsync"))
        .args(["show", "--json"])
        .current_dir(dir.path())
        .env("BUDGETSYNC_GATEWAY", "memory")
        .env("BUDGETSYNC_STORE_DIR", dir.path().join("store"))
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let read: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(read["source"], json!("remote"));
    assert_eq!(read["snapshot"]["total"], json!(0.0));
    assert!(dir.path().join("store").join("budget_plan.json").exists());
}

/// Test that an unmatched instruction exits non-zero with suggestions
#[test]
fn test_cli_say_unmatched() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_budgetsync"))
        .args(["say", "allocate", "3000", "for", "Books"])
        .current_dir(dir.path())
        .env("BUDGETSYNC_GATEWAY", "memory")
        .env("BUDGETSYNC_STORE_DIR", dir.path().join("store"))
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Could not understand"));
    assert!(stdout.contains("Allocate 3000 for Books"));
}
