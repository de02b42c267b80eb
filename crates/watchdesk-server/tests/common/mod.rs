#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use watchdesk_common::types::{
    Host, HostGroup, Problem, ProblemTag, ProblemUpdate, Severity, Trigger, UpdateFlags, User,
};
use watchdesk_server::app;
use watchdesk_server::config::ServerConfig;
use watchdesk_server::state::AppState;
use watchdesk_storage::sqlite::SqliteStore;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub app: axum::Router,
}

/// Builds an app over a seeded store:
///
/// - group `g1` "Databases": host `h1`, host `h3` (in maintenance)
/// - group `g2` "Web": host `h2`
/// - problems `9001` (high, h1), `9002` (warning, h2, acknowledged by
///   alice), `9003` (average, h3, updated by a deleted user)
pub fn build_test_context() -> Result<TestContext> {
    watchdesk_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::new(&temp_dir.path().join("watchdesk.db"))?);

    store.insert_group(&HostGroup {
        id: "g1".into(),
        name: "Databases".into(),
    })?;
    store.insert_group(&HostGroup {
        id: "g2".into(),
        name: "Web".into(),
    })?;
    store.insert_host(&Host {
        id: "h1".into(),
        name: "db-01".into(),
        group_ids: vec!["g1".into()],
        in_maintenance: false,
    })?;
    store.insert_host(&Host {
        id: "h2".into(),
        name: "web-01".into(),
        group_ids: vec!["g2".into()],
        in_maintenance: false,
    })?;
    store.insert_host(&Host {
        id: "h3".into(),
        name: "db-02".into(),
        group_ids: vec!["g1".into()],
        in_maintenance: true,
    })?;
    store.insert_trigger(&Trigger {
        id: "t1".into(),
        severity: Severity::High,
        host_ids: vec!["h1".into()],
        enabled: true,
    })?;
    store.insert_trigger(&Trigger {
        id: "t2".into(),
        severity: Severity::Warning,
        host_ids: vec!["h2".into()],
        enabled: true,
    })?;
    store.insert_trigger(&Trigger {
        id: "t3".into(),
        severity: Severity::Average,
        host_ids: vec!["h3".into()],
        enabled: true,
    })?;
    store.insert_user(&User {
        id: "u1".into(),
        name: "alice".into(),
    })?;

    store.insert_problem(&problem(
        "9001",
        "t1",
        "MySQL is down",
        Severity::High,
        false,
        vec![ProblemTag::new("service", "mysql")],
    ))?;
    store.insert_problem(&problem(
        "9002",
        "t2",
        "HTTP latency is high",
        Severity::Warning,
        true,
        vec![],
    ))?;
    store.insert_problem(&problem(
        "9003",
        "t3",
        "Disk space low",
        Severity::Average,
        false,
        vec![],
    ))?;

    store.add_update(&ProblemUpdate {
        id: "up1".into(),
        problem_id: "9002".into(),
        user_id: "u1".into(),
        message: Some("on it".into()),
        flags: UpdateFlags::ACKNOWLEDGE | UpdateFlags::MESSAGE,
        clock: Utc::now(),
    })?;
    // Update by a user that no longer exists; the actor degrades to a
    // placeholder instead of failing the request.
    store.add_update(&ProblemUpdate {
        id: "up2".into(),
        problem_id: "9003".into(),
        user_id: "ghost".into(),
        message: None,
        flags: UpdateFlags::MESSAGE,
        clock: Utc::now(),
    })?;

    let app = app::build_http_app(AppState::new(store.clone(), ServerConfig::default()));

    Ok(TestContext {
        temp_dir,
        store,
        app,
    })
}

fn problem(
    id: &str,
    trigger_id: &str,
    name: &str,
    severity: Severity,
    acknowledged: bool,
    tags: Vec<ProblemTag>,
) -> Problem {
    Problem {
        id: id.to_string(),
        trigger_id: trigger_id.to_string(),
        name: name.to_string(),
        severity,
        clock: Utc::now() - Duration::minutes(5),
        recovery: None,
        acknowledged,
        tags,
        updates: Vec::new(),
    }
}

pub async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json["data"].is_null());
}

pub fn item_ids(json: &Value, pointer: &str) -> Vec<String> {
    json.pointer(pointer)
        .and_then(Value::as_array)
        .expect("array should exist")
        .iter()
        .map(|item| {
            item["id"]
                .as_str()
                .expect("id should be a string")
                .to_string()
        })
        .collect()
}
