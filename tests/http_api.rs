//! HTTP-level tests for the GRC REST API.
//!
//! Drives the router in-process with `oneshot` against the in-memory store and
//! a temporary media directory.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use grc_tracker::api::{build_router, with_middleware};
use grc_tracker::blob_store::LocalBlobStore;
use grc_tracker::store::MemoryStore;
use grc_tracker::{GrcService, Schema};

// ── Test app builder ───────────────────────────────────────────

const BODY_LIMIT: usize = 64 * 1024;

struct TestApp {
    router: Router,
    _media: TempDir,
}

fn build_test_app() -> TestApp {
    let media = TempDir::new().unwrap();
    let schema = Arc::new(Schema::grc());
    let service = GrcService::new(
        Arc::new(MemoryStore::new(schema.clone())),
        schema,
        Arc::new(LocalBlobStore::new(media.path())),
    );
    TestApp {
        router: with_middleware(build_router(Arc::new(service)), BODY_LIMIT),
        _media: media,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        (status, body_json(resp).await)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> Value {
        let (status, json) = self.send("POST", uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri} failed: {json}");
        json
    }

    async fn user(&self, name: &str) -> i64 {
        let json = self
            .post("/api/users", json!({"username": name, "email": format!("{name}@example.com")}))
            .await;
        json["id"].as_i64().unwrap()
    }

    async fn risk(&self, title: &str, severity: &str, status: &str) -> i64 {
        let json = self
            .post(
                "/api/risks",
                json!({"title": title, "description": "d", "category": "IT",
                       "severity": severity, "status": status}),
            )
            .await;
        json["id"].as_i64().unwrap()
    }
}

// ── Helper to read response body ───────────────────────────────

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }))
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = build_test_app();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_assessment_read_carries_risk_level() {
    let app = build_test_app();
    let alice = app.user("alice").await;
    let risk = app.risk("Ransomware", "HIGH", "OPEN").await;

    let created = app
        .post(
            "/api/risk-assessments",
            json!({"risk": risk, "impact": "HIGH", "likelihood": "CERTAIN",
                   "mitigation_plan": "Offline backups", "created_by": alice}),
        )
        .await;
    assert_eq!(created["risk_level"], "CRITICAL");
    assert_eq!(created["risk_score"], 15);
    assert_eq!(created["status"], "OPEN");

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = app.get(&format!("/api/risk-assessments/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["risk_level"], "CRITICAL");

    // re-rating changes the band on the next read
    let (status, patched) = app
        .send(
            "PATCH",
            &format!("/api/risk-assessments/{id}"),
            Some(json!({"likelihood": "RARE"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["risk_level"], "LOW");
    assert_eq!(patched["risk_score"], 3);
}

#[tokio::test]
async fn test_unknown_impact_is_field_error() {
    let app = build_test_app();
    let alice = app.user("alice").await;
    let risk = app.risk("Ransomware", "HIGH", "OPEN").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/risk-assessments",
            Some(json!({"risk": risk, "impact": "EXTREME", "likelihood": "RARE",
                        "mitigation_plan": "n/a", "created_by": alice})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["impact"][0], "\"EXTREME\" is not a valid choice.");
}

#[tokio::test]
async fn test_risk_levels_endpoint() {
    let app = build_test_app();

    let (status, body) = app.get("/api/risk-levels?impact=MEDIUM&likelihood=POSSIBLE").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 6);
    assert_eq!(body["level"], "MEDIUM");

    let (status, matrix) = app.get("/api/risk-levels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matrix.as_array().unwrap().len(), 20);

    let (status, body) = app.get("/api/risk-levels?impact=EXTREME&likelihood=RARE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("EXTREME"));

    let (status, body) = app.get("/api/risk-levels?impact=LOW").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["likelihood"].is_array());
}

#[tokio::test]
async fn test_delete_risk_cascades_to_assessments() {
    let app = build_test_app();
    let alice = app.user("alice").await;
    let risk = app.risk("Ransomware", "HIGH", "OPEN").await;
    let other = app.risk("Flood", "LOW", "OPEN").await;

    for r in [risk, risk, other] {
        app.post(
            "/api/risk-assessments",
            json!({"risk": r, "impact": "LOW", "likelihood": "RARE",
                   "mitigation_plan": "n/a", "created_by": alice}),
        )
        .await;
    }

    let (status, _) = app.send("DELETE", &format!("/api/risks/{risk}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, remaining) = app.get("/api/risk-assessments").await;
    let remaining = remaining.as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["risk"], other);

    let (status, _) = app.get(&format!("/api/risks/{risk}/assessments")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_assignee_clears_reference() {
    let app = build_test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let risk = app.risk("Ransomware", "HIGH", "OPEN").await;
    let assessment = app
        .post(
            "/api/risk-assessments",
            json!({"risk": risk, "impact": "LOW", "likelihood": "RARE",
                   "mitigation_plan": "n/a", "assigned_to": bob, "created_by": alice}),
        )
        .await;
    let id = assessment["id"].as_i64().unwrap();

    let (status, _) = app.send("DELETE", &format!("/api/users/{bob}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, kept) = app.get(&format!("/api/risk-assessments/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["assigned_to"], Value::Null);
}

#[tokio::test]
async fn test_risk_metrics() {
    let app = build_test_app();
    app.risk("A", "CRITICAL", "OPEN").await;
    app.risk("B", "HIGH", "OPEN").await;
    app.risk("C", "HIGH", "CLOSED").await;
    app.risk("D", "LOW", "MITIGATED").await;
    let newest = app.risk("E", "MEDIUM", "ACCEPTED").await;

    let (status, m) = app.get("/api/risks/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(m["total"], 5);
    assert_eq!(m["critical"], 1);
    assert_eq!(m["high"], 2);
    assert_eq!(m["medium"], 1);
    assert_eq!(m["low"], 1);
    assert_eq!(m["open_risks"], 2);
    assert_eq!(m["closed_risks"], 1);
    assert_eq!(m["status_counts"]["mitigated"], 1);
    assert_eq!(m["status_counts"]["transferred"], 0);

    let recent = m["recent_risks"].as_array().unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0]["id"], newest);
    assert_eq!(recent[0]["severity"], "MEDIUM");
}

#[tokio::test]
async fn test_nested_treatments() {
    let app = build_test_app();
    let risk = app.risk("Vendor failure", "HIGH", "OPEN").await;
    let other = app.risk("Flood", "LOW", "OPEN").await;

    let created = app
        .post(
            &format!("/api/risks/{risk}/treatments"),
            json!({"title": "Second supplier", "strategy": "MITIGATE"}),
        )
        .await;
    assert_eq!(created["risk"], risk);
    assert_eq!(created["strategy"], "MITIGATE");
    assert_eq!(created["status"], "PLANNED");
    let id = created["id"].as_i64().unwrap();

    let (status, listed) = app.get(&format!("/api/risks/{risk}/treatments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = app.get(&format!("/api/risks/{other}/treatments/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, patched) = app
        .send(
            "PATCH",
            &format!("/api/risks/{risk}/treatments/{id}"),
            Some(json!({"status": "IN_PROGRESS"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], "IN_PROGRESS");

    let (status, _) = app
        .send("DELETE", &format!("/api/risks/{risk}/treatments/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/risks/999/treatments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_errors_are_per_field() {
    let app = build_test_app();
    let lead = app.user("lead").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/audits",
            Some(json!({"title": "Q3 access review", "description": "Quarterly",
                        "audit_type": "INTERNAL", "start_date": "2024-07-10",
                        "end_date": "2024-07-01", "lead_auditor": lead,
                        "auditors": [lead, 404], "created_by": lead})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["auditors"][0],
        "invalid pk \"404\" - object does not exist."
    );

    let (status, body) = app
        .send(
            "POST",
            "/api/audits",
            Some(json!({"title": "Q3 access review", "description": "Quarterly",
                        "audit_type": "INTERNAL", "start_date": "2024-07-10",
                        "end_date": "2024-07-01", "lead_auditor": lead, "created_by": lead})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["end_date"].is_array());

    let (status, body) = app.send("POST", "/api/risks", Some(json!(["not", "an", "object"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = build_test_app();
    app.user("alice").await;
    let (status, _) = app
        .send(
            "POST",
            "/api/users",
            Some(json!({"username": "alice", "email": "again@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_search_and_filters() {
    let app = build_test_app();
    app.risk("Phishing campaign", "HIGH", "OPEN").await;
    app.risk("Laptop theft", "LOW", "OPEN").await;
    app.risk("Spear phishing", "HIGH", "CLOSED").await;

    let (_, found) = app.get("/api/risks?search=phish").await;
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (_, found) = app.get("/api/risks?severity=HIGH&status=OPEN").await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Phishing campaign");

    let (_, page) = app.get("/api/risks?limit=1&offset=1").await;
    assert_eq!(page[0]["title"], "Laptop theft");

    let (status, body) = app.get("/api/risks?owner=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["owner"].is_array());
}

#[tokio::test]
async fn test_missing_record_is_404() {
    let app = build_test_app();
    let (status, body) = app.get("/api/projects/12").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "project 12 not found");
}

#[tokio::test]
async fn test_project_delete_cascades_tasks_and_milestones() {
    let app = build_test_app();
    let pm = app.user("pm").await;
    let project = app
        .post(
            "/api/projects",
            json!({"title": "ISO certification", "start_date": "2024-01-01", "project_manager": pm}),
        )
        .await;
    let project_id = project["id"].as_i64().unwrap();
    assert_eq!(project["status"], "PLANNING");

    let task = app
        .post(
            "/api/tasks",
            json!({"project": project_id, "title": "Gap analysis", "assigned_to": pm}),
        )
        .await;
    assert_eq!(task["priority"], "MEDIUM");
    assert_eq!(task["status"], "TODO");
    app.post(
        "/api/milestones",
        json!({"project": project_id, "title": "Stage 1 audit", "due_date": "2024-06-30"}),
    )
    .await;

    let (status, _) = app.send("DELETE", &format!("/api/users/{pm}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, kept) = app.get(&format!("/api/projects/{project_id}")).await;
    assert_eq!(kept["project_manager"], Value::Null);

    let (status, _) = app.send("DELETE", &format!("/api/projects/{project_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, tasks) = app.get("/api/tasks").await;
    let (_, milestones) = app.get("/api/milestones").await;
    assert!(tasks.as_array().unwrap().is_empty());
    assert!(milestones.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_evidence_attachment_round_trip() {
    let app = build_test_app();
    let alice = app.user("alice").await;
    let framework = app
        .post("/api/frameworks", json!({"name": "ISO 27001", "description": "ISMS", "version": "2022"}))
        .await;
    let control = app
        .post(
            "/api/controls",
            json!({"framework": framework["id"], "identifier": "A.8.13",
                   "title": "Information backup", "description": "Backups are tested"}),
        )
        .await;
    let evidence = app
        .post(
            "/api/evidence",
            json!({"control": control["id"], "title": "Restore test", "description": "Q2",
                   "created_by": alice}),
        )
        .await;
    assert_eq!(evidence["attachment"], Value::Null);
    let id = evidence["id"].as_i64().unwrap();

    let upload = Request::builder()
        .method("PUT")
        .uri(format!("/api/evidence/{id}/attachment?filename=restore-log.txt"))
        .header("content-type", "text/plain")
        .body(Body::from("restore ok"))
        .unwrap();
    let resp = app.router.clone().oneshot(upload).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["attachment"]["filename"], "restore-log.txt");
    assert_eq!(updated["attachment"]["size"], 10);
    assert_eq!(updated["attachment"]["content_type"], "text/plain");

    let download = Request::builder()
        .uri(format!("/api/evidence/{id}/attachment"))
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(download).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"restore ok");

    let (status, _) = app.get("/api/audit-evidence/1/attachment").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lower_case_code_is_rejected() {
    let app = build_test_app();
    let (status, body) = app
        .send(
            "POST",
            "/api/risks",
            Some(json!({"title": "Flood", "description": "d", "category": "Facilities",
                        "severity": "high"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["severity"][0], "\"high\" is not a valid choice.");

    let (status, _) = app.get("/api/risk-levels?impact=low&likelihood=rare").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = build_test_app();
    let upload = Request::builder()
        .method("PUT")
        .uri("/api/evidence/1/attachment?filename=dump.bin")
        .header("content-type", "application/octet-stream")
        .body(Body::from(vec![0u8; BODY_LIMIT + 1]))
        .unwrap();
    let resp = app.router.clone().oneshot(upload).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = build_test_app();
    let req = Request::builder()
        .uri("/health")
        .header("origin", "https://dashboard.example.com")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
