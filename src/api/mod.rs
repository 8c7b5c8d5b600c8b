//! REST API.
//!
//! Every resource gets the generic CRUD routes; risks add their nested
//! treatment routes, assessment listing and metrics, and the two evidence
//! tables add attachment upload/download.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use grc_types::{
    Audit, AuditEvidence, AuditFinding, Control, Evidence, Framework, Milestone, Project, Risk,
    RiskAssessment, Task, User,
};

use crate::service::GrcService;

pub mod attachment_routes;
pub mod crud;
pub mod error;
pub mod risk_routes;

pub use error::AppError;

/// Build the full router, without serving middleware.
pub fn build_router(service: Arc<GrcService>) -> Router {
    let router = Router::new().route("/health", get(health));

    let router = risk_routes::risk_routes(router);

    let router = crud::crud_routes::<User>(router, "/api/users");
    let router = crud::crud_routes::<Framework>(router, "/api/frameworks");
    let router = crud::crud_routes::<Control>(router, "/api/controls");
    let router = crud::crud_routes::<Evidence>(router, "/api/evidence");
    let router = crud::crud_routes::<Audit>(router, "/api/audits");
    let router = crud::crud_routes::<AuditFinding>(router, "/api/findings");
    let router = crud::crud_routes::<AuditEvidence>(router, "/api/audit-evidence");
    let router = crud::crud_routes::<Risk>(router, "/api/risks");
    let router = crud::crud_routes::<RiskAssessment>(router, "/api/risk-assessments");
    let router = crud::crud_routes::<Project>(router, "/api/projects");
    let router = crud::crud_routes::<Task>(router, "/api/tasks");
    let router = crud::crud_routes::<Milestone>(router, "/api/milestones");

    let router = attachment_routes::attachment_routes::<Evidence>(router, "/api/evidence");
    let router =
        attachment_routes::attachment_routes::<AuditEvidence>(router, "/api/audit-evidence");

    router.layer(Extension(service))
}

/// Request tracing, permissive CORS and a cap on request bodies.
pub fn with_middleware(router: Router, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(DefaultBodyLimit::max(max_body_bytes)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
