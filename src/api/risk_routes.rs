//! Risk register routes beyond plain CRUD.
//!
//! GET  /api/risks/metrics                           severity/status rollup
//! GET  /api/risks/:id/assessments                   assessments of one risk, with bands
//! GET  /api/risks/:id/treatments                    treatments of one risk
//! POST /api/risks/:id/treatments                    create a treatment for the risk
//! GET|PUT|PATCH|DELETE /api/risks/:id/treatments/:treatment_id
//! GET  /api/risk-levels?impact=..&likelihood=..     classify one pair, or the full matrix

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::Value;

use grc_types::{Entity, Impact, Likelihood, RiskAssessmentView, RiskMetrics, RiskTreatment};

use super::error::AppError;
use crate::error::{FieldErrors, GrcError};
use crate::scoring;
use crate::service::{GrcService, ListParams};

pub fn risk_routes(router: Router) -> Router {
    router
        .route("/api/risks/metrics", get(metrics))
        .route("/api/risks/:id/assessments", get(assessments))
        .route(
            "/api/risks/:id/treatments",
            get(list_treatments).post(create_treatment),
        )
        .route(
            "/api/risks/:id/treatments/:treatment_id",
            get(get_treatment)
                .put(replace_treatment)
                .patch(patch_treatment)
                .delete(delete_treatment),
        )
        .route("/api/risk-levels", get(risk_levels))
}

async fn metrics(
    Extension(service): Extension<Arc<GrcService>>,
) -> Result<Json<RiskMetrics>, AppError> {
    Ok(Json(service.risk_metrics().await?))
}

async fn assessments(
    Extension(service): Extension<Arc<GrcService>>,
    Path(risk_id): Path<i64>,
) -> Result<Json<Vec<RiskAssessmentView>>, AppError> {
    Ok(Json(service.risk_assessments(risk_id).await?))
}

async fn list_treatments(
    Extension(service): Extension<Arc<GrcService>>,
    Path(risk_id): Path<i64>,
    Query(pairs): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<Entity<RiskTreatment>>>, AppError> {
    let params = ListParams::from_query(pairs)?;
    Ok(Json(service.risk_treatments(risk_id, &params).await?))
}

async fn create_treatment(
    Extension(service): Extension<Arc<GrcService>>,
    Path(risk_id): Path<i64>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Entity<RiskTreatment>>), AppError> {
    let Json(input) = body?;
    let created = service.create_treatment(risk_id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_treatment(
    Extension(service): Extension<Arc<GrcService>>,
    Path((risk_id, id)): Path<(i64, i64)>,
) -> Result<Json<Entity<RiskTreatment>>, AppError> {
    Ok(Json(service.treatment(risk_id, id).await?))
}

async fn replace_treatment(
    Extension(service): Extension<Arc<GrcService>>,
    Path((risk_id, id)): Path<(i64, i64)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entity<RiskTreatment>>, AppError> {
    let Json(input) = body?;
    Ok(Json(service.update_treatment(risk_id, id, input, false).await?))
}

async fn patch_treatment(
    Extension(service): Extension<Arc<GrcService>>,
    Path((risk_id, id)): Path<(i64, i64)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entity<RiskTreatment>>, AppError> {
    let Json(input) = body?;
    Ok(Json(service.update_treatment(risk_id, id, input, true).await?))
}

async fn delete_treatment(
    Extension(service): Extension<Arc<GrcService>>,
    Path((risk_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    service.delete_treatment(risk_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RiskLevelQuery {
    pub impact: Option<String>,
    pub likelihood: Option<String>,
}

/// One classification when both codes are given, the whole matrix when
/// neither is.
async fn risk_levels(Query(query): Query<RiskLevelQuery>) -> Result<Json<Value>, AppError> {
    match (query.impact.as_deref(), query.likelihood.as_deref()) {
        (None, None) => Ok(Json(serde_json::to_value(scoring::matrix()).map_err(GrcError::from)?)),
        (Some(impact), Some(likelihood)) => {
            let impact = Impact::parse(impact).map_err(GrcError::from)?;
            let likelihood = Likelihood::parse(likelihood).map_err(GrcError::from)?;
            let score = scoring::assess(impact, likelihood);
            Ok(Json(serde_json::to_value(score).map_err(GrcError::from)?))
        }
        (impact, _) => {
            let missing = if impact.is_none() { "impact" } else { "likelihood" };
            let mut errors = FieldErrors::default();
            errors.add(missing, "This field is required.");
            Err(GrcError::Validation(errors).into())
        }
    }
}
