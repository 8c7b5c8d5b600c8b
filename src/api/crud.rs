//! Generic CRUD handlers.
//!
//! GET    /api/<resource>        list (`?search=`, `?<field>=`, `?limit=`, `?offset=`)
//! POST   /api/<resource>        create
//! GET    /api/<resource>/:id    retrieve
//! PUT    /api/<resource>/:id    full update
//! PATCH  /api/<resource>/:id    partial update
//! DELETE /api/<resource>/:id    delete (cascades per schema)

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::Value;

use super::error::AppError;
use crate::record::Record;
use crate::service::{GrcService, ListParams};

/// Register the six CRUD routes for `R` under `path`.
pub fn crud_routes<R: Record>(router: Router, path: &str) -> Router {
    router
        .route(path, get(list::<R>).post(create::<R>))
        .route(
            &format!("{path}/:id"),
            get(retrieve::<R>)
                .put(replace::<R>)
                .patch(patch::<R>)
                .delete(destroy::<R>),
        )
}

pub async fn list<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Query(pairs): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<R::View>>, AppError> {
    let params = ListParams::from_query(pairs)?;
    let items = service.list::<R>(&params).await?;
    Ok(Json(items.into_iter().map(R::view).collect()))
}

pub async fn create<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<R::View>), AppError> {
    let Json(input) = body?;
    let created = service.create::<R>(input).await?;
    Ok((StatusCode::CREATED, Json(R::view(created))))
}

pub async fn retrieve<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
) -> Result<Json<R::View>, AppError> {
    let entity = service.get::<R>(id).await?;
    Ok(Json(R::view(entity)))
}

pub async fn replace<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<R::View>, AppError> {
    let Json(input) = body?;
    let updated = service.update::<R>(id, input, false).await?;
    Ok(Json(R::view(updated)))
}

pub async fn patch<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<R::View>, AppError> {
    let Json(input) = body?;
    let updated = service.update::<R>(id, input, true).await?;
    Ok(Json(R::view(updated)))
}

pub async fn destroy<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service.delete::<R>(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
