//! Evidence attachment upload and download.
//!
//! PUT /api/evidence/:id/attachment?filename=..         raw body upload
//! GET /api/evidence/:id/attachment                     stored bytes
//!
//! Same pair under `/api/audit-evidence`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use super::error::AppError;
use crate::record::Record;
use crate::service::GrcService;

pub fn attachment_routes<R: Record>(router: Router, path: &str) -> Router {
    router.route(
        &format!("{path}/:id/attachment"),
        get(download::<R>).put(upload::<R>),
    )
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub filename: String,
}

async fn upload<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<R::View>, AppError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let entity = service
        .attach_file::<R>(id, &query.filename, content_type, &body)
        .await?;
    Ok(Json(R::view(entity)))
}

async fn download<R: Record>(
    Extension(service): Extension<Arc<GrcService>>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let (attachment, content) = service.fetch_attachment::<R>(id).await?;
    let disposition = format!("attachment; filename=\"{}\"", attachment.filename);
    Ok((
        [
            (CONTENT_TYPE, attachment.content_type),
            (CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}
