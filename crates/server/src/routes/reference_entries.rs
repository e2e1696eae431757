use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::reference_entry::{
    BulkDeleteRequest, CreateReferenceEntry, ReferenceEntry, ReferenceKind,
};
use serde::Serialize;
use ts_rs::TS;
use utils::{
    pagination::{ListQuery, Paginated},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize, TS)]
pub struct BulkDeleteResult {
    pub deleted: u64,
}

fn reference_kind(collection: &str) -> Result<ReferenceKind, ApiError> {
    ReferenceKind::from_collection(collection)
        .ok_or_else(|| ApiError::NotFound(format!("Collection '{collection}'")))
}

/// GET /api/mills/{mill_id}/{collection}
///
/// `collection` is one of `parties`, `brokers`, `committees`.
pub async fn list_entries(
    State(state): State<AppState>,
    Path((mill_id, collection)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<Paginated<ReferenceEntry>>, ApiError> {
    let kind = reference_kind(&collection)?;
    let page = ReferenceEntry::list(&state.db().pool, &mill_id, kind, &query).await?;
    Ok(ResponseJson(page))
}

/// POST /api/mills/{mill_id}/{collection}
pub async fn create_entry(
    State(state): State<AppState>,
    Path((mill_id, collection)): Path<(String, String)>,
    axum::Json(payload): axum::Json<CreateReferenceEntry>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ReferenceEntry>>), ApiError> {
    let kind = reference_kind(&collection)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let entry = ReferenceEntry::create(&state.db().pool, &mill_id, kind, &payload).await?;
    tracing::info!(mill_id = %mill_id, kind = %kind, id = %entry.id, "Created reference entry");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(entry))))
}

/// DELETE /api/mills/{mill_id}/{collection}/{id}
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((mill_id, collection, id)): Path<(String, String, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let kind = reference_kind(&collection)?;
    let deleted = ReferenceEntry::delete(&state.db().pool, &mill_id, kind, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("{kind} {id}")));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/mills/{mill_id}/{collection}/bulk-delete
pub async fn bulk_delete_entries(
    State(state): State<AppState>,
    Path((mill_id, collection)): Path<(String, String)>,
    axum::Json(payload): axum::Json<BulkDeleteRequest>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteResult>>, ApiError> {
    let kind = reference_kind(&collection)?;
    if payload.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }

    let deleted =
        ReferenceEntry::bulk_delete(&state.db().pool, &mill_id, kind, &payload.ids).await?;
    tracing::info!(mill_id = %mill_id, kind = %kind, deleted, "Bulk deleted reference entries");
    Ok(ResponseJson(ApiResponse::success(BulkDeleteResult { deleted })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/mills/{mill_id}/{collection}",
            get(list_entries).post(create_entry),
        )
        .route(
            "/mills/{mill_id}/{collection}/bulk-delete",
            post(bulk_delete_entries),
        )
        .route("/mills/{mill_id}/{collection}/{id}", delete(delete_entry))
}
