//! `/entries` handlers: paged reads, intake, batch and point updates.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use rapid_core::{BatchOutcome, BatchUpdate, Download, DownloadId, Request, UpdateDownload};

use crate::error::HttpError;
use crate::state::AppState;

/// Header naming the next page, present only when more entries follow.
pub const NEXT_PAGE_HEADER: HeaderName = HeaderName::from_static("x-next-page");

/// Query string for paged listing.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// 1-based page number; defaults to the first page.
    #[serde(default)]
    pub page: Option<u32>,
}

fn parse_id(raw: &str) -> Result<DownloadId, HttpError> {
    raw.parse::<DownloadId>().map_err(HttpError::from)
}

/// One page of downloads as an ordered `id -> download` object.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let page = state.sync.list_page(query.page.unwrap_or(1)).await?;
    let next = page.next_page;

    let mut response = Json(page.into_map()).into_response();
    if let Some(next) = next {
        response
            .headers_mut()
            .insert(NEXT_PAGE_HEADER, HeaderValue::from(next));
    }
    Ok(response)
}

/// Register a new download from a transfer request.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<Request>,
) -> Result<(StatusCode, Json<Download>), HttpError> {
    let download = state.sync.create(request).await?;
    Ok((StatusCode::CREATED, Json(download)))
}

/// Apply an order-correlated batch of patches.
///
/// `200` when every item applied, `207 Multi-Status` otherwise; the body
/// always lists one outcome per position.
pub async fn batch_update(
    State(state): State<AppState>,
    Json(batch): Json<BatchUpdate>,
) -> (StatusCode, Json<BatchOutcome>) {
    let outcome = state.sync.batch_update(batch).await;
    let status = if outcome.all_succeeded() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(outcome))
}

/// Get one download.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Download>, HttpError> {
    let id = parse_id(&id)?;
    Ok(Json(state.sync.get(&id).await?))
}

/// Apply one patch.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateDownload>,
) -> Result<Json<Download>, HttpError> {
    let id = parse_id(&id)?;
    Ok(Json(state.sync.update(&id, patch).await?))
}

/// Remove a download and discard its partial data.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let id = parse_id(&id)?;
    state.sync.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-resolve an expired or failed download with a fresh request.
pub async fn reresolve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<Request>,
) -> Result<Json<Download>, HttpError> {
    let id = parse_id(&id)?;
    Ok(Json(state.sync.reresolve(&id, request).await?))
}
