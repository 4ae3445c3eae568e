//! Graduation photo memories: students submit a photo with survey answers,
//! admins approve them into the public gallery.

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use cohort_db::models::{MemoryRow, NewMemory};
use cohort_types::api::{
    Claims, CreateMemoryRequest, MemoryQuery, MemoryResponse, ReviewMemoryRequest,
};
use cohort_types::models::SubmissionStatus;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

const MAX_CAPTION_LEN: usize = 500;
const MAX_ANSWERS: usize = 20;
const MAX_ANSWER_LEN: usize = 1000;

pub async fn create_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMemoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let image_url = req.image_url.trim().to_string();
    if image_url.is_empty() {
        return Err(ApiError::bad_request("image is required"));
    }
    let caption = req.caption.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);
    if caption.as_ref().is_some_and(|c| c.chars().count() > MAX_CAPTION_LEN) {
        return Err(ApiError::bad_request("caption is too long"));
    }
    if req.answers.len() > MAX_ANSWERS
        || req.answers.values().any(|a| a.chars().count() > MAX_ANSWER_LEN)
    {
        return Err(ApiError::bad_request("too many or too long answers"));
    }
    let answers_json = serde_json::to_string(&req.answers).map_err(anyhow::Error::from)?;

    let memory_id = Uuid::new_v4();
    let author = claims.sub.to_string();
    let memory = blocking(&state, move |db| {
        let mid = memory_id.to_string();
        db.create_memory(&NewMemory {
            id: &mid,
            author_id: &author,
            image_url: &image_url,
            caption: caption.as_deref(),
            answers_json: &answers_json,
        })?;
        // Re-read through the listing query so the response carries the author.
        db.list_memories(Some(SubmissionStatus::Pending.as_str()))?
            .into_iter()
            .find(|m| m.id == mid)
            .ok_or(ApiError::NotFound("memory"))
    })
    .await?;

    info!("User {} submitted memory {}", claims.sub, memory_id);
    Ok((StatusCode::CREATED, Json(to_response(memory))))
}

/// Approved memories, newest first. Public.
pub async fn gallery(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |db| {
        Ok(db.list_memories(Some(SubmissionStatus::Approved.as_str()))?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn list_for_review(
    State(state): State<AppState>,
    Query(query): Query<MemoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status.map(|s| s.as_str());
    let rows = blocking(&state, move |db| Ok(db.list_memories(status)?)).await?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn review_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(memory_id): Path<Uuid>,
    Json(req): Json<ReviewMemoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.status == SubmissionStatus::Pending {
        return Err(ApiError::bad_request("status must be approved or rejected"));
    }

    let admin = claims.sub.to_string();
    let found = blocking(&state, move |db| {
        Ok(db.review_memory(&memory_id.to_string(), req.status.as_str(), &admin)?)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound("memory"));
    }

    info!("Admin {} marked memory {} {}", claims.sub, memory_id, req.status);
    Ok(StatusCode::NO_CONTENT)
}

fn to_response(row: MemoryRow) -> MemoryResponse {
    let answers: BTreeMap<String, String> = serde_json::from_str(&row.answers).unwrap_or_else(|e| {
        warn!("Corrupt answers on memory {}: {}", row.id, e);
        BTreeMap::new()
    });

    MemoryResponse {
        id: convert::uuid(&row.id, "memory"),
        author: convert::summary(row.author_id.as_deref(), row.author_name, row.author_avatar),
        image_url: row.image_url,
        caption: row.caption,
        answers,
        status: convert::enum_value(&row.status, SubmissionStatus::Pending),
        created_at: convert::timestamp(&row.created_at),
        reviewed_at: convert::opt_timestamp(row.reviewed_at.as_deref()),
    }
}
