//! Moderation console. Every route here sits behind `require_admin`.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use cohort_db::ASSISTANT_USER_ID;
use cohort_types::api::{AdminUserResponse, Claims, SetRoleRequest, StatsResponse};
use cohort_types::models::Role;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let s = blocking(&state, |db| Ok(db.stats()?)).await?;
    Ok(Json(StatsResponse {
        users: s.users,
        posts: s.posts,
        comments: s.comments,
        conversations: s.conversations,
        messages: s.messages,
        pending_reports: s.pending_reports,
        pending_memories: s.pending_memories,
    }))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |db| Ok(db.list_users()?)).await?;
    let users: Vec<AdminUserResponse> = rows
        .into_iter()
        .map(|row| AdminUserResponse {
            id: convert::uuid(&row.id, "user"),
            name: row.name,
            college_id: row.college_id,
            email: row.email,
            role: convert::enum_value(&row.role, Role::User),
            banned: row.banned_at.is_some(),
            created_at: convert::timestamp(&row.created_at),
        })
        .collect();
    Ok(Json(users))
}

pub async fn ban_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::bad_request("cannot ban yourself"));
    }
    set_banned(&state, user_id, true).await?;
    info!("Admin {} banned user {}", claims.sub, user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unban_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    set_banned(&state, user_id, false).await?;
    info!("Admin {} unbanned user {}", claims.sub, user_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_banned(state: &AppState, user_id: Uuid, banned: bool) -> Result<(), ApiError> {
    let uid = user_id.to_string();
    if uid == ASSISTANT_USER_ID {
        return Err(ApiError::bad_request("the assistant account cannot be moderated"));
    }
    let found = blocking(state, move |db| Ok(db.set_banned(&uid, banned)?)).await?;
    if !found {
        return Err(ApiError::NotFound("user"));
    }
    Ok(())
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub && req.role != Role::Admin {
        return Err(ApiError::bad_request("cannot demote yourself"));
    }
    let uid = user_id.to_string();
    if uid == ASSISTANT_USER_ID {
        return Err(ApiError::bad_request("the assistant account cannot be moderated"));
    }

    let found = blocking(&state, move |db| Ok(db.set_role(&uid, req.role.as_str())?)).await?;
    if !found {
        return Err(ApiError::NotFound("user"));
    }

    // Takes effect at the user's next login, when a new token is issued.
    info!("Admin {} set role of {} to {}", claims.sub, user_id, req.role);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hide_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    set_post_hidden(&state, post_id, true).await
}

pub async fn unhide_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    set_post_hidden(&state, post_id, false).await
}

async fn set_post_hidden(state: &AppState, post_id: Uuid, hidden: bool) -> Result<StatusCode, ApiError> {
    let found = blocking(state, move |db| Ok(db.set_post_hidden(&post_id.to_string(), hidden)?)).await?;
    if !found {
        return Err(ApiError::NotFound("post"));
    }
    info!("Post {} hidden={}", post_id, hidden);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hide_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    set_comment_hidden(&state, comment_id, true).await
}

pub async fn unhide_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    set_comment_hidden(&state, comment_id, false).await
}

async fn set_comment_hidden(
    state: &AppState,
    comment_id: Uuid,
    hidden: bool,
) -> Result<StatusCode, ApiError> {
    let found =
        blocking(state, move |db| Ok(db.set_comment_hidden(&comment_id.to_string(), hidden)?)).await?;
    if !found {
        return Err(ApiError::NotFound("comment"));
    }
    info!("Comment {} hidden={}", comment_id, hidden);
    Ok(StatusCode::NO_CONTENT)
}
