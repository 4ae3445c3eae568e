use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use cohort_db::models::{ProfileRow, ProfileUpdate};
use cohort_types::api::{Claims, ProfileResponse, UpdateProfileRequest};
use cohort_types::models::Role;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let row = blocking(&state, move |db| Ok(db.get_profile(&uid)?))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(to_response(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.as_deref().map(str::trim);
    if let Some(name) = name {
        if name.chars().count() < 2 || name.chars().count() > 64 {
            return Err(ApiError::bad_request("name must be 2-64 characters"));
        }
    }
    if req.bio.as_deref().is_some_and(|b| b.chars().count() > 500) {
        return Err(ApiError::bad_request("bio is limited to 500 characters"));
    }
    let name = name.map(str::to_string);

    let uid = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        db.update_profile(
            &uid,
            &ProfileUpdate {
                name: name.as_deref(),
                bio: req.bio.as_deref(),
                avatar: req.avatar.as_deref(),
                cover: req.cover.as_deref(),
                location: req.location.as_deref(),
                website: req.website.as_deref(),
            },
        )?;
        db.get_profile(&uid)?.ok_or(ApiError::NotFound("user"))
    })
    .await?;

    Ok(Json(to_response(row)))
}

fn to_response(row: ProfileRow) -> ProfileResponse {
    ProfileResponse {
        id: convert::uuid(&row.user_id, "user"),
        name: row.name,
        college_id: row.college_id,
        role: convert::enum_value(&row.role, Role::User),
        bio: row.bio,
        avatar: row.avatar,
        cover: row.cover,
        location: row.location,
        website: row.website,
        post_count: row.post_count,
        created_at: convert::timestamp(&row.created_at),
    }
}
