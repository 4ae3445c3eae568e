use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use cohort_db::Database;
use cohort_db::models::{NewMedia, NewPost, PostRow};
use cohort_types::api::{
    Claims, CreatePostRequest, FeedQuery, MediaItem, Page, PostResponse, UpdatePostRequest,
};
use cohort_types::models::ReactionTarget;

use crate::convert::{self, ReactionIndex};
use crate::error::ApiError;
use crate::{AppState, blocking};

pub(crate) const MAX_MEDIA: usize = 10;
const MAX_POST_LEN: usize = 5000;
const MAX_PAGE: u32 = 50;

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = clean_content(req.content.as_deref())?;
    if content.is_none() && req.media.is_empty() {
        return Err(ApiError::bad_request("post needs text or media"));
    }
    check_media(&req.media)?;

    let post_id = Uuid::new_v4();
    let viewer = claims.sub.to_string();
    let post = blocking(&state, move |db| {
        db.create_post(&NewPost {
            id: &post_id.to_string(),
            author_id: &viewer,
            content: content.as_deref(),
            media: new_media(&req.media),
        })?;
        let row = db.get_post(&post_id.to_string())?.ok_or(ApiError::NotFound("post"))?;
        Ok(assemble(db, vec![row], &viewer)?.remove(0))
    })
    .await?;

    info!("User {} created post {}", claims.sub, post_id);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, MAX_PAGE);
    let viewer = claims.sub.to_string();
    let include_hidden = claims.is_admin();

    let page = blocking(&state, move |db| {
        let cursor = query.cursor.map(|c| c.to_string());
        let author = query.author_id.map(|a| a.to_string());
        let mut rows =
            db.list_posts(limit + 1, cursor.as_deref(), author.as_deref(), include_hidden)?;

        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);
        let items = assemble(db, rows, &viewer)?;
        let next_cursor = if has_more { items.last().map(|p| p.id) } else { None };
        Ok(Page { items, next_cursor })
    })
    .await?;

    Ok(Json(page))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let is_admin = claims.is_admin();
    let post = blocking(&state, move |db| {
        let row = visible_post(db, &post_id.to_string(), is_admin)?;
        Ok(assemble(db, vec![row], &viewer)?.remove(0))
    })
    .await?;

    Ok(Json(post))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = clean_content(req.content.as_deref())?;
    if let Some(media) = &req.media {
        check_media(media)?;
    }

    let viewer = claims.sub.to_string();
    let post = blocking(&state, move |db| {
        let pid = post_id.to_string();
        let row = db.get_post(&pid)?.ok_or(ApiError::NotFound("post"))?;
        if row.author_id.as_deref() != Some(viewer.as_str()) {
            return Err(ApiError::Forbidden("only the author can edit a post"));
        }

        let media = req.media.as_deref().map(new_media);
        let keeps_text = content.is_some() || row.content.is_some();
        if !keeps_text && media.as_ref().is_some_and(|m| m.is_empty()) {
            return Err(ApiError::bad_request("post needs text or media"));
        }

        db.update_post(&pid, content.as_deref(), media.as_deref())?;
        let row = db.get_post(&pid)?.ok_or(ApiError::NotFound("post"))?;
        Ok(assemble(db, vec![row], &viewer)?.remove(0))
    })
    .await?;

    Ok(Json(post))
}

/// Authors delete their own posts; admins may delete any.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let is_admin = claims.is_admin();
    blocking(&state, move |db| {
        let pid = post_id.to_string();
        let row = db.get_post(&pid)?.ok_or(ApiError::NotFound("post"))?;
        if !is_admin && row.author_id.as_deref() != Some(viewer.as_str()) {
            return Err(ApiError::Forbidden("not allowed to delete this post"));
        }
        db.delete_post(&pid)?;
        Ok(())
    })
    .await?;

    info!("User {} deleted post {}", claims.sub, post_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Hidden posts look missing to everyone but admins.
pub(crate) fn visible_post(db: &Database, post_id: &str, is_admin: bool) -> Result<PostRow, ApiError> {
    match db.get_post(post_id)? {
        Some(row) if !row.hidden || is_admin => Ok(row),
        _ => Err(ApiError::NotFound("post")),
    }
}

/// Attaches media and reactions to a page of posts with two batched queries.
fn assemble(db: &Database, rows: Vec<PostRow>, viewer: &str) -> Result<Vec<PostResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut media = convert::group_media(db.media_for_posts(&ids)?);
    let mut reactions = ReactionIndex::new(db.reactions_for(ReactionTarget::Post, &ids)?, viewer);

    Ok(rows
        .into_iter()
        .map(|row| PostResponse {
            id: convert::uuid(&row.id, "post"),
            author: convert::summary(row.author_id.as_deref(), row.author_name, row.author_avatar),
            content: row.content,
            media: media.remove(&row.id).unwrap_or_default(),
            reactions: reactions.groups(&row.id),
            my_reaction: reactions.mine(&row.id),
            comment_count: row.comment_count,
            hidden: row.hidden,
            created_at: convert::timestamp(&row.created_at),
            updated_at: convert::timestamp(&row.updated_at),
        })
        .collect())
}

/// Trims text; blank text counts as absent.
fn clean_content(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_POST_LEN {
        return Err(ApiError::bad_request("post text is too long"));
    }
    Ok(Some(text.to_string()))
}

pub(crate) fn check_media(media: &[MediaItem]) -> Result<(), ApiError> {
    if media.len() > MAX_MEDIA {
        return Err(ApiError::bad_request(format!("at most {} attachments", MAX_MEDIA)));
    }
    for item in media {
        if item.url.trim().is_empty() {
            return Err(ApiError::bad_request("attachment url is empty"));
        }
        if !matches!(item.media_type.as_str(), "image" | "video" | "file") {
            return Err(ApiError::bad_request(format!(
                "unknown media type '{}'",
                item.media_type
            )));
        }
    }
    Ok(())
}

pub(crate) fn new_media(media: &[MediaItem]) -> Vec<NewMedia<'_>> {
    media
        .iter()
        .map(|m| NewMedia {
            url: &m.url,
            media_type: &m.media_type,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content(Some("  hi  ")).unwrap().as_deref(), Some("hi"));
        assert_eq!(clean_content(Some("   ")).unwrap(), None);
        assert_eq!(clean_content(None).unwrap(), None);
        assert!(clean_content(Some(&"x".repeat(MAX_POST_LEN + 1))).is_err());
    }

    #[test]
    fn test_check_media() {
        let item = |t: &str| MediaItem { url: "/uploads/a.png".into(), media_type: t.into() };
        assert!(check_media(&[item("image"), item("video")]).is_ok());
        assert!(check_media(&[item("audio")]).is_err());
        assert!(check_media(&vec![item("image"); MAX_MEDIA + 1]).is_err());
    }
}
