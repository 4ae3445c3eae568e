use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use cohort_db::Database;
use cohort_db::models::{CommentRow, NewComment};
use cohort_types::api::{Claims, CommentResponse, CreateCommentRequest, UpdateCommentRequest};
use cohort_types::models::{NotificationKind, ReactionTarget};

use crate::convert::{self, ReactionIndex};
use crate::error::ApiError;
use crate::feed::visible_post;
use crate::notifications::notify;
use crate::{AppState, blocking};

const MAX_COMMENT_LEN: usize = 2000;
/// Deepest reply level. Replies below it become siblings of their parent.
pub const MAX_REPLY_DEPTH: usize = 8;

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = clean_content(&req.content)?;
    let viewer = claims.sub.to_string();
    let is_admin = claims.is_admin();

    let comment = blocking(&state, move |db| {
        let pid = post_id.to_string();
        let post = visible_post(db, &pid, is_admin)?;

        let parent = match req.parent_id {
            Some(parent_id) => {
                let parent = db
                    .get_comment(&parent_id.to_string())?
                    .filter(|c| c.post_id == pid)
                    .ok_or_else(|| ApiError::bad_request("parent comment is not on this post"))?;
                Some(parent)
            }
            None => None,
        };
        let attach_to = match &parent {
            Some(parent) => Some(nest_under(db, parent)?),
            None => None,
        };

        let comment_id = Uuid::new_v4().to_string();
        db.create_comment(&NewComment {
            id: &comment_id,
            post_id: &pid,
            parent_id: attach_to.as_deref(),
            author_id: &viewer,
            content: &content,
        })?;

        notify(
            db,
            post.author_id.as_deref(),
            &viewer,
            NotificationKind::PostComment,
            Some(pid.as_str()),
            Some(comment_id.as_str()),
        )?;
        if let Some(parent) = &parent {
            // The post author already heard about it.
            if parent.author_id != post.author_id {
                notify(
                    db,
                    parent.author_id.as_deref(),
                    &viewer,
                    NotificationKind::CommentReply,
                    Some(pid.as_str()),
                    Some(comment_id.as_str()),
                )?;
            }
        }

        let row = db.get_comment(&comment_id)?.ok_or(ApiError::NotFound("comment"))?;
        Ok(assemble(db, vec![row], &viewer)?.remove(0))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// The post's comments as a reply tree, oldest first at every level.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let is_admin = claims.is_admin();

    let comments = blocking(&state, move |db| {
        let pid = post_id.to_string();
        visible_post(db, &pid, is_admin)?;
        let rows = db.list_comments(&pid, is_admin)?;
        assemble(db, rows, &viewer)
    })
    .await?;

    Ok(Json(build_tree(comments)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = clean_content(&req.content)?;
    let viewer = claims.sub.to_string();

    let comment = blocking(&state, move |db| {
        let cid = comment_id.to_string();
        let row = db.get_comment(&cid)?.ok_or(ApiError::NotFound("comment"))?;
        if row.author_id.as_deref() != Some(viewer.as_str()) {
            return Err(ApiError::Forbidden("only the author can edit a comment"));
        }
        db.update_comment(&cid, &content)?;
        let row = db.get_comment(&cid)?.ok_or(ApiError::NotFound("comment"))?;
        Ok(assemble(db, vec![row], &viewer)?.remove(0))
    })
    .await?;

    Ok(Json(comment))
}

/// Removes the comment and its replies. Authors and admins only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let is_admin = claims.is_admin();

    blocking(&state, move |db| {
        let cid = comment_id.to_string();
        let row = db.get_comment(&cid)?.ok_or(ApiError::NotFound("comment"))?;
        if !is_admin && row.author_id.as_deref() != Some(viewer.as_str()) {
            return Err(ApiError::Forbidden("not allowed to delete this comment"));
        }
        db.delete_comment(&cid)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn clean_content(raw: &str) -> Result<String, ApiError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("comment is empty"));
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::bad_request("comment is too long"));
    }
    Ok(text.to_string())
}

fn assemble(db: &Database, rows: Vec<CommentRow>, viewer: &str) -> Result<Vec<CommentResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut reactions =
        ReactionIndex::new(db.reactions_for(ReactionTarget::Comment, &ids)?, viewer);

    Ok(rows
        .into_iter()
        .map(|row| CommentResponse {
            id: convert::uuid(&row.id, "comment"),
            post_id: convert::uuid(&row.post_id, "post"),
            parent_id: convert::opt_uuid(row.parent_id.as_deref(), "comment"),
            author: convert::summary(row.author_id.as_deref(), row.author_name, row.author_avatar),
            content: row.content,
            hidden: row.hidden,
            reactions: reactions.groups(&row.id),
            my_reaction: reactions.mine(&row.id),
            created_at: convert::timestamp(&row.created_at),
            updated_at: convert::timestamp(&row.updated_at),
            replies: vec![],
        })
        .collect())
}

/// The comment a reply to `parent` is stored under, keeping every comment
/// within `MAX_REPLY_DEPTH` levels of the post.
fn nest_under(db: &Database, parent: &CommentRow) -> Result<String, ApiError> {
    // Level of `parent`, counted up to the cap.
    let mut depth = 1;
    let mut ancestor = parent.parent_id.clone();
    while depth < MAX_REPLY_DEPTH {
        let Some(id) = ancestor else { break };
        depth += 1;
        ancestor = db.get_comment(&id)?.and_then(|c| c.parent_id);
    }

    if depth >= MAX_REPLY_DEPTH {
        return Ok(parent.parent_id.clone().unwrap_or_else(|| parent.id.clone()));
    }
    Ok(parent.id.clone())
}

/// Nests a flat, oldest-first list. Replies whose parent is not in the list
/// (hidden from this viewer) are dropped along with their own subtree.
fn build_tree(comments: Vec<CommentResponse>) -> Vec<CommentResponse> {
    let mut children: HashMap<Option<Uuid>, Vec<CommentResponse>> = HashMap::new();
    for comment in comments {
        children.entry(comment.parent_id).or_default().push(comment);
    }
    attach(None, &mut children)
}

fn attach(
    parent: Option<Uuid>,
    children: &mut HashMap<Option<Uuid>, Vec<CommentResponse>>,
) -> Vec<CommentResponse> {
    let mut level = children.remove(&parent).unwrap_or_default();
    for comment in &mut level {
        comment.replies = attach(Some(comment.id), children);
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::api::UserSummary;

    fn comment(id: Uuid, parent_id: Option<Uuid>) -> CommentResponse {
        CommentResponse {
            id,
            post_id: Uuid::nil(),
            parent_id,
            author: UserSummary { id: Uuid::nil(), name: "x".into(), avatar: None },
            content: "x".into(),
            hidden: false,
            reactions: vec![],
            my_reaction: None,
            created_at: Default::default(),
            updated_at: Default::default(),
            replies: vec![],
        }
    }

    #[test]
    fn test_build_tree() {
        let (a, b, c, d, hidden, orphan) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let tree = build_tree(vec![
            comment(a, None),
            comment(b, Some(a)),
            comment(c, None),
            comment(d, Some(b)),
            comment(orphan, Some(hidden)),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, a);
        assert_eq!(tree[0].replies[0].id, b);
        assert_eq!(tree[0].replies[0].replies[0].id, d);
        assert_eq!(tree[1].id, c);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content("  nice  ").unwrap(), "nice");
        assert!(clean_content("   ").is_err());
    }
}
