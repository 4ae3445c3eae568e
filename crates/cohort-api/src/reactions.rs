use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use cohort_db::Database;
use cohort_types::api::{Claims, ReactionsResponse, ToggleReactionRequest, ToggleReactionResponse};
use cohort_types::models::{NotificationKind, ReactionAction, ReactionTarget};

use crate::convert::ReactionIndex;
use crate::error::ApiError;
use crate::feed::visible_post;
use crate::messages::visible_message;
use crate::notifications::notify;
use crate::{AppState, blocking};

/// What the caller is reacting to, and who hears about it.
struct Target {
    notify_user: Option<String>,
    notification: Option<(NotificationKind, String, Option<String>)>,
}

fn resolve_target(
    db: &Database,
    target: ReactionTarget,
    target_id: &str,
    claims: &Claims,
) -> Result<Target, ApiError> {
    match target {
        ReactionTarget::Post => {
            let post = visible_post(db, target_id, claims.is_admin())?;
            Ok(Target {
                notify_user: post.author_id,
                notification: Some((NotificationKind::PostReaction, post.id, None)),
            })
        }
        ReactionTarget::Comment => {
            let comment = db
                .get_comment(target_id)?
                .filter(|c| !c.hidden || claims.is_admin())
                .ok_or(ApiError::NotFound("comment"))?;
            Ok(Target {
                notify_user: comment.author_id,
                notification: Some((
                    NotificationKind::CommentReaction,
                    comment.post_id,
                    Some(comment.id),
                )),
            })
        }
        ReactionTarget::Message => {
            visible_message(db, target_id, &claims.sub.to_string())?;
            Ok(Target {
                notify_user: None,
                notification: None,
            })
        }
    }
}

/// Adds, switches or removes the caller's reaction.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((target, target_id)): Path<(ReactionTarget, Uuid)>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.kind;

    let action = blocking(&state, move |db| {
        let tid = target_id.to_string();
        let viewer = claims.sub.to_string();
        let resolved = resolve_target(db, target, &tid, &claims)?;

        let action = db.toggle_reaction(target, &tid, &viewer, kind)?;

        if action == ReactionAction::Added {
            if let Some((notification, post_id, comment_id)) = &resolved.notification {
                notify(
                    db,
                    resolved.notify_user.as_deref(),
                    &viewer,
                    *notification,
                    Some(post_id.as_str()),
                    comment_id.as_deref(),
                )?;
            }
        }
        Ok(action)
    })
    .await?;

    Ok(Json(ToggleReactionResponse { action, kind }))
}

pub async fn list_reactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((target, target_id)): Path<(ReactionTarget, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let groups = blocking(&state, move |db| {
        let tid = target_id.to_string();
        resolve_target(db, target, &tid, &claims)?;
        let rows = db.reactions_for(target, std::slice::from_ref(&tid))?;
        Ok(ReactionIndex::new(rows, &claims.sub.to_string()).groups(&tid))
    })
    .await?;

    Ok(Json(ReactionsResponse {
        total: groups.iter().map(|g| g.count).sum(),
        groups,
    }))
}
