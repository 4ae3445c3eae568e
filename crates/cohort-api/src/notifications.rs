use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cohort_db::Database;
use cohort_db::models::NewNotification;
use cohort_types::api::{Claims, NotificationCountResponse, NotificationResponse};
use cohort_types::models::NotificationKind;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    30
}

/// Records a notification for `user_id`. Acting on your own content is silent.
pub(crate) fn notify(
    db: &Database,
    user_id: Option<&str>,
    actor_id: &str,
    kind: NotificationKind,
    post_id: Option<&str>,
    comment_id: Option<&str>,
) -> Result<(), ApiError> {
    let Some(user_id) = user_id.filter(|u| *u != actor_id) else {
        return Ok(());
    };
    db.create_notification(&NewNotification {
        id: &Uuid::new_v4().to_string(),
        user_id,
        actor_id,
        kind: kind.as_str(),
        post_id,
        comment_id,
    })?;
    Ok(())
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let limit = query.limit.clamp(1, 100);
    let rows = blocking(&state, move |db| Ok(db.list_notifications(&uid, limit)?)).await?;

    let items: Vec<NotificationResponse> = rows
        .into_iter()
        .map(|row| NotificationResponse {
            id: convert::uuid(&row.id, "notification"),
            kind: convert::enum_value(&row.kind, NotificationKind::PostReaction),
            actor: convert::summary(row.actor_id.as_deref(), row.actor_name, row.actor_avatar),
            post_id: convert::opt_uuid(row.post_id.as_deref(), "post"),
            comment_id: convert::opt_uuid(row.comment_id.as_deref(), "comment"),
            read: row.read_at.is_some(),
            created_at: convert::timestamp(&row.created_at),
        })
        .collect();

    Ok(Json(items))
}

/// Badge counts: unread notifications plus unread chat messages.
pub async fn count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let (notifications, messages) = blocking(&state, move |db| {
        Ok((db.unread_notification_count(&uid)?, db.total_unread(&uid)?))
    })
    .await?;

    Ok(Json(NotificationCountResponse {
        notifications,
        messages,
        total: notifications + messages,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let updated = blocking(&state, move |db| Ok(db.mark_notifications_read(&uid)?)).await?;
    Ok(Json(json!({ "updated": updated })))
}
