use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use cohort_db::Database;
use cohort_db::models::{ConversationRow, NewGroup};
use cohort_types::api::{
    AddParticipantsRequest, Claims, ConversationSummary, CreateConversationRequest,
    CreateConversationResponse, LastMessage, Page, PageQuery, UnreadResponse, UserSummary,
};
use cohort_types::models::ConversationType;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

const MAX_PAGE: u32 = 50;
const MAX_GROUP_NAME: usize = 100;

/// The conversation, if it exists and `user_id` takes part in it.
pub(crate) fn require_participant(
    db: &Database,
    conversation_id: &str,
    user_id: &str,
) -> Result<ConversationRow, ApiError> {
    let conversation = db
        .get_conversation(conversation_id)?
        .ok_or(ApiError::NotFound("conversation"))?;
    if !db.is_participant(conversation_id, user_id)? {
        return Err(ApiError::Forbidden("not a participant"));
    }
    Ok(conversation)
}

/// Private conversations are unique per pair of users: asking again returns
/// the existing one with `is_new = false`. Groups are always created fresh.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let others = distinct_others(&req.participant_ids, claims.sub);
    match req.kind {
        ConversationType::Private if others.len() != 1 => {
            return Err(ApiError::bad_request(
                "a private conversation needs exactly one other participant",
            ));
        }
        ConversationType::Group if others.is_empty() => {
            return Err(ApiError::bad_request("a group needs at least one other participant"));
        }
        _ => {}
    }

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    if name.as_ref().is_some_and(|n| n.chars().count() > MAX_GROUP_NAME) {
        return Err(ApiError::bad_request("group name is too long"));
    }

    let viewer = claims.sub.to_string();
    let new_id = Uuid::new_v4().to_string();
    let kind = req.kind;

    let (conversation_id, is_new) = blocking(&state, move |db| {
        ensure_users_exist(db, &others)?;
        match kind {
            ConversationType::Private => Ok(db.get_or_create_private(&new_id, &viewer, &others[0])?),
            ConversationType::Group => {
                let mut participant_ids = vec![viewer.as_str()];
                participant_ids.extend(others.iter().map(String::as_str));
                db.create_group(&NewGroup {
                    id: &new_id,
                    name: name.as_deref(),
                    avatar: req.avatar.as_deref(),
                    created_by: &viewer,
                    participant_ids,
                })?;
                Ok((new_id, true))
            }
        }
    })
    .await?;

    if is_new {
        info!("User {} created {} conversation {}", claims.sub, kind, conversation_id);
    }

    let status = if is_new { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(CreateConversationResponse {
            conversation_id: convert::uuid(&conversation_id, "conversation"),
            is_new,
        }),
    ))
}

/// The caller's conversations, most recently active first, each with its
/// last visible message, unread count and participants.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let limit = query.limit.clamp(1, MAX_PAGE);

    let page = blocking(&state, move |db| {
        let cursor = query.cursor.map(|c| c.to_string());
        let mut rows = db.list_conversations(&viewer, limit + 1, cursor.as_deref())?;
        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut last: HashMap<String, LastMessage> = db
            .last_messages(&ids, &viewer)?
            .into_iter()
            .map(|m| {
                let message = LastMessage {
                    id: convert::uuid(&m.id, "message"),
                    sender_id: m.sender_id.as_deref().map(|s| convert::uuid(s, "user")).unwrap_or_default(),
                    content: m.content,
                    has_media: m.has_media,
                    created_at: convert::timestamp(&m.created_at),
                };
                (m.conversation_id, message)
            })
            .collect();
        let unread: HashMap<String, i64> = db.unread_counts(&ids, &viewer)?.into_iter().collect();
        let mut participants: HashMap<String, Vec<UserSummary>> = HashMap::new();
        for p in db.participants_for(&ids)? {
            participants.entry(p.conversation_id).or_default().push(UserSummary {
                id: convert::uuid(&p.user_id, "user"),
                name: p.name,
                avatar: p.avatar,
            });
        }

        let items: Vec<ConversationSummary> = rows
            .into_iter()
            .map(|row| ConversationSummary {
                id: convert::uuid(&row.id, "conversation"),
                kind: convert::enum_value(&row.kind, ConversationType::Private),
                name: row.name,
                avatar: row.avatar,
                updated_at: convert::timestamp(&row.updated_at),
                last_message: last.remove(&row.id),
                unread_count: unread.get(&row.id).copied().unwrap_or(0),
                participants: participants.remove(&row.id).unwrap_or_default(),
            })
            .collect();
        let next_cursor = if has_more { items.last().map(|c| c.id) } else { None };
        Ok(Page { items, next_cursor })
    })
    .await?;

    Ok(Json(page))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    blocking(&state, move |db| {
        let cid = conversation_id.to_string();
        require_participant(db, &cid, &viewer)?;
        db.mark_read(&cid, &viewer)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Any member of a group may add people to it.
pub async fn add_participants(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<AddParticipantsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let others = distinct_others(&req.user_ids, claims.sub);
    if others.is_empty() {
        return Err(ApiError::bad_request("no users to add"));
    }
    let viewer = claims.sub.to_string();

    let added = blocking(&state, move |db| {
        let cid = conversation_id.to_string();
        let conversation = require_participant(db, &cid, &viewer)?;
        if conversation.kind != ConversationType::Group.as_str() {
            return Err(ApiError::bad_request("participants can only be added to groups"));
        }
        ensure_users_exist(db, &others)?;
        Ok(db.add_participants(&cid, &others)?)
    })
    .await?;

    Ok(Json(json!({ "added": added })))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    blocking(&state, move |db| {
        let cid = conversation_id.to_string();
        let conversation = require_participant(db, &cid, &viewer)?;
        if conversation.kind != ConversationType::Group.as_str() {
            return Err(ApiError::bad_request("only groups can be left"));
        }
        db.remove_participant(&cid, &viewer)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_total(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let unread = blocking(&state, move |db| Ok(db.total_unread(&viewer)?)).await?;
    Ok(Json(UnreadResponse { unread }))
}

/// Requested ids minus the caller, duplicates removed, order kept.
fn distinct_others(ids: &[Uuid], caller: Uuid) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| **id != caller && seen.insert(**id))
        .map(|id| id.to_string())
        .collect()
}

fn ensure_users_exist(db: &Database, ids: &[String]) -> Result<(), ApiError> {
    if db.user_summaries(ids)?.len() != ids.len() {
        return Err(ApiError::NotFound("user"));
    }
    Ok(())
}
