use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use cohort_db::models::{MessageRow, NewMessage};
use cohort_db::{ASSISTANT_USER_ID, Database};
use cohort_types::api::{
    Claims, DeleteMessageQuery, MessageResponse, Page, PageQuery, ReplyPreview, SendMessageRequest,
};
use cohort_types::models::{DeleteScope, ReactionTarget};

use crate::conversations::require_participant;
use crate::convert::{self, ReactionIndex};
use crate::error::ApiError;
use crate::feed::{check_media, new_media};
use crate::{AppState, assistant, blocking};

const MAX_MESSAGE_LEN: usize = 4000;
const MAX_PAGE: u32 = 100;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    if content.is_none() && req.media.is_empty() {
        return Err(ApiError::bad_request("message needs text or media"));
    }
    if content.as_ref().is_some_and(|c| c.chars().count() > MAX_MESSAGE_LEN) {
        return Err(ApiError::bad_request("message is too long"));
    }
    check_media(&req.media)?;

    let message_id = Uuid::new_v4();
    let viewer = claims.sub.to_string();

    let (message, wants_reply) = blocking(&state, move |db| {
        let cid = conversation_id.to_string();
        require_participant(db, &cid, &viewer)?;

        let reply_to = req.reply_to_id.map(|id| id.to_string());
        if let Some(reply_to) = &reply_to {
            db.get_message(reply_to)?
                .filter(|m| m.conversation_id == cid)
                .ok_or_else(|| ApiError::bad_request("reply target is not in this conversation"))?;
        }

        let mid = message_id.to_string();
        db.insert_message(&NewMessage {
            id: &mid,
            conversation_id: &cid,
            sender_id: &viewer,
            content: content.as_deref(),
            media: new_media(&req.media),
            reply_to_id: reply_to.as_deref(),
            forwarded: req.forwarded,
        })?;

        let wants_reply = viewer != ASSISTANT_USER_ID
            && db.participant_ids(&cid)?.iter().any(|p| p == ASSISTANT_USER_ID);

        let row = db.get_message(&mid)?.ok_or(ApiError::NotFound("message"))?;
        Ok((assemble(db, vec![row], &viewer)?.remove(0), wants_reply))
    })
    .await?;

    // Inline: the sender's request waits for the model (bounded by the client timeout).
    if wants_reply {
        assistant::auto_reply(&state, conversation_id).await;
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// A page of messages in chronological order. `cursor` is the oldest message
/// id of the previous page; pages walk backwards in time.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();
    let limit = query.limit.clamp(1, MAX_PAGE);

    let page = blocking(&state, move |db| {
        let cid = conversation_id.to_string();
        require_participant(db, &cid, &viewer)?;

        let cursor = query.cursor.map(|c| c.to_string());
        let mut rows = db.list_messages(&cid, &viewer, limit + 1, cursor.as_deref())?;
        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);

        let mut items = assemble(db, rows, &viewer)?;
        let next_cursor = if has_more { items.last().map(|m| m.id) } else { None };
        items.reverse();
        Ok(Page { items, next_cursor })
    })
    .await?;

    Ok(Json(page))
}

/// `scope=me` hides the message for the caller only; `scope=everyone` is
/// reserved to the sender and blanks it for all participants.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<DeleteMessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub.to_string();

    blocking(&state, move |db| {
        let mid = message_id.to_string();
        let row = visible_message(db, &mid, &viewer)?;
        match query.scope {
            DeleteScope::Me => {
                db.hide_message_for(&mid, &viewer)?;
            }
            DeleteScope::Everyone => {
                if row.sender_id.as_deref() != Some(viewer.as_str()) {
                    return Err(ApiError::Forbidden("only the sender can delete for everyone"));
                }
                db.delete_message_for_everyone(&mid)?;
                info!("Message {} deleted for everyone by {}", mid, viewer);
            }
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// An undeleted message in a conversation `viewer` takes part in.
pub(crate) fn visible_message(db: &Database, message_id: &str, viewer: &str) -> Result<MessageRow, ApiError> {
    let row = db
        .get_message(message_id)?
        .filter(|m| m.deleted_at.is_none())
        .ok_or(ApiError::NotFound("message"))?;
    if !db.is_participant(&row.conversation_id, viewer)? {
        return Err(ApiError::Forbidden("not a participant"));
    }
    Ok(row)
}

/// Attaches media, reactions and reply previews with three batched queries.
fn assemble(db: &Database, rows: Vec<MessageRow>, viewer: &str) -> Result<Vec<MessageResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut media = convert::group_media(db.media_for_messages(&ids)?);
    let mut reactions =
        ReactionIndex::new(db.reactions_for(ReactionTarget::Message, &ids)?, viewer);

    let mut reply_ids: Vec<String> = rows.iter().filter_map(|r| r.reply_to_id.clone()).collect();
    reply_ids.sort();
    reply_ids.dedup();
    let previews: HashMap<String, ReplyPreview> = db
        .reply_previews(&reply_ids)?
        .into_iter()
        .map(|p| {
            let preview = ReplyPreview {
                id: convert::uuid(&p.id, "message"),
                sender_id: p.sender_id.as_deref().map(|s| convert::uuid(s, "user")).unwrap_or_default(),
                sender_name: p.sender_name.unwrap_or_default(),
                content: if p.deleted { None } else { p.content },
                has_media: p.has_media && !p.deleted,
            };
            (p.id, preview)
        })
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| MessageResponse {
            id: convert::uuid(&row.id, "message"),
            conversation_id: convert::uuid(&row.conversation_id, "conversation"),
            sender: convert::summary(row.sender_id.as_deref(), row.sender_name, row.sender_avatar),
            content: row.content,
            media: media.remove(&row.id).unwrap_or_default(),
            reply_to: row.reply_to_id.as_ref().and_then(|r| previews.get(r).cloned()),
            forwarded: row.forwarded,
            reactions: reactions.groups(&row.id),
            created_at: convert::timestamp(&row.created_at),
        })
        .collect())
}
