//! AI participant: when a conversation includes the assistant user, every new
//! message gets a model-generated reply inserted inline.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use cohort_db::ASSISTANT_USER_ID;
use cohort_db::models::{MessageRow, NewMessage};

use crate::AppState;

/// Messages of context sent with each completion request.
pub const CONTEXT_MESSAGES: u32 = 10;

const SYSTEM_PROMPT: &str = "أنت المساعد الذكي لمنصة دفعة الجامعة. \
ساعد الطلاب بإجابات مختصرة وودية وباللغة العربية، \
وتجنب مشاركة أي معلومات شخصية عن الطلاب.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A chat-completion backend.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Returns the reply text, or `None` when the model produced nothing.
    async fn reply(&self, history: &[ChatTurn]) -> anyhow::Result<Option<String>>;
}

pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiAssistant {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(config: AssistantConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn reply(&self, history: &[ChatTurn]) -> anyhow::Result<Option<String>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn {
            role: TurnRole::System,
            content: SYSTEM_PROMPT.to_string(),
        });
        messages.extend_from_slice(history);

        let resp: CompletionResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .context("send completion request")?
            .error_for_status()?
            .json()
            .await
            .context("decode completion response")?;

        Ok(resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

/// Maps stored messages (oldest first) to model turns. Media-only messages
/// carry no text and are skipped.
pub fn history_from_rows(rows: &[MessageRow]) -> Vec<ChatTurn> {
    rows.iter()
        .filter_map(|row| {
            let content = row.content.as_deref()?.trim();
            if content.is_empty() {
                return None;
            }
            let role = if row.sender_id.as_deref() == Some(ASSISTANT_USER_ID) {
                TurnRole::Assistant
            } else {
                TurnRole::User
            };
            Some(ChatTurn {
                role,
                content: content.to_string(),
            })
        })
        .collect()
}

/// Generates and stores the assistant's answer to the latest messages of a
/// conversation. Failures are logged and swallowed so the caller's own send
/// always succeeds.
pub async fn auto_reply(state: &AppState, conversation_id: Uuid) -> Option<Uuid> {
    let assistant = state.assistant.clone()?;

    match try_auto_reply(state, assistant.as_ref(), conversation_id).await {
        Ok(reply_id) => reply_id,
        Err(e) => {
            warn!("AI reply for conversation {} failed: {:#}", conversation_id, e);
            None
        }
    }
}

async fn try_auto_reply(
    state: &AppState,
    assistant: &dyn Assistant,
    conversation_id: Uuid,
) -> anyhow::Result<Option<Uuid>> {
    let db = state.clone();
    let cid = conversation_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.recent_messages(&cid, CONTEXT_MESSAGES))
        .await??;

    let history = history_from_rows(&rows);
    if history.is_empty() {
        debug!("No text context in conversation {}, skipping AI reply", conversation_id);
        return Ok(None);
    }

    let Some(text) = assistant.reply(&history).await? else {
        return Ok(None);
    };

    let reply_id = Uuid::new_v4();
    let db = state.clone();
    let (mid, cid) = (reply_id.to_string(), conversation_id.to_string());
    tokio::task::spawn_blocking(move || {
        db.db.insert_message(&NewMessage {
            id: &mid,
            conversation_id: &cid,
            sender_id: ASSISTANT_USER_ID,
            content: Some(text.as_str()),
            media: vec![],
            reply_to_id: None,
            forwarded: false,
        })
    })
    .await??;

    info!("AI replied in conversation {}", conversation_id);
    Ok(Some(reply_id))
}
