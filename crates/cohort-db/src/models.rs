/// Database row types. These map directly to SQLite rows.
/// Distinct from cohort-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub college_id: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub banned_at: Option<String>,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub name: String,
    pub college_id: String,
    pub role: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub cover: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub post_count: i64,
    pub created_at: String,
}

pub struct UserSummaryRow {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// An attachment on a post or message. Rows come back in display order.
pub struct MediaRow {
    pub owner_id: String,
    pub url: String,
    pub media_type: String,
}

pub struct PostRow {
    pub id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub content: Option<String>,
    pub hidden: bool,
    pub comment_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub content: String,
    pub hidden: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ReactionRow {
    pub target_id: String,
    pub user_id: String,
    pub kind: String,
}

pub struct ConversationRow {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LastMessageRow {
    pub conversation_id: String,
    pub id: String,
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub has_media: bool,
    pub created_at: String,
}

pub struct ParticipantRow {
    pub conversation_id: String,
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub last_read_at: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub content: Option<String>,
    pub reply_to_id: Option<String>,
    pub forwarded: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
}

pub struct ReplyPreviewRow {
    pub id: String,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub content: Option<String>,
    pub deleted: bool,
    pub has_media: bool,
}

pub struct NotificationRow {
    pub id: String,
    pub kind: String,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub actor_avatar: Option<String>,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub read_at: Option<String>,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub reporter_id: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_avatar: Option<String>,
    pub target_type: String,
    pub target_id: String,
    pub reason: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

pub struct MemoryRow {
    pub id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub image_url: String,
    pub caption: Option<String>,
    /// JSON object text.
    pub answers: String,
    pub status: String,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

pub struct StatsRow {
    pub users: i64,
    pub posts: i64,
    pub comments: i64,
    pub conversations: i64,
    pub messages: i64,
    pub pending_reports: i64,
    pub pending_memories: i64,
}

// -- Inserts --

pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub college_id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub avatar: Option<&'a str>,
    pub cover: Option<&'a str>,
    pub location: Option<&'a str>,
    pub website: Option<&'a str>,
}

pub struct NewMedia<'a> {
    pub url: &'a str,
    pub media_type: &'a str,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub author_id: &'a str,
    pub content: Option<&'a str>,
    pub media: Vec<NewMedia<'a>>,
}

pub struct NewComment<'a> {
    pub id: &'a str,
    pub post_id: &'a str,
    pub parent_id: Option<&'a str>,
    pub author_id: &'a str,
    pub content: &'a str,
}

pub struct NewGroup<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub avatar: Option<&'a str>,
    pub created_by: &'a str,
    /// Must already include the creator and contain no duplicates.
    pub participant_ids: Vec<&'a str>,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub content: Option<&'a str>,
    pub media: Vec<NewMedia<'a>>,
    pub reply_to_id: Option<&'a str>,
    pub forwarded: bool,
}

pub struct NewNotification<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub actor_id: &'a str,
    pub kind: &'a str,
    pub post_id: Option<&'a str>,
    pub comment_id: Option<&'a str>,
}

pub struct NewReport<'a> {
    pub id: &'a str,
    pub reporter_id: &'a str,
    pub target_type: &'a str,
    pub target_id: &'a str,
    pub reason: &'a str,
}

pub struct NewMemory<'a> {
    pub id: &'a str,
    pub author_id: &'a str,
    pub image_url: &'a str,
    pub caption: Option<&'a str>,
    pub answers_json: &'a str,
}
