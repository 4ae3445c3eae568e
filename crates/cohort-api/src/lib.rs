pub mod admin;
pub mod assistant;
pub mod auth;
pub mod comments;
pub mod conversations;
mod convert;
pub mod error;
pub mod feed;
pub mod files;
pub mod mail;
pub mod memories;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod reactions;
pub mod reports;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
};
use tower_http::services::ServeDir;

use cohort_db::Database;

use crate::assistant::Assistant;
use crate::error::ApiError;
use crate::mail::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    /// `None` when no AI endpoint is configured; conversations with the
    /// assistant then simply get no replies.
    pub assistant: Option<Arc<dyn Assistant>>,
    pub mailer: Arc<dyn Mailer>,
}

/// Runs `f` against the database on the blocking pool.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}

/// Builds every HTTP route. CORS and request tracing are layered on by the caller.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/email/send", post(auth::send_verification))
        .route("/auth/email/verify", post(auth::verify_email))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password))
        .route("/memories/gallery", get(memories::gallery))
        .route("/health", get(|| async { "ok" }));

    let protected = Router::new()
        .route("/auth/password/change", post(auth::change_password))
        // Profile
        .route("/profile", patch(profile::update_profile))
        .route("/profile/{user_id}", get(profile::get_profile))
        // Feed
        .route("/feed/posts", post(feed::create_post).get(feed::list_posts))
        .route(
            "/feed/posts/{post_id}",
            get(feed::get_post).patch(feed::update_post).delete(feed::delete_post),
        )
        .route(
            "/feed/posts/{post_id}/comments",
            post(comments::create_comment).get(comments::list_comments),
        )
        .route(
            "/comments/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // Reactions
        .route(
            "/reactions/{target}/{target_id}",
            post(reactions::toggle_reaction).get(reactions::list_reactions),
        )
        // Chat
        .route(
            "/chat/conversations",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route(
            "/chat/conversations/{conversation_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/chat/conversations/{conversation_id}/read", post(conversations::mark_read))
        .route(
            "/chat/conversations/{conversation_id}/participants",
            post(conversations::add_participants),
        )
        .route("/chat/conversations/{conversation_id}/leave", post(conversations::leave))
        .route("/chat/messages/{message_id}", axum::routing::delete(messages::delete_message))
        .route("/chat/unread", get(conversations::unread_total))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/count", get(notifications::count))
        .route("/notifications/read", post(notifications::mark_read))
        // Reports & memories
        .route("/reports", post(reports::create_report))
        .route("/memories", post(memories::create_memory))
        // Uploads
        .route(
            "/files",
            post(files::upload_file).layer(DefaultBodyLimit::max(files::MAX_UPLOAD_BYTES)),
        );

    let admin = Router::new()
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/ban", post(admin::ban_user))
        .route("/admin/users/{user_id}/unban", post(admin::unban_user))
        .route("/admin/users/{user_id}/role", post(admin::set_role))
        .route("/admin/posts/{post_id}/hide", post(admin::hide_post))
        .route("/admin/posts/{post_id}/unhide", post(admin::unhide_post))
        .route("/admin/comments/{comment_id}/hide", post(admin::hide_comment))
        .route("/admin/comments/{comment_id}/unhide", post(admin::unhide_comment))
        .route("/admin/reports", get(reports::list_reports))
        .route("/admin/reports/{report_id}/resolve", post(reports::resolve_report))
        .route("/admin/memories", get(memories::list_for_review))
        .route("/admin/memories/{memory_id}/review", post(memories::review_memory))
        .layer(from_fn(middleware::require_admin));

    let authed = protected
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public)
        .merge(authed)
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .with_state(state)
}
