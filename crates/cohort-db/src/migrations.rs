use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::{ASSISTANT_USER_ID, clock};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                college_id  TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user',
                banned_at   TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE profiles (
                user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                bio         TEXT,
                avatar      TEXT,
                cover       TEXT,
                location    TEXT,
                website     TEXT,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE email_verifications (
                email       TEXT PRIMARY KEY,
                code_hash   TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                verified_at TEXT
            );

            CREATE TABLE password_resets (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                used_at     TEXT
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                author_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                content     TEXT,
                hidden      INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_author ON posts(author_id, created_at);

            CREATE TABLE post_media (
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                url         TEXT NOT NULL,
                media_type  TEXT NOT NULL,
                PRIMARY KEY (post_id, position)
            );

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                parent_id   TEXT REFERENCES comments(id) ON DELETE CASCADE,
                author_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                content     TEXT NOT NULL,
                hidden      INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE post_reactions (
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(post_id, user_id)
            );

            CREATE TABLE comment_reactions (
                comment_id  TEXT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(comment_id, user_id)
            );

            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                type        TEXT NOT NULL,
                name        TEXT,
                avatar      TEXT,
                created_by  TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_updated ON conversations(updated_at);

            CREATE TABLE participants (
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                joined_at       TEXT NOT NULL,
                last_read_at    TEXT,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_participants_user ON participants(user_id);

            CREATE TABLE messages (
                id                   TEXT PRIMARY KEY,
                conversation_id      TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id            TEXT REFERENCES users(id) ON DELETE SET NULL,
                content              TEXT,
                reply_to_id          TEXT REFERENCES messages(id) ON DELETE SET NULL,
                forwarded            INTEGER NOT NULL DEFAULT 0,
                deleted_at           TEXT,
                deleted_for_user_ids TEXT NOT NULL DEFAULT '[]',
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE message_media (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                url         TEXT NOT NULL,
                media_type  TEXT NOT NULL,
                PRIMARY KEY (message_id, position)
            );

            CREATE TABLE message_reactions (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(message_id, user_id)
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                actor_id    TEXT REFERENCES users(id) ON DELETE SET NULL,
                kind        TEXT NOT NULL,
                post_id     TEXT REFERENCES posts(id) ON DELETE CASCADE,
                comment_id  TEXT REFERENCES comments(id) ON DELETE CASCADE,
                read_at     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE reports (
                id          TEXT PRIMARY KEY,
                reporter_id TEXT REFERENCES users(id) ON DELETE SET NULL,
                target_type TEXT NOT NULL,
                target_id   TEXT NOT NULL,
                reason      TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                resolved_by TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL,
                resolved_at TEXT
            );

            CREATE TABLE memories (
                id          TEXT PRIMARY KEY,
                author_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                image_url   TEXT NOT NULL,
                caption     TEXT,
                answers     TEXT NOT NULL DEFAULT '{}',
                status      TEXT NOT NULL DEFAULT 'pending',
                reviewed_by TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL,
                reviewed_at TEXT
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        // The assistant never logs in: '!' is not a valid password hash.
        let now = clock::now();
        conn.execute(
            "INSERT INTO users (id, name, college_id, email, password, created_at, updated_at)
             VALUES (?1, 'المساعد الذكي', 'assistant', 'assistant@cohort.invalid', '!', ?2, ?2)",
            (ASSISTANT_USER_ID, &now),
        )?;
        conn.execute(
            "INSERT INTO profiles (user_id, updated_at) VALUES (?1, ?2)",
            (ASSISTANT_USER_ID, &now),
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
