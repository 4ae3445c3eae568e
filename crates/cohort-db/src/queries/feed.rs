use anyhow::Result;
use rusqlite::{Row, types::Value};

use super::{OptionalExt, insert_media, media_for};
use crate::models::{MediaRow, NewMedia, NewPost, PostRow};
use crate::{Database, clock};

const POST_SELECT: &str = "
    SELECT p.id, p.author_id, u.name, pr.avatar, p.content, p.hidden,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.hidden = 0),
           p.created_at, p.updated_at
    FROM posts p
    LEFT JOIN users u ON u.id = p.author_id
    LEFT JOIN profiles pr ON pr.user_id = p.author_id";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        author_avatar: row.get(3)?,
        content: row.get(4)?,
        hidden: row.get(5)?,
        comment_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    pub fn create_post(&self, post: &NewPost<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            conn.execute(
                "INSERT INTO posts (id, author_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (post.id, post.author_id, post.content, &now),
            )?;
            insert_media(conn, "post_media", "post_id", post.id, &post.media)?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE p.id = ?1", POST_SELECT);
            conn.query_row(&sql, [id], post_from_row).optional()
        })
    }

    /// Newest first. `cursor` is the id of the last post of the previous page.
    pub fn list_posts(
        &self,
        limit: u32,
        cursor: Option<&str>,
        author_id: Option<&str>,
        include_hidden: bool,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut conditions: Vec<&str> = Vec::new();
            let mut args: Vec<Value> = Vec::new();

            if !include_hidden {
                conditions.push("p.hidden = 0");
            }
            if let Some(author_id) = author_id {
                conditions.push("p.author_id = ?");
                args.push(Value::Text(author_id.to_string()));
            }
            if let Some(cursor) = cursor {
                conditions.push(
                    "(p.created_at, p.rowid) < (SELECT created_at, rowid FROM posts WHERE id = ?)",
                );
                args.push(Value::Text(cursor.to_string()));
            }

            let where_clause = if conditions.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", conditions.join(" AND "))
            };
            let sql = format!(
                "{} {} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?",
                POST_SELECT, where_clause
            );
            args.push(Value::Integer(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Updates content and, when `media` is given, replaces the attachments.
    pub fn update_post(
        &self,
        id: &str,
        content: Option<&str>,
        media: Option<&[NewMedia<'_>]>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE posts SET content = COALESCE(?2, content), updated_at = ?3 WHERE id = ?1",
                (id, content, clock::now()),
            )?;
            if let Some(media) = media {
                conn.execute("DELETE FROM post_media WHERE post_id = ?1", [id])?;
                insert_media(conn, "post_media", "post_id", id, media)?;
            }
            Ok(())
        })
    }

    /// Removes the post with its media, comments and reactions.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(deleted == 1)
        })
    }

    pub fn set_post_hidden(&self, id: &str, hidden: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE posts SET hidden = ?2, updated_at = ?3 WHERE id = ?1",
                (id, hidden, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn media_for_posts(&self, post_ids: &[String]) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| media_for(conn, "post_media", "post_id", post_ids))
    }
}
