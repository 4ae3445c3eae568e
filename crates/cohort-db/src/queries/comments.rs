use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::models::{CommentRow, NewComment};
use crate::{Database, clock};

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.parent_id, c.author_id, u.name, pr.avatar, c.content, c.hidden,
           c.created_at, c.updated_at
    FROM comments c
    LEFT JOIN users u ON u.id = c.author_id
    LEFT JOIN profiles pr ON pr.user_id = c.author_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row.get(4)?,
        author_avatar: row.get(5)?,
        content: row.get(6)?,
        hidden: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Database {
    pub fn create_comment(&self, comment: &NewComment<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            conn.execute(
                "INSERT INTO comments (id, post_id, parent_id, author_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                (
                    comment.id,
                    comment.post_id,
                    comment.parent_id,
                    comment.author_id,
                    comment.content,
                    &now,
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
            conn.query_row(&sql, [id], comment_from_row).optional()
        })
    }

    /// All comments of a post, oldest first. Replies come back flat; callers
    /// build the tree from `parent_id`.
    pub fn list_comments(&self, post_id: &str, include_hidden: bool) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.post_id = ?1 {} ORDER BY c.created_at, c.rowid",
                COMMENT_SELECT,
                if include_hidden { "" } else { "AND c.hidden = 0" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(&self, id: &str, content: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                (id, content, clock::now()),
            )?;
            Ok(())
        })
    }

    /// Removes the comment and its replies.
    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(deleted == 1)
        })
    }

    pub fn set_comment_hidden(&self, id: &str, hidden: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE comments SET hidden = ?2, updated_at = ?3 WHERE id = ?1",
                (id, hidden, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }
}
