use anyhow::Result;

use crate::models::{MemoryRow, NewMemory};
use crate::{Database, clock};

impl Database {
    pub fn create_memory(&self, memory: &NewMemory<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO memories (id, author_id, image_url, caption, answers, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    memory.id,
                    memory.author_id,
                    memory.image_url,
                    memory.caption,
                    memory.answers_json,
                    clock::now(),
                ),
            )?;
            Ok(())
        })
    }

    /// Newest first, optionally filtered by review status.
    pub fn list_memories(&self, status: Option<&str>) -> Result<Vec<MemoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.author_id, u.name, pr.avatar, m.image_url, m.caption, m.answers,
                        m.status, m.created_at, m.reviewed_at
                 FROM memories m
                 LEFT JOIN users u ON u.id = m.author_id
                 LEFT JOIN profiles pr ON pr.user_id = m.author_id
                 WHERE ?1 IS NULL OR m.status = ?1
                 ORDER BY m.created_at DESC",
            )?;
            let rows = stmt
                .query_map([status], |row| {
                    Ok(MemoryRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_name: row.get(2)?,
                        author_avatar: row.get(3)?,
                        image_url: row.get(4)?,
                        caption: row.get(5)?,
                        answers: row.get(6)?,
                        status: row.get(7)?,
                        created_at: row.get(8)?,
                        reviewed_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn review_memory(&self, id: &str, status: &str, reviewed_by: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE memories SET status = ?2, reviewed_by = ?3, reviewed_at = ?4 WHERE id = ?1",
                (id, status, reviewed_by, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }
}
