use anyhow::Result;

use crate::models::{StatsRow, UserRow};
use crate::{ASSISTANT_USER_ID, Database, clock};

impl Database {
    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users WHERE id != ?1),
                    (SELECT COUNT(*) FROM posts),
                    (SELECT COUNT(*) FROM comments),
                    (SELECT COUNT(*) FROM conversations),
                    (SELECT COUNT(*) FROM messages),
                    (SELECT COUNT(*) FROM reports WHERE status = 'pending'),
                    (SELECT COUNT(*) FROM memories WHERE status = 'pending')",
                [ASSISTANT_USER_ID],
                |row| {
                    Ok(StatsRow {
                        users: row.get(0)?,
                        posts: row.get(1)?,
                        comments: row.get(2)?,
                        conversations: row.get(3)?,
                        messages: row.get(4)?,
                        pending_reports: row.get(5)?,
                        pending_memories: row.get(6)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    /// Every account except the assistant, newest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, college_id, email, password, role, banned_at, created_at
                 FROM users
                 WHERE id != ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([ASSISTANT_USER_ID], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        college_id: row.get(2)?,
                        email: row.get(3)?,
                        password: row.get(4)?,
                        role: row.get(5)?,
                        banned_at: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_banned(&self, user_id: &str, banned: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            let banned_at = banned.then_some(now.as_str());
            let updated = conn.execute(
                "UPDATE users SET banned_at = ?2, updated_at = ?3 WHERE id = ?1",
                (user_id, banned_at, &now),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn set_role(&self, user_id: &str, role: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                (user_id, role, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }
}
