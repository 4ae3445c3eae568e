use anyhow::Result;

use crate::models::{NewNotification, NotificationRow};
use crate::{Database, clock};

impl Database {
    pub fn create_notification(&self, n: &NewNotification<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, actor_id, kind, post_id, comment_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (n.id, n.user_id, n.actor_id, n.kind, n.post_id, n.comment_id, clock::now()),
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.kind, n.actor_id, u.name, pr.avatar, n.post_id, n.comment_id,
                        n.read_at, n.created_at
                 FROM notifications n
                 LEFT JOIN users u ON u.id = n.actor_id
                 LEFT JOIN profiles pr ON pr.user_id = n.actor_id
                 WHERE n.user_id = ?1
                 ORDER BY n.created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((user_id, limit), |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        actor_id: row.get(2)?,
                        actor_name: row.get(3)?,
                        actor_avatar: row.get(4)?,
                        post_id: row.get(5)?,
                        comment_id: row.get(6)?,
                        read_at: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read_at IS NULL",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn mark_notifications_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read_at = ?2 WHERE user_id = ?1 AND read_at IS NULL",
                (user_id, clock::now()),
            )?;
            Ok(updated)
        })
    }
}
