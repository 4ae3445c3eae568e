use anyhow::Result;
use rusqlite::{Connection, Row, types::Value};

use cohort_types::models::ConversationType;

use super::{OptionalExt, insert_media, media_for, placeholders};
use crate::models::{
    ConversationRow, LastMessageRow, MediaRow, MessageRow, NewGroup, NewMessage, ParticipantRow,
    ReplyPreviewRow,
};
use crate::{Database, clock};

const CONVERSATION_COLUMNS: &str =
    "c.id, c.type, c.name, c.avatar, c.created_by, c.created_at, c.updated_at";

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.conversation_id, m.sender_id, u.name, pr.avatar, m.content, m.reply_to_id,
           m.forwarded, m.deleted_at, m.created_at
    FROM messages m
    LEFT JOIN users u ON u.id = m.sender_id
    LEFT JOIN profiles pr ON pr.user_id = m.sender_id";

/// Matches messages the viewer bound at `?1` has not hidden for themselves.
const NOT_HIDDEN_FOR_VIEWER: &str =
    "NOT EXISTS (SELECT 1 FROM json_each(m.deleted_for_user_ids) WHERE json_each.value = ?1)";

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        sender_avatar: row.get(4)?,
        content: row.get(5)?,
        reply_to_id: row.get(6)?,
        forwarded: row.get(7)?,
        deleted_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn insert_conversation(
    conn: &Connection,
    id: &str,
    kind: ConversationType,
    name: Option<&str>,
    avatar: Option<&str>,
    created_by: &str,
    participant_ids: &[&str],
) -> Result<()> {
    let now = clock::now();
    conn.execute(
        "INSERT INTO conversations (id, type, name, avatar, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        (id, kind.as_str(), name, avatar, created_by, &now),
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO participants (conversation_id, user_id, joined_at, last_read_at)
         VALUES (?1, ?2, ?3, ?3)",
    )?;
    for user_id in participant_ids {
        stmt.execute((id, user_id, &now))?;
    }
    Ok(())
}

impl Database {
    // -- Conversations --

    /// Returns the private conversation between `user_id` and `other_id`,
    /// creating it with `new_id` if none exists. The bool is true when created.
    pub fn get_or_create_private(
        &self,
        new_id: &str,
        user_id: &str,
        other_id: &str,
    ) -> Result<(String, bool)> {
        self.with_conn_mut(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT c.id FROM conversations c
                     JOIN participants me ON me.conversation_id = c.id AND me.user_id = ?1
                     JOIN participants other ON other.conversation_id = c.id AND other.user_id = ?2
                     WHERE c.type = 'private'
                     ORDER BY c.created_at
                     LIMIT 1",
                    (user_id, other_id),
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                return Ok((id, false));
            }

            insert_conversation(
                conn,
                new_id,
                ConversationType::Private,
                None,
                None,
                user_id,
                &[user_id, other_id],
            )?;
            Ok((new_id.to_string(), true))
        })
    }

    pub fn create_group(&self, group: &NewGroup<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            insert_conversation(
                conn,
                group.id,
                ConversationType::Group,
                group.name,
                group.avatar,
                group.created_by,
                &group.participant_ids,
            )
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM conversations c WHERE c.id = ?1", CONVERSATION_COLUMNS);
            conn.query_row(&sql, [id], conversation_from_row).optional()
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM participants WHERE conversation_id = ?1 AND user_id = ?2)",
                (conversation_id, user_id),
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    pub fn participant_ids(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM participants WHERE conversation_id = ?1 ORDER BY joined_at, rowid",
            )?;
            let ids = stmt
                .query_map([conversation_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    /// Adds users to a conversation, ignoring those already in it.
    /// Returns how many were added.
    pub fn add_participants(&self, conversation_id: &str, user_ids: &[String]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            let mut stmt = conn.prepare(
                "INSERT OR IGNORE INTO participants (conversation_id, user_id, joined_at, last_read_at)
                 VALUES (?1, ?2, ?3, ?3)",
            )?;
            let mut added = 0;
            for user_id in user_ids {
                added += stmt.execute((conversation_id, user_id, &now))?;
            }
            Ok(added)
        })
    }

    pub fn remove_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM participants WHERE conversation_id = ?1 AND user_id = ?2",
                (conversation_id, user_id),
            )?;
            Ok(removed == 1)
        })
    }

    /// Conversations `user_id` takes part in, most recently active first.
    /// `cursor` is the id of the last conversation of the previous page.
    pub fn list_conversations(
        &self,
        user_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut args: Vec<Value> = vec![Value::Text(user_id.to_string())];
            let cursor_clause = match cursor {
                Some(cursor) => {
                    args.push(Value::Text(cursor.to_string()));
                    "WHERE (c.updated_at, c.rowid) <
                           (SELECT updated_at, rowid FROM conversations WHERE id = ?2)"
                }
                None => "",
            };
            args.push(Value::Integer(limit as i64));

            let sql = format!(
                "SELECT {} FROM conversations c
                 JOIN participants p ON p.conversation_id = c.id AND p.user_id = ?1
                 {}
                 ORDER BY c.updated_at DESC, c.rowid DESC
                 LIMIT ?{}",
                CONVERSATION_COLUMNS,
                cursor_clause,
                args.len()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Latest message per conversation that `viewer_id` can still see.
    pub fn last_messages(&self, conversation_ids: &[String], viewer_id: &str) -> Result<Vec<LastMessageRow>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT conversation_id, id, sender_id, content, has_media, created_at FROM (
                    SELECT m.conversation_id, m.id, m.sender_id, m.content,
                           EXISTS(SELECT 1 FROM message_media mm WHERE mm.message_id = m.id) AS has_media,
                           m.created_at,
                           ROW_NUMBER() OVER (
                               PARTITION BY m.conversation_id
                               ORDER BY m.created_at DESC, m.rowid DESC
                           ) AS rn
                    FROM messages m
                    WHERE m.conversation_id IN ({})
                      AND m.deleted_at IS NULL
                      AND {}
                 ) WHERE rn = 1",
                placeholders(2, conversation_ids.len()),
                NOT_HIDDEN_FOR_VIEWER,
            );
            let args = std::iter::once(viewer_id).chain(conversation_ids.iter().map(String::as_str));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), |row| {
                    Ok(LastMessageRow {
                        conversation_id: row.get(0)?,
                        id: row.get(1)?,
                        sender_id: row.get(2)?,
                        content: row.get(3)?,
                        has_media: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Per conversation: messages from others newer than the user's
    /// `last_read_at`. Conversations with nothing unread are absent.
    pub fn unread_counts(&self, conversation_ids: &[String], user_id: &str) -> Result<Vec<(String, i64)>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT m.conversation_id, COUNT(*) FROM messages m
                 JOIN participants p ON p.conversation_id = m.conversation_id AND p.user_id = ?1
                 WHERE m.conversation_id IN ({})
                   AND m.sender_id IS NOT ?1
                   AND m.deleted_at IS NULL
                   AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)
                 GROUP BY m.conversation_id",
                placeholders(2, conversation_ids.len()),
            );
            let args = std::iter::once(user_id).chain(conversation_ids.iter().map(String::as_str));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Sum of unread messages across all of the user's conversations.
    pub fn total_unread(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 JOIN participants p ON p.conversation_id = m.conversation_id AND p.user_id = ?1
                 WHERE m.sender_id IS NOT ?1
                   AND m.deleted_at IS NULL
                   AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    pub fn participants_for(&self, conversation_ids: &[String]) -> Result<Vec<ParticipantRow>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.conversation_id, p.user_id, u.name, pr.avatar, p.last_read_at
                 FROM participants p
                 JOIN users u ON u.id = p.user_id
                 LEFT JOIN profiles pr ON pr.user_id = p.user_id
                 WHERE p.conversation_id IN ({})
                 ORDER BY p.joined_at, p.rowid",
                placeholders(1, conversation_ids.len()),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(conversation_ids), |row| {
                    Ok(ParticipantRow {
                        conversation_id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        avatar: row.get(3)?,
                        last_read_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE participants SET last_read_at = ?3 WHERE conversation_id = ?1 AND user_id = ?2",
                (conversation_id, user_id, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }

    // -- Messages --

    /// Inserts the message with its media and bumps the conversation's
    /// `updated_at`. Returns the message's `created_at`.
    pub fn insert_message(&self, message: &NewMessage<'_>) -> Result<String> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            conn.execute(
                "INSERT INTO messages
                    (id, conversation_id, sender_id, content, reply_to_id, forwarded, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                (
                    message.id,
                    message.conversation_id,
                    message.sender_id,
                    message.content,
                    message.reply_to_id,
                    message.forwarded,
                    &now,
                ),
            )?;
            insert_media(conn, "message_media", "message_id", message.id, &message.media)?;
            conn.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                (message.conversation_id, &now),
            )?;
            Ok(now)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// A page of messages visible to `viewer_id`, newest first. `cursor` is the
    /// id of the oldest message already loaded.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        viewer_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut args: Vec<Value> = vec![
                Value::Text(viewer_id.to_string()),
                Value::Text(conversation_id.to_string()),
                Value::Integer(limit as i64),
            ];
            let cursor_clause = match cursor {
                Some(cursor) => {
                    args.push(Value::Text(cursor.to_string()));
                    "AND (m.created_at, m.rowid) <
                         (SELECT created_at, rowid FROM messages WHERE id = ?4)"
                }
                None => "",
            };

            let sql = format!(
                "{} WHERE m.conversation_id = ?2
                   AND m.deleted_at IS NULL
                   AND {}
                   {}
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?3",
                MESSAGE_SELECT, NOT_HIDDEN_FOR_VIEWER, cursor_clause
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The last `limit` undeleted messages of a conversation, oldest first.
    pub fn recent_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.conversation_id = ?1 AND m.deleted_at IS NULL
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2",
                MESSAGE_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map((conversation_id, limit), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    pub fn media_for_messages(&self, message_ids: &[String]) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| media_for(conn, "message_media", "message_id", message_ids))
    }

    pub fn reply_previews(&self, message_ids: &[String]) -> Result<Vec<ReplyPreviewRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT m.id, m.sender_id, u.name, m.content, m.deleted_at IS NOT NULL,
                        EXISTS(SELECT 1 FROM message_media mm WHERE mm.message_id = m.id)
                 FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.id IN ({})",
                placeholders(1, message_ids.len()),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids), |row| {
                    Ok(ReplyPreviewRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        sender_name: row.get(2)?,
                        content: row.get(3)?,
                        deleted: row.get(4)?,
                        has_media: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Adds `user_id` to the message's hide list. No-op if already there.
    pub fn hide_message_for(&self, message_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE messages
                 SET deleted_for_user_ids = json_insert(deleted_for_user_ids, '$[#]', ?2),
                     updated_at = ?3
                 WHERE id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM json_each(messages.deleted_for_user_ids)
                       WHERE json_each.value = ?2
                   )",
                (message_id, user_id, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn delete_message_for_everyone(&self, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            let updated = conn.execute(
                "UPDATE messages SET deleted_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND deleted_at IS NULL",
                (message_id, &now),
            )?;
            Ok(updated == 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db, user};
    use crate::Database;
    use crate::models::{NewGroup, NewMedia, NewMessage};

    fn send(db: &Database, conversation_id: &str, sender: &str, text: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.insert_message(&NewMessage {
            id: &id,
            conversation_id,
            sender_id: sender,
            content: Some(text),
            media: vec![],
            reply_to_id: None,
            forwarded: false,
        })
        .unwrap();
        id
    }

    fn unread(db: &Database, conversation_id: &str, user_id: &str) -> i64 {
        db.unread_counts(&[conversation_id.to_string()], user_id)
            .unwrap()
            .first()
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    #[test]
    fn test_private_conversation_is_deduplicated() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");

        let (first, created) = db.get_or_create_private("c1", &x, &y).unwrap();
        assert_eq!((first.as_str(), created), ("c1", true));

        let (again, created) = db.get_or_create_private("c2", &x, &y).unwrap();
        assert_eq!((again.as_str(), created), ("c1", false));

        // Either side finds the same conversation.
        let (reverse, created) = db.get_or_create_private("c3", &y, &x).unwrap();
        assert_eq!((reverse.as_str(), created), ("c1", false));
        assert!(db.get_conversation("c2").unwrap().is_none());
    }

    #[test]
    fn test_groups_are_never_deduplicated() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");

        for id in ["g1", "g2"] {
            db.create_group(&NewGroup {
                id,
                name: Some("study"),
                avatar: None,
                created_by: &x,
                participant_ids: vec![x.as_str(), y.as_str()],
            })
            .unwrap();
        }
        let listed = db.list_conversations(&x, 10, None).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(db.participant_ids("g1").unwrap(), vec![x.clone(), y.clone()]);
    }

    #[test]
    fn test_send_bumps_recency_and_last_message() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        let z = user(&db, "z");
        db.get_or_create_private("xy", &x, &y).unwrap();
        db.get_or_create_private("xz", &x, &z).unwrap();

        send(&db, "xy", &y, "hello");
        let listed = db.list_conversations(&x, 10, None).unwrap();
        assert_eq!(listed[0].id, "xy");

        let latest = send(&db, "xz", &z, "newer");
        let listed = db.list_conversations(&x, 10, None).unwrap();
        assert_eq!(listed[0].id, "xz");

        let last = db.last_messages(&["xy".into(), "xz".into()], &x).unwrap();
        assert_eq!(last.len(), 2);
        let xz = last.iter().find(|m| m.conversation_id == "xz").unwrap();
        assert_eq!(xz.id, latest);
        assert_eq!(xz.content.as_deref(), Some("newer"));

        // Cursor continues after the given conversation.
        let page = db.list_conversations(&x, 10, Some("xz")).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "xy");
    }

    #[test]
    fn test_unread_counts_and_mark_read() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        db.get_or_create_private("xy", &x, &y).unwrap();

        send(&db, "xy", &y, "one");
        send(&db, "xy", &y, "two");
        send(&db, "xy", &x, "mine");

        assert_eq!(unread(&db, "xy", &x), 2);
        assert_eq!(unread(&db, "xy", &y), 1);
        assert_eq!(db.total_unread(&x).unwrap(), 2);

        assert!(db.mark_read("xy", &x).unwrap());
        assert_eq!(unread(&db, "xy", &x), 0);

        send(&db, "xy", &y, "three");
        assert_eq!(unread(&db, "xy", &x), 1);
    }

    #[test]
    fn test_unread_skips_messages_deleted_for_everyone() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        db.get_or_create_private("xy", &x, &y).unwrap();

        send(&db, "xy", &y, "kept");
        let retracted = send(&db, "xy", &y, "oops");
        assert_eq!(unread(&db, "xy", &x), 2);

        assert!(db.delete_message_for_everyone(&retracted).unwrap());
        assert_eq!(unread(&db, "xy", &x), 1);
        assert_eq!(db.total_unread(&x).unwrap(), 1);
    }

    #[test]
    fn test_hidden_and_deleted_messages() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        db.get_or_create_private("xy", &x, &y).unwrap();

        let kept = send(&db, "xy", &x, "kept");
        let hidden = send(&db, "xy", &x, "hidden for y");
        let gone = send(&db, "xy", &x, "gone");

        assert!(db.hide_message_for(&hidden, &y).unwrap());
        assert!(!db.hide_message_for(&hidden, &y).unwrap());
        assert!(db.delete_message_for_everyone(&gone).unwrap());

        let ids = |viewer: &str| -> Vec<String> {
            db.list_messages("xy", viewer, 50, None)
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect()
        };
        assert_eq!(ids(&y), vec![kept.clone()]);
        assert_eq!(ids(&x), vec![hidden.clone(), kept.clone()]);

        let last_for_y = db.last_messages(&["xy".into()], &y).unwrap();
        assert_eq!(last_for_y[0].id, kept);
    }

    #[test]
    fn test_message_cursor_and_media() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        db.get_or_create_private("xy", &x, &y).unwrap();

        let ids: Vec<String> = (0..5).map(|i| send(&db, "xy", &x, &format!("m{}", i))).collect();
        let page = db.list_messages("xy", &y, 2, Some(&ids[3])).unwrap();
        assert_eq!(page.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), vec![ids[2].clone(), ids[1].clone()]);

        db.insert_message(&NewMessage {
            id: "pic",
            conversation_id: "xy",
            sender_id: &y,
            content: None,
            media: vec![NewMedia { url: "/uploads/1.jpg", media_type: "image/jpeg" }],
            reply_to_id: Some(ids[0].as_str()),
            forwarded: true,
        })
        .unwrap();
        let message = db.get_message("pic").unwrap().unwrap();
        assert!(message.forwarded);
        assert_eq!(message.reply_to_id.as_deref(), Some(ids[0].as_str()));
        assert_eq!(db.media_for_messages(&["pic".into()]).unwrap().len(), 1);

        let previews = db.reply_previews(&[ids[0].clone()]).unwrap();
        assert_eq!(previews[0].content.as_deref(), Some("m0"));
        assert!(!previews[0].deleted);

        let recent = db.recent_messages("xy", 3).unwrap();
        assert_eq!(recent.last().unwrap().id, "pic");
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn test_add_and_remove_participants() {
        let db = db();
        let x = user(&db, "x");
        let y = user(&db, "y");
        db.create_group(&NewGroup {
            id: "g",
            name: Some("g"),
            avatar: None,
            created_by: &x,
            participant_ids: vec![x.as_str()],
        })
        .unwrap();

        assert_eq!(db.add_participants("g", &[y.clone(), x.clone()]).unwrap(), 1);
        assert!(db.is_participant("g", &y).unwrap());
        assert!(db.remove_participant("g", &y).unwrap());
        assert!(!db.is_participant("g", &y).unwrap());
    }
}
