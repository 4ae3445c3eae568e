mod admin;
mod auth_tokens;
mod chat;
mod comments;
mod feed;
mod memories;
mod notifications;
mod reactions;
mod reports;
mod users;

use anyhow::Result;
use rusqlite::Row;

use crate::models::{MediaRow, NewMedia, UserSummaryRow};

/// `?{start}, ?{start+1}, ...` for `n` numbered parameters.
pub(crate) fn placeholders(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn insert_media(
    conn: &rusqlite::Connection,
    table: &str,
    owner_column: &str,
    owner_id: &str,
    media: &[NewMedia<'_>],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} ({}, position, url, media_type) VALUES (?1, ?2, ?3, ?4)",
        table, owner_column
    );
    let mut stmt = conn.prepare(&sql)?;
    for (position, m) in media.iter().enumerate() {
        stmt.execute(rusqlite::params![owner_id, position as i64, m.url, m.media_type])?;
    }
    Ok(())
}

pub(crate) fn media_for(
    conn: &rusqlite::Connection,
    table: &str,
    owner_column: &str,
    owner_ids: &[String],
) -> Result<Vec<MediaRow>> {
    if owner_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {col}, url, media_type FROM {table} WHERE {col} IN ({}) ORDER BY {col}, position",
        placeholders(1, owner_ids.len()),
        col = owner_column,
        table = table,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(owner_ids), |row| {
            Ok(MediaRow {
                owner_id: row.get(0)?,
                url: row.get(1)?,
                media_type: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub(crate) fn summary_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        avatar: row.get(offset + 2)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Database;
    use crate::models::NewUser;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    /// Creates a user whose id, college id and email derive from `name`.
    pub fn user(db: &Database, name: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let email = format!("{}@uni.example", name);
        db.create_user(&NewUser {
            id: &id,
            name,
            college_id: &format!("c-{}", name),
            email: &email,
            password_hash: "hash",
        })
        .unwrap();
        id
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(super::placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(super::placeholders(2, 1), "?2");
    }
}
