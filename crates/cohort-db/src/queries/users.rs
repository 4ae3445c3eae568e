use anyhow::Result;
use rusqlite::Connection;

use super::{OptionalExt, placeholders, summary_from_row};
use crate::models::{NewUser, ProfileRow, ProfileUpdate, UserRow, UserSummaryRow};
use crate::{Database, clock};

const USER_COLUMNS: &str = "id, name, college_id, email, password, role, banned_at, created_at";

impl Database {
    /// Inserts the user together with an empty profile.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            conn.execute(
                "INSERT INTO users (id, name, college_id, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                (user.id, user.name, user.college_id, user.email, user.password_hash, &now),
            )?;
            conn.execute(
                "INSERT INTO profiles (user_id, updated_at) VALUES (?1, ?2)",
                (user.id, &now),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Looks a user up by email or college id.
    pub fn get_user_by_login(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1 OR college_id = ?1", identifier))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    /// Login accepts either column, so each value is checked against both.
    pub fn email_or_college_id_taken(&self, email: &str, college_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users
                               WHERE email IN (?1, ?2) OR college_id IN (?1, ?2))",
                (email, college_id),
                |row| row.get(0),
            )?;
            Ok(taken)
        })
    }

    pub fn update_password(&self, user_id: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                (user_id, password_hash, clock::now()),
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.name, u.college_id, u.role, p.bio, p.avatar, p.cover, p.location,
                        p.website, u.created_at,
                        (SELECT COUNT(*) FROM posts WHERE author_id = u.id AND hidden = 0)
                 FROM users u
                 LEFT JOIN profiles p ON p.user_id = u.id
                 WHERE u.id = ?1",
                [user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        college_id: row.get(2)?,
                        role: row.get(3)?,
                        bio: row.get(4)?,
                        avatar: row.get(5)?,
                        cover: row.get(6)?,
                        location: row.get(7)?,
                        website: row.get(8)?,
                        created_at: row.get(9)?,
                        post_count: row.get(10)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Applies the fields that are `Some`, leaving the rest untouched.
    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            if let Some(name) = update.name {
                conn.execute(
                    "UPDATE users SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    (user_id, name, &now),
                )?;
            }
            conn.execute(
                "UPDATE profiles SET
                    bio = COALESCE(?2, bio),
                    avatar = COALESCE(?3, avatar),
                    cover = COALESCE(?4, cover),
                    location = COALESCE(?5, location),
                    website = COALESCE(?6, website),
                    updated_at = ?7
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id,
                    update.bio,
                    update.avatar,
                    update.cover,
                    update.location,
                    update.website,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Name and avatar for each id that exists.
    pub fn user_summaries(&self, ids: &[String]) -> Result<Vec<UserSummaryRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.name, p.avatar FROM users u
                 LEFT JOIN profiles p ON p.user_id = u.id
                 WHERE u.id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids), |row| summary_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, condition: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
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
    })
    .optional()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{db, user};
    use crate::models::ProfileUpdate;

    #[test]
    fn test_login_by_email_or_college_id() {
        let db = db();
        let id = user(&db, "mona");

        let by_email = db.get_user_by_login("mona@uni.example").unwrap().unwrap();
        let by_college = db.get_user_by_login("c-mona").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_college.id, id);
        assert!(db.get_user_by_login("nobody").unwrap().is_none());
        assert!(db.email_or_college_id_taken("x@y", "c-mona").unwrap());
        assert!(!db.email_or_college_id_taken("x@y", "c-x").unwrap());
    }

    #[test]
    fn test_identifiers_taken_across_columns() {
        let db = db();
        user(&db, "mona");

        // A new college id equal to an existing email, and the reverse.
        assert!(db.email_or_college_id_taken("new@uni.example", "mona@uni.example").unwrap());
        assert!(db.email_or_college_id_taken("c-mona", "c-new").unwrap());
    }

    #[test]
    fn test_partial_profile_update() {
        let db = db();
        let id = user(&db, "omar");

        db.update_profile(&id, &ProfileUpdate { bio: Some("hi"), ..Default::default() })
            .unwrap();
        db.update_profile(
            &id,
            &ProfileUpdate { name: Some("Omar A."), location: Some("Cairo"), ..Default::default() },
        )
        .unwrap();

        let profile = db.get_profile(&id).unwrap().unwrap();
        assert_eq!(profile.name, "Omar A.");
        assert_eq!(profile.bio.as_deref(), Some("hi"));
        assert_eq!(profile.location.as_deref(), Some("Cairo"));
        assert_eq!(profile.post_count, 0);
    }
}
