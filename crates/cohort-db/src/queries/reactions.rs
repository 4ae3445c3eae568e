use anyhow::Result;

use cohort_types::models::{ReactionAction, ReactionKind, ReactionTarget};

use super::{OptionalExt, placeholders};
use crate::models::ReactionRow;
use crate::{Database, clock};

/// (table, target id column) holding reactions for `target`.
fn reaction_table(target: ReactionTarget) -> (&'static str, &'static str) {
    match target {
        ReactionTarget::Post => ("post_reactions", "post_id"),
        ReactionTarget::Comment => ("comment_reactions", "comment_id"),
        ReactionTarget::Message => ("message_reactions", "message_id"),
    }
}

impl Database {
    /// One reaction per (target, user): inserts when absent, removes when the
    /// same kind is sent again, otherwise switches the existing row's kind.
    pub fn toggle_reaction(
        &self,
        target: ReactionTarget,
        target_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<ReactionAction> {
        let (table, column) = reaction_table(target);

        self.with_conn_mut(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    &format!("SELECT kind FROM {} WHERE {} = ?1 AND user_id = ?2", table, column),
                    (target_id, user_id),
                    |row| row.get(0),
                )
                .optional()?;

            let now = clock::now();
            let action = match existing {
                None => {
                    conn.execute(
                        &format!(
                            "INSERT INTO {} ({}, user_id, kind, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?4)",
                            table, column
                        ),
                        (target_id, user_id, kind.as_str(), &now),
                    )?;
                    ReactionAction::Added
                }
                Some(current) if current == kind.as_str() => {
                    conn.execute(
                        &format!("DELETE FROM {} WHERE {} = ?1 AND user_id = ?2", table, column),
                        (target_id, user_id),
                    )?;
                    ReactionAction::Removed
                }
                Some(_) => {
                    conn.execute(
                        &format!(
                            "UPDATE {} SET kind = ?3, updated_at = ?4 WHERE {} = ?1 AND user_id = ?2",
                            table, column
                        ),
                        (target_id, user_id, kind.as_str(), &now),
                    )?;
                    ReactionAction::Updated
                }
            };
            Ok(action)
        })
    }

    /// Batch-fetch reactions for a set of targets of one type.
    pub fn reactions_for(&self, target: ReactionTarget, target_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }
        let (table, column) = reaction_table(target);

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {col}, user_id, kind FROM {table} WHERE {col} IN ({}) ORDER BY created_at",
                placeholders(1, target_ids.len()),
                col = column,
                table = table,
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(target_ids), |row| {
                    Ok(ReactionRow {
                        target_id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use cohort_types::models::{ReactionAction, ReactionKind, ReactionTarget};

    use super::super::test_support::{db, user};
    use crate::models::NewPost;

    #[test]
    fn test_toggle_off_then_switch_kind() {
        let db = db();
        let author = user(&db, "yara");
        let reader = user(&db, "adam");
        db.create_post(&NewPost { id: "p1", author_id: &author, content: Some("x"), media: vec![] })
            .unwrap();

        let react = |db: &crate::Database, kind| db.toggle_reaction(ReactionTarget::Post, "p1", &reader, kind).unwrap();

        assert_eq!(react(&db, ReactionKind::Heart), ReactionAction::Added);
        assert_eq!(react(&db, ReactionKind::Heart), ReactionAction::Removed);
        assert!(db.reactions_for(ReactionTarget::Post, &["p1".into()]).unwrap().is_empty());

        assert_eq!(react(&db, ReactionKind::Heart), ReactionAction::Added);
        assert_eq!(react(&db, ReactionKind::Laugh), ReactionAction::Updated);

        let rows = db.reactions_for(ReactionTarget::Post, &["p1".into()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "laugh");
    }

    #[test]
    fn test_reactions_are_per_user() {
        let db = db();
        let a = user(&db, "a");
        let b = user(&db, "b");
        db.create_post(&NewPost { id: "p1", author_id: &a, content: Some("x"), media: vec![] })
            .unwrap();

        db.toggle_reaction(ReactionTarget::Post, "p1", &a, ReactionKind::Like).unwrap();
        db.toggle_reaction(ReactionTarget::Post, "p1", &b, ReactionKind::Like).unwrap();
        db.toggle_reaction(ReactionTarget::Comment, "missing", &b, ReactionKind::Like)
            .expect_err("comment must exist");

        assert_eq!(db.reactions_for(ReactionTarget::Post, &["p1".into()]).unwrap().len(), 2);
    }
}
