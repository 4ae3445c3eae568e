use anyhow::Result;

use crate::models::{NewReport, ReportRow};
use crate::{Database, clock};

impl Database {
    pub fn create_report(&self, report: &NewReport<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter_id, target_type, target_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    report.id,
                    report.reporter_id,
                    report.target_type,
                    report.target_id,
                    report.reason,
                    clock::now(),
                ),
            )?;
            Ok(())
        })
    }

    /// Newest first, optionally filtered by status.
    pub fn list_reports(&self, status: Option<&str>) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.reporter_id, u.name, pr.avatar, r.target_type, r.target_id, r.reason,
                        r.status, r.created_at, r.resolved_at
                 FROM reports r
                 LEFT JOIN users u ON u.id = r.reporter_id
                 LEFT JOIN profiles pr ON pr.user_id = r.reporter_id
                 WHERE ?1 IS NULL OR r.status = ?1
                 ORDER BY r.created_at DESC",
            )?;
            let rows = stmt
                .query_map([status], |row| {
                    Ok(ReportRow {
                        id: row.get(0)?,
                        reporter_id: row.get(1)?,
                        reporter_name: row.get(2)?,
                        reporter_avatar: row.get(3)?,
                        target_type: row.get(4)?,
                        target_id: row.get(5)?,
                        reason: row.get(6)?,
                        status: row.get(7)?,
                        created_at: row.get(8)?,
                        resolved_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn resolve_report(&self, id: &str, status: &str, resolved_by: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE reports SET status = ?2, resolved_by = ?3, resolved_at = ?4 WHERE id = ?1",
                (id, status, resolved_by, clock::now()),
            )?;
            Ok(updated == 1)
        })
    }
}
