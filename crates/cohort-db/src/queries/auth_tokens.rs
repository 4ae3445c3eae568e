use anyhow::Result;

use super::OptionalExt;
use crate::{Database, clock};

impl Database {
    // -- Email verification --

    /// Stores a fresh code for `email`, replacing any previous one and
    /// clearing an earlier verification.
    pub fn upsert_email_verification(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO email_verifications (email, code_hash, expires_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET
                    code_hash = excluded.code_hash,
                    expires_at = excluded.expires_at,
                    verified_at = NULL",
                (email, code_hash, expires_at),
            )?;
            Ok(())
        })
    }

    /// Marks the email verified if the code matches and has not expired.
    pub fn verify_email_code(&self, email: &str, code_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            let updated = conn.execute(
                "UPDATE email_verifications SET verified_at = ?3
                 WHERE email = ?1 AND code_hash = ?2 AND expires_at > ?3",
                (email, code_hash, &now),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn is_email_verified(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let verified: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM email_verifications
                               WHERE email = ?1 AND verified_at IS NOT NULL)",
                [email],
                |row| row.get(0),
            )?;
            Ok(verified)
        })
    }

    // -- Password reset --

    pub fn create_password_reset(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (token_hash, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Marks an unexpired, unused reset token as used and returns its user id.
    pub fn consume_password_reset(&self, token_hash: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let now = clock::now();
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM password_resets
                     WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2",
                    (token_hash, &now),
                    |row| row.get(0),
                )
                .optional()?;

            if user_id.is_some() {
                conn.execute(
                    "UPDATE password_resets SET used_at = ?2 WHERE token_hash = ?1",
                    (token_hash, &now),
                )?;
            }
            Ok(user_id)
        })
    }
}
