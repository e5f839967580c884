//! Refresh token ledger.
//!
//! Only refresh tokens are persisted; access tokens are stateless and
//! simply expire. A ledger row exists for every live refresh token and is
//! removed on logout, by the scheduled expiry sweep, or by cascade when
//! the owning user is deleted. Expired rows that the sweep has not reached
//! yet are already invisible to `exists`, so the refresh flow never has to
//! special-case expiry.

use sqlx::sqlite::SqlitePool;

/// Store managing live refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

/// Errors from ledger writes.
#[derive(Debug)]
pub enum LedgerError {
    /// The token string is already present. Should not happen with
    /// cryptographically generated tokens, but the uniqueness constraint
    /// is enforced regardless.
    DuplicateToken,
    /// Underlying database failure
    Database(sqlx::Error),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::DuplicateToken => write!(f, "Refresh token already exists"),
            LedgerError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if e.as_database_error()
            .is_some_and(|d| d.is_unique_violation())
        {
            LedgerError::DuplicateToken
        } else {
            LedgerError::Database(e)
        }
    }
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new refresh token record. `expires_at` is a Unix timestamp.
    pub async fn create(
        &self,
        token: &str,
        user_id: i64,
        expires_at: u64,
    ) -> Result<i64, LedgerError> {
        let expires_at_str = timestamp_to_datetime(expires_at);

        let result =
            sqlx::query("INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
                .bind(token)
                .bind(user_id)
                .bind(&expires_at_str)
                .execute(&self.pool)
                .await?;

        Ok(result.last_insert_rowid())
    }

    /// Pure presence probe used by the refresh flow. Expired rows are
    /// invisible even before the sweep physically removes them.
    pub async fn exists(&self, token: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens WHERE token = ? AND expires_at > datetime('now')",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Delete a token record (logout). Returns false if it was absent,
    /// which is not an error.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Physically purge all expired token records.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all tokens for a user (account deletion, logout everywhere).
    pub async fn delete_all_by_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count live tokens for a user.
    pub async fn count_by_user(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ? AND expires_at > datetime('now')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
pub(crate) fn timestamp_to_datetime(timestamp: u64) -> String {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
