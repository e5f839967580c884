mod blog;
mod comment;
mod like;
mod token;
mod user;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub use blog::{Blog, BlogStatus, BlogStore};
pub use comment::{Comment, CommentStore};
pub use like::{LikeError, LikeStore};
pub use token::{LedgerError, RefreshTokenStore};
pub use user::{LoginUser, User, UserError, UserRole, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = if path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        // Cascade deletes from users to refresh_tokens and blogs rely on
        // foreign key enforcement being switched on per connection.
        let options = options.foreign_keys(true);

        // In-memory databases exist per connection, so the pool must not
        // open a second one.
        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table. The password hash never leaves the login
                // query, so it gets its own column rather than a row type.
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    first_name TEXT,
                    last_name TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_email ON users(email)",
                // Refresh token ledger. Rows are removed on logout, by the
                // expiry sweep, or by cascade when the owning user goes away.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token TEXT UNIQUE NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_refresh_tokens_token ON refresh_tokens(token)",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
                // Blogs table
                "CREATE TABLE blogs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    slug TEXT UNIQUE NOT NULL,
                    content TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'draft',
                    views INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_blogs_slug ON blogs(slug)",
                "CREATE INDEX idx_blogs_author_id ON blogs(author_id)",
                "CREATE INDEX idx_blogs_status ON blogs(status)",
                // Comments on blogs. Rows go away with the blog or the author.
                "CREATE TABLE comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    blog_id INTEGER NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_blog_id ON comments(blog_id)",
                "CREATE INDEX idx_comments_user_id ON comments(user_id)",
                // Likes. The unique pair makes double-liking a constraint
                // violation rather than a read-then-write race.
                "CREATE TABLE likes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    blog_id INTEGER NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(blog_id, user_id)
                )",
                "CREATE INDEX idx_likes_blog_id ON likes(blog_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token ledger.
    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the blog store.
    pub fn blogs(&self) -> BlogStore {
        BlogStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the like store.
    pub fn likes(&self) -> LikeStore {
        LikeStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("uuid-123", "alice", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.uuid, "uuid-123");
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, UserRole::User);

        let user = db.users().get_by_uuid("uuid-123").await.unwrap().unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        let result = db
            .users()
            .create("uuid-2", "bob", "a@x.com", "hash", UserRole::User)
            .await;

        // The constraint violation maps to a distinct variant so handlers
        // can report a conflict instead of a server error.
        assert!(matches!(result, Err(UserError::Duplicate)));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_unset_fields() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();

        let updated = db
            .users()
            .update("uuid-1", None, None, None, Some("Alice"), None)
            .await
            .unwrap();
        assert!(updated);

        let user = db.users().get_by_uuid("uuid-1").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.first_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_update_to_taken_email_is_duplicate() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        db.users()
            .create("uuid-2", "bob", "b@x.com", "hash", UserRole::User)
            .await
            .unwrap();

        let result = db
            .users()
            .update("uuid-2", None, Some("a@x.com"), None, None, None)
            .await;
        assert!(matches!(result, Err(UserError::Duplicate)));
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("Alice@Example.COM")
            .await
            .unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_ledger() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("uuid-1", "alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        db.refresh_tokens()
            .create("some-token", id, far_future())
            .await
            .unwrap();
        assert!(db.refresh_tokens().exists("some-token").await.unwrap());

        db.users().delete_by_uuid("uuid-1").await.unwrap();
        assert!(!db.refresh_tokens().exists("some-token").await.unwrap());
    }

    fn far_future() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600
    }
}
