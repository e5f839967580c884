use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct LikeStore {
    pool: SqlitePool,
}

/// Errors from like writes.
#[derive(Debug)]
pub enum LikeError {
    /// The (blog, user) pair is already present. The unique constraint is
    /// the source of truth; there is no separate read-then-write check.
    AlreadyLiked,
    /// Underlying database failure
    Database(sqlx::Error),
}

impl std::fmt::Display for LikeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LikeError::AlreadyLiked => write!(f, "Blog already liked by this user"),
            LikeError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for LikeError {}

impl From<sqlx::Error> for LikeError {
    fn from(e: sqlx::Error) -> Self {
        if e.as_database_error()
            .is_some_and(|d| d.is_unique_violation())
        {
            LikeError::AlreadyLiked
        } else {
            LikeError::Database(e)
        }
    }
}

impl LikeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a like. Fails with [`LikeError::AlreadyLiked`] if the user
    /// already liked this blog.
    pub async fn create(&self, blog_id: i64, user_id: i64) -> Result<i64, LikeError> {
        let result = sqlx::query("INSERT INTO likes (blog_id, user_id) VALUES (?, ?)")
            .bind(blog_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Remove a like. Returns false if it was absent.
    pub async fn delete(&self, blog_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM likes WHERE blog_id = ? AND user_id = ?")
            .bind(blog_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a blog's likes.
    pub async fn count_by_blog(&self, blog_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE blog_id = ?")
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BlogStatus, Database, UserRole};

    async fn db_with_blog() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("user-1", "alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        let blog_id = db
            .blogs()
            .create("blog-1", user_id, "A Post", "a-post", "Some content here.", BlogStatus::Published)
            .await
            .unwrap();
        (db, user_id, blog_id)
    }

    #[tokio::test]
    async fn test_like_unlike_cycle() {
        let (db, user_id, blog_id) = db_with_blog().await;
        let likes = db.likes();

        likes.create(blog_id, user_id).await.unwrap();
        assert_eq!(likes.count_by_blog(blog_id).await.unwrap(), 1);

        assert!(likes.delete(blog_id, user_id).await.unwrap());
        assert_eq!(likes.count_by_blog(blog_id).await.unwrap(), 0);
        assert!(!likes.delete(blog_id, user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_double_like_rejected() {
        let (db, user_id, blog_id) = db_with_blog().await;
        let likes = db.likes();

        likes.create(blog_id, user_id).await.unwrap();
        let result = likes.create(blog_id, user_id).await;

        assert!(matches!(result, Err(LikeError::AlreadyLiked)));
        assert_eq!(likes.count_by_blog(blog_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_blog_cascades_to_likes() {
        let (db, user_id, blog_id) = db_with_blog().await;

        db.likes().create(blog_id, user_id).await.unwrap();
        db.blogs().delete_by_slug("a-post").await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
