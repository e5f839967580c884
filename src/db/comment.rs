use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

/// A comment joined with its author's username.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Comment {
    #[serde(skip_serializing)]
    pub id: i64,
    pub uuid: String,
    #[serde(skip_serializing)]
    pub blog_id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    uuid: String,
    blog_id: i64,
    user_id: i64,
    author: String,
    content: String,
    created_at: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            blog_id: row.blog_id,
            user_id: row.user_id,
            author: row.author,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

const COMMENT_COLUMNS: &str =
    "c.id, c.uuid, c.blog_id, c.user_id, u.username AS author, c.content, c.created_at";

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new comment. Returns the comment ID.
    pub async fn create(
        &self,
        uuid: &str,
        blog_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO comments (uuid, blog_id, user_id, content) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(blog_id)
        .bind(user_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a comment by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Comment>, sqlx::Error> {
        let row: Option<CommentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.uuid = ?",
            COMMENT_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Comment::from))
    }

    /// List a blog's comments, newest first.
    pub async fn list_by_blog(&self, blog_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.blog_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_COLUMNS
        ))
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// Delete a comment by UUID. Returns false if it was absent.
    pub async fn delete_by_uuid(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a blog's comments.
    pub async fn count_by_blog(&self, blog_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE blog_id = ?")
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
