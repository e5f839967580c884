use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct BlogStore {
    pool: SqlitePool,
}

/// Publication status of a blog post. Drafts are visible to admins only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "published" => BlogStatus::Published,
            _ => BlogStatus::Draft,
        }
    }
}

/// A blog post joined with its author's username.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Blog {
    #[serde(skip_serializing)]
    pub id: i64,
    pub uuid: String,
    #[serde(skip_serializing)]
    pub author_id: i64,
    pub author: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: BlogStatus,
    pub views: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct BlogRow {
    id: i64,
    uuid: String,
    author_id: i64,
    author: String,
    title: String,
    slug: String,
    content: String,
    status: String,
    views: i64,
    created_at: String,
    updated_at: String,
}

impl From<BlogRow> for Blog {
    fn from(row: BlogRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            author_id: row.author_id,
            author: row.author,
            title: row.title,
            slug: row.slug,
            content: row.content,
            status: BlogStatus::from_str(&row.status),
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BLOG_COLUMNS: &str = "b.id, b.uuid, b.author_id, u.username AS author, b.title, b.slug, \
     b.content, b.status, b.views, b.created_at, b.updated_at";

impl BlogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new blog post. Returns the blog ID.
    pub async fn create(
        &self,
        uuid: &str,
        author_id: i64,
        title: &str,
        slug: &str,
        content: &str,
        status: BlogStatus,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO blogs (uuid, author_id, title, slug, content, status) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(author_id)
        .bind(title)
        .bind(slug)
        .bind(content)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a blog post by slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>, sqlx::Error> {
        let row: Option<BlogRow> = sqlx::query_as(&format!(
            "SELECT {} FROM blogs b JOIN users u ON u.id = b.author_id WHERE b.slug = ?",
            BLOG_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Blog::from))
    }

    /// Get a blog post by UUID. Comment and like routes address blogs by
    /// UUID rather than slug.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Blog>, sqlx::Error> {
        let row: Option<BlogRow> = sqlx::query_as(&format!(
            "SELECT {} FROM blogs b JOIN users u ON u.id = b.author_id WHERE b.uuid = ?",
            BLOG_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Blog::from))
    }

    /// Partially update a blog post. `None` fields keep their current
    /// value; `updated_at` is bumped either way. Returns false if the slug
    /// does not exist.
    pub async fn update(
        &self,
        slug: &str,
        title: Option<&str>,
        content: Option<&str>,
        status: Option<BlogStatus>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE blogs SET \
                title = COALESCE(?, title), \
                content = COALESCE(?, content), \
                status = COALESCE(?, status), \
                updated_at = datetime('now') \
             WHERE slug = ?",
        )
        .bind(title)
        .bind(content)
        .bind(status.map(|s| s.as_str()))
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a blog post by slug. Cascades to its comments and likes.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blogs WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump the view counter. Returns the new count, or None for an
    /// unknown slug.
    pub async fn increment_views(&self, slug: &str) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE blogs SET views = views + 1 WHERE slug = ? RETURNING views",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(views,)| views))
    }

    /// List blog posts, newest first. `include_drafts` is set for admin
    /// callers only.
    pub async fn list(
        &self,
        include_drafts: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Blog>, sqlx::Error> {
        let status_filter = if include_drafts {
            ""
        } else {
            "WHERE b.status = 'published'"
        };

        let rows: Vec<BlogRow> = sqlx::query_as(&format!(
            "SELECT {} FROM blogs b JOIN users u ON u.id = b.author_id {} \
             ORDER BY b.created_at DESC LIMIT ? OFFSET ?",
            BLOG_COLUMNS, status_filter
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Blog::from).collect())
    }

    /// Count blog posts matching the same filter as [`BlogStore::list`].
    pub async fn count(&self, include_drafts: bool) -> Result<i64, sqlx::Error> {
        let query = if include_drafts {
            "SELECT COUNT(*) FROM blogs"
        } else {
            "SELECT COUNT(*) FROM blogs WHERE status = 'published'"
        };
        let count: (i64,) = sqlx::query_as(query).fetch_one(&self.pool).await?;
        Ok(count.0)
    }
}
