use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Errors from user writes.
#[derive(Debug)]
pub enum UserError {
    /// The email or username collides with an existing account. Surfaced
    /// from the unique constraint so concurrent writers cannot slip past a
    /// prior existence check.
    Duplicate,
    /// Underlying database failure
    Database(sqlx::Error),
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserError::Duplicate => write!(f, "Email or username already taken"),
            UserError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for UserError {}

impl From<sqlx::Error> for UserError {
    fn from(e: sqlx::Error) -> Self {
        if e.as_database_error()
            .is_some_and(|d| d.is_unique_violation())
        {
            UserError::Duplicate
        } else {
            UserError::Database(e)
        }
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// A user record. Never carries the password hash; handlers can serialize
/// this without leaking credentials.
#[derive(Debug, Clone, serde::Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    role: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            role: UserRole::from_str(&row.role),
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.created_at,
        }
    }
}

/// User record joined with the password hash, used by the login flow only.
#[derive(Debug, Clone)]
pub struct LoginUser {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
}

const USER_COLUMNS: &str =
    "id, uuid, username, email, role, first_name, last_name, created_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    /// Fails with [`UserError::Duplicate`] if the email or username is taken.
    pub async fn create(
        &self,
        uuid: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<i64, UserError> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, password_hash, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email (without the password hash).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE uuid = ?",
            USER_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user's current role by UUID. Used by the authorization layer,
    /// which re-fetches the role on every request instead of trusting a
    /// claim baked into the token.
    pub async fn get_role_by_uuid(&self, uuid: &str) -> Result<Option<UserRole>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(role,)| UserRole::from_str(&role)))
    }

    /// Look up a user by email including the password hash, for login.
    pub async fn get_login_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<LoginUser>, sqlx::Error> {
        let row: Option<(i64, String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, uuid, username, email, role, password_hash FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, uuid, username, email, role, password_hash)| LoginUser {
                id,
                uuid,
                username,
                email,
                role: UserRole::from_str(&role),
                password_hash,
            },
        ))
    }

    /// Partially update a user. `None` fields keep their current value.
    /// Returns false if the user does not exist.
    pub async fn update(
        &self,
        uuid: &str,
        username: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<bool, UserError> {
        let result = sqlx::query(
            "UPDATE users SET \
                username = COALESCE(?, username), \
                email = COALESCE(?, email), \
                password_hash = COALESCE(?, password_hash), \
                first_name = COALESCE(?, first_name), \
                last_name = COALESCE(?, last_name) \
             WHERE uuid = ?",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check whether an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Delete a user by UUID. Cascades to the user's refresh tokens and blogs.
    pub async fn delete_by_uuid(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users, oldest first.
    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
