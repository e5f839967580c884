//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "QuillStack", about = "Blogging platform API server")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "quillstack.db")]
    pub database: String,

    /// Browser client origin allowed by CORS
    #[arg(long, default_value = "http://localhost:5173")]
    pub client_origin: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_TTL.as_secs())]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_TTL.as_secs())]
    pub refresh_ttl_secs: u64,

    /// Emails allowed to register with the admin role (comma separated)
    #[arg(long, env = "QUILLSTACK_ADMIN_EMAILS", value_delimiter = ',')]
    pub admin_emails: Vec<String>,

    /// Path to file containing the access token secret.
    /// Prefer using the QUILLSTACK_ACCESS_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret.
    /// Prefer using the QUILLSTACK_REFRESH_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Set the Secure flag on cookies even for a non-HTTPS client origin
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a token secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "Token secret is required. Set the {} environment variable (recommended) or use the corresponding --*-secret-file flag",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "Token secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both token secrets and reject identical values; reusing one secret
/// for both classes would make them interchangeable.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret("QUILLSTACK_ACCESS_SECRET", args.access_secret_file.as_deref())?;
    let refresh = load_secret(
        "QUILLSTACK_REFRESH_SECRET",
        args.refresh_secret_file.as_deref(),
    )?;

    if access == refresh {
        error!("Access and refresh token secrets must be different");
        return None;
    }

    Some((access, refresh))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    let secure_cookies = args.secure_cookies || args.client_origin.starts_with("https://");

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_ttl: Duration::from_secs(args.access_ttl_secs),
        refresh_ttl: Duration::from_secs(args.refresh_ttl_secs),
        admin_emails: args
            .admin_emails
            .iter()
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        client_origin: args.client_origin.clone(),
        secure_cookies,
        rate_limits: RateLimitConfig::new(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
