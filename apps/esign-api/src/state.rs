//! Application state for the eSignature API

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use email_relay::RelayClient;
use esign_core::NotificationChannel;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::ApiConfig;

pub struct AppState {
    pub db: SqlitePool,
    pub config: ApiConfig,
    /// Delivery channel used by dispatch runs
    pub channel: Arc<dyn NotificationChannel>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self> {
        // Get database path from config or use default
        let db_path = config.database_url.clone().unwrap_or_else(|| {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("esign-api");
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/esign.db?mode=rwc", data_dir.display())
        });

        tracing::info!("Connecting to database: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_path)
            .await?;

        if config.relay_url.is_none() {
            tracing::warn!("RELAY_URL is not set; dispatch runs will report the relay as unavailable");
        }
        let channel = Arc::new(RelayClient::new(
            config.relay_url.clone(),
            config.relay_api_key.clone(),
        ));

        Self::with_pool(pool, config, channel).await
    }

    /// Build state over an existing pool, running migrations first
    pub async fn with_pool(
        pool: SqlitePool,
        config: ApiConfig,
        channel: Arc<dyn NotificationChannel>,
    ) -> Result<Self> {
        Self::run_migrations(&pool).await?;
        Ok(Self {
            db: pool,
            config,
            channel,
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS signature_requests (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                message TEXT,
                sign_in_order INTEGER NOT NULL DEFAULT 0,
                document_name TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                sender_email TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                completed_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS recipients (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL REFERENCES signature_requests(id),
                name TEXT,
                emails_json TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'signer',
                signing_order_index INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                signed_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signature_fields (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL REFERENCES signature_requests(id),
                recipient_id TEXT NOT NULL REFERENCES recipients(id),
                field_type TEXT NOT NULL,
                page_number INTEGER NOT NULL DEFAULT 1,
                x REAL NOT NULL,
                y REAL NOT NULL,
                width REAL NOT NULL,
                height REAL NOT NULL,
                pixel_x REAL NOT NULL,
                pixel_y REAL NOT NULL,
                value TEXT,
                signed_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                request_id TEXT PRIMARY KEY REFERENCES signature_requests(id),
                document_name TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                pdf_data BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS signing_tokens (
                token_digest TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                address TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS dispatch_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                run_number INTEGER NOT NULL,
                recipient_id TEXT NOT NULL,
                address TEXT NOT NULL,
                order_number INTEGER,
                status TEXT NOT NULL,
                message_id TEXT,
                reason TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_recipients_request ON recipients(request_id)",
            "CREATE INDEX IF NOT EXISTS idx_fields_request ON signature_fields(request_id)",
            "CREATE INDEX IF NOT EXISTS idx_dispatch_request ON dispatch_log(request_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        tracing::info!("Migrations complete");
        Ok(())
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
