use anyhow::Result;
use axum::Router;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::services::{
    checkout_service::CheckoutService,
    provider::{HttpPaymentProvider, PaymentProvider, UnconfiguredProvider},
};

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

const MIGRATION_PATH: &str = "migrations/0001_init.sql";

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting job-checkout with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory and file if needed; SQLx will not create either.
    if !db_path.starts_with(":memory:") {
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
        match fs::OpenOptions::new().create(true).append(true).open(db_path) {
            Ok(_) => tracing::debug!("Database file can be created/opened."),
            Err(e) => tracing::warn!("Failed to open database file manually: {}", e),
        }
    }

    let db: Arc<SqlitePool> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Provider client, built once and shared by every handler ---
    let provider: Arc<dyn PaymentProvider> = match cfg.provider.access_token.as_deref() {
        Some(token) => Arc::new(HttpPaymentProvider::new(&cfg.provider.api_url, token)),
        None => {
            tracing::warn!("No provider access token configured; checkout endpoints will fail");
            Arc::new(UnconfiguredProvider)
        }
    };
    let missing = cfg.provider.missing();
    if !missing.is_empty() {
        tracing::warn!(?missing, "Payment provider configuration incomplete");
    }

    // --- Initialize core service ---
    let checkout = CheckoutService::new(db.clone(), provider, Arc::new(cfg.provider.clone()));

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(checkout);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations from the migration file.
async fn run_migrations(db: &SqlitePool) -> Result<()> {
    if !Path::new(MIGRATION_PATH).exists() {
        anyhow::bail!("Migration file not found: {}", MIGRATION_PATH);
    }

    let sql = fs::read_to_string(MIGRATION_PATH)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
