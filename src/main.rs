//! Palace commerce backend
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────────┐
//! │  Config  │───▶│ Gateway  │───▶│ Services │───▶│    Store     │
//! │  (YAML)  │    │  (axum)  │    │          │    │ (PG/memory)  │
//! └──────────┘    └──────────┘    └────┬─────┘    └──────────────┘
//!                                      │
//!                                      ▼
//!                                ┌──────────┐
//!                                │  M-Pesa  │
//!                                └──────────┘
//! ```
//!
//! Usage: `palace [--env dev] [--port 8080] [--memory]`

use std::sync::Arc;

use anyhow::{Context, Result};

use palace::account::TokenIssuer;
use palace::config::AppConfig;
use palace::db::Database;
use palace::gateway::state::AppState;
use palace::notify::LogNotifier;
use palace::payments::{MockGateway, MpesaClient, PaymentGateway};
use palace::store::{MemoryStore, PgStore, Store};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

/// In-memory store and mock payment gateway, no external services
fn use_memory_mode() -> bool {
    std::env::args().any(|a| a == "--memory")
}

async fn open_store(config: &AppConfig, memory: bool) -> Result<Arc<dyn Store>> {
    if memory {
        tracing::warn!("Running with the in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let url = config
        .postgres_url
        .as_deref()
        .context("postgres_url (or DATABASE_URL) is required unless --memory is set")?;
    let db = Database::connect(url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.migrate().await.context("Failed to apply schema")?;
    Ok(Arc::new(PgStore::new(&db)))
}

fn payment_gateway(config: &AppConfig, memory: bool) -> Result<Arc<dyn PaymentGateway>> {
    if memory || config.mpesa.use_mock {
        tracing::warn!("Using the mock M-Pesa gateway; no real payments are requested");
        return Ok(Arc::new(MockGateway::new()));
    }
    config
        .mpesa
        .validate()
        .context("M-Pesa is not configured for live payments")?;
    let client = MpesaClient::new(config.mpesa.clone()).context("Failed to build M-Pesa client")?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = palace::logging::init_logging(&config);

    tracing::info!(
        "Starting palace {} ({}) in {} mode",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env
    );

    let memory = use_memory_mode();
    let store = open_store(&config, memory).await?;
    let gateway = payment_gateway(&config, memory)?;
    let tokens = Arc::new(TokenIssuer::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl_hours,
    ));

    let state = Arc::new(AppState::new(
        store,
        tokens,
        Arc::new(LogNotifier),
        gateway,
        config.reset_code_ttl_minutes,
        config.auth.secure_cookie,
    ));

    if let Some(admin) = &config.bootstrap_admin {
        state
            .users
            .ensure_admin(admin.registration())
            .await
            .context("Failed to create the bootstrap admin")?;
    }

    palace::gateway::run_server(&config.gateway, state).await
}
