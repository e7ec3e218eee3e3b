use anyhow::{bail, Context};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jsonapi_users::app::{router, AppState};
use jsonapi_users::config::{config, Environment};
use jsonapi_users::database::{DatabaseManager, MemoryStore, PgStore, Store};

/// JSON:API user service
#[derive(Debug, Parser)]
#[command(name = "jsonapi-users", version, about)]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(short, long, env = "JSONAPI_USERS_PORT")]
    port: Option<u16>,

    /// Serve from an in-memory store seeded with fixture users
    #[arg(long)]
    memory: bool,

    /// Number of users seeded into the in-memory store
    #[arg(long, default_value_t = 5, requires = "memory")]
    seed: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jsonapi_users=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = config().clone();
    if let Some(port) = args.port {
        config.port = port;
    }
    info!("Starting in {:?} mode", config.environment);

    if config.security.jwt_secret.trim().is_empty() {
        bail!("JWT_SECRET must be set");
    }
    if config.environment == Environment::Production && args.memory {
        warn!("In-memory store selected in production mode");
    }

    let store: Arc<dyn Store> = if args.memory {
        info!("Using in-memory store with {} users", args.seed);
        Arc::new(MemoryStore::seeded_users(args.seed))
    } else {
        info!("Using database {}", DatabaseManager::redacted(&config.database.url));
        Arc::new(PgStore::new(DatabaseManager::pool(&config.database)?))
    };

    let port = config.port;
    let app = router(AppState::new(config, store));

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
