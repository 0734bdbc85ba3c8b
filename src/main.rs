// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testprep::config::Config;
use testprep::models::test::RawTest;
use testprep::routes;
use testprep::state::AppState;
use testprep::store::{
    ResultStore, SnapshotStore, TestCatalog,
    file_kv::FileSnapshotStore,
    memory::{MemoryResultStore, MemoryTestCatalog},
    postgres::{PgResultStore, PgTestCatalog},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let (results, catalog): (Arc<dyn ResultStore>, Arc<dyn TestCatalog>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = connect_with_retry(database_url).await;

                tracing::info!("Running migrations...");
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Migrations applied successfully.");

                (
                    Arc::new(PgResultStore::new(pool.clone())),
                    Arc::new(PgTestCatalog::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, results are kept in memory only");
                let catalog = seed_catalog(&config).expect("Failed to load test seed file");
                (Arc::new(MemoryResultStore::new()), Arc::new(catalog))
            }
        };

    let snapshots: Arc<dyn SnapshotStore> = Arc::new(
        FileSnapshotStore::open(&config.snapshot_dir).expect("Failed to open snapshot directory"),
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, results, catalog, snapshots);

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("Listening on {}", bind_addr);

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

async fn connect_with_retry(database_url: &str) -> PgPool {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return pool;
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Loads `TEST_SEED_FILE` into the in-memory catalog, if configured.
fn seed_catalog(config: &Config) -> Result<MemoryTestCatalog, Box<dyn std::error::Error>> {
    let Some(path) = &config.seed_path else {
        return Ok(MemoryTestCatalog::new());
    };

    let raw: Vec<RawTest> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let count = raw.len();
    let catalog = MemoryTestCatalog::from_raw(raw)?;
    tracing::info!("Loaded {} tests from {}", count, path.display());
    Ok(catalog)
}
