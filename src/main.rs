mod cli;

use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, DbCommands};
use tixcore::adapters::PostgresLedgerStore;
use tixcore::config::Config;
use tixcore::services::{run_sweeper, CheckInService, LogDispatcher, TransactionLifecycle};
use tixcore::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Sweep => sweep_once(config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let store = Arc::new(PostgresLedgerStore::new(pool.clone()));
    let notifier = Arc::new(LogDispatcher);
    let lifecycle = TransactionLifecycle::new(store.clone(), notifier, config.payment_window());
    let checkin = CheckInService::new(store);

    tokio::spawn(run_sweeper(
        lifecycle.clone(),
        std::time::Duration::from_secs(config.sweep_interval_secs),
    ));

    let state = AppState { lifecycle, checkin, db: Some(pool) };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn sweep_once(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    let store = Arc::new(PostgresLedgerStore::new(pool));
    let lifecycle = TransactionLifecycle::new(store, Arc::new(LogDispatcher), config.payment_window());

    let swept = lifecycle
        .sweep_expired()
        .await
        .map_err(|e| anyhow::anyhow!("sweep failed: {e}"))?;

    println!("✓ Swept {} expired transaction(s)", swept.len());
    Ok(())
}
