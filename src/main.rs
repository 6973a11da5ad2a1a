//! Lumen server binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumen::{
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    services::FeatureAccessTable,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lumen={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Lumen - identity journey backend");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // Feature table: built-in matrix unless a JSON override is given
    let table = match args.feature_table {
        Some(ref path) => match FeatureAccessTable::from_file(std::path::Path::new(path)) {
            Ok(table) => {
                info!("Loaded feature table from {}", path);
                table
            }
            Err(e) => {
                error!("Failed to load feature table {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => FeatureAccessTable::builtin(),
    };

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "MongoDB connection failed (dev mode, continuing without): {}",
                    e
                );
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = match mongo {
        Some(mongo) => {
            let state = AppState::with_mongo(args, mongo, table);
            // Debits interrupted by a previous crash get their pending
            // records resolved before traffic arrives.
            if let Some(ref services) = state.services {
                match services
                    .ledger
                    .recover_pending(state.args.pending_txn_max_age_minutes)
                    .await
                {
                    Ok(0) => {}
                    Ok(n) => info!("Recovered {} stale pending transactions", n),
                    Err(e) => error!("Pending transaction recovery failed: {}", e),
                }
            }
            state
        }
        None => AppState::new(args),
    };

    server::run(Arc::new(state)).await?;
    Ok(())
}
