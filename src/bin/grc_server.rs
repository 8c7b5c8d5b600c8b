//! grc_server: REST server for the GRC tracker.
//!
//! Configuration comes from flags or their environment variables (see
//! `grc_server --help`); `.env` is loaded first.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use grc_tracker::api::{build_router, with_middleware};
use grc_tracker::blob_store::LocalBlobStore;
use grc_tracker::config::ServerArgs;
use grc_tracker::ports::RecordStore;
use grc_tracker::seed::SeedBundle;
use grc_tracker::store::MemoryStore;
use grc_tracker::{GrcService, Schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grc_tracker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = ServerArgs::parse();
    let addr = args.validate()?;

    let schema = Arc::new(Schema::grc());
    schema
        .check()
        .map_err(|problems| anyhow::anyhow!("schema check failed: {problems}"))?;

    let store = open_store(&args, schema.clone()).await?;

    tokio::fs::create_dir_all(&args.media_root)
        .await
        .with_context(|| format!("Failed to create media root {}", args.media_root.display()))?;
    let blobs = Arc::new(LocalBlobStore::new(&args.media_root));
    tracing::info!("Storing attachments under {}", args.media_root.display());

    let service = Arc::new(GrcService::new(store, schema, blobs));

    if let Some(path) = &args.seed {
        let bundle = SeedBundle::from_path(path)?;
        let report = service.apply_seed(&bundle).await?;
        tracing::info!(
            "Seed {}: {} frameworks ({} existing), {} controls ({} existing)",
            path.display(),
            report.frameworks_created,
            report.frameworks_existing,
            report.controls_created,
            report.controls_existing
        );
    }

    let app = with_middleware(build_router(service), args.max_upload_bytes);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("grc_server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("grc_server stopped");
    Ok(())
}

#[cfg(feature = "database")]
async fn open_store(args: &ServerArgs, schema: Arc<Schema>) -> anyhow::Result<Arc<dyn RecordStore>> {
    use grc_tracker::store::{DatabaseConfig, PgRecordStore};

    match &args.database_url {
        Some(url) => {
            let config = DatabaseConfig::new(url.clone(), args.max_connections);
            let store = PgRecordStore::connect(&config, schema).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory only");
            Ok(Arc::new(MemoryStore::new(schema)))
        }
    }
}

#[cfg(not(feature = "database"))]
async fn open_store(args: &ServerArgs, schema: Arc<Schema>) -> anyhow::Result<Arc<dyn RecordStore>> {
    if args.database_url.is_some() {
        tracing::warn!("built without the `database` feature; ignoring DATABASE_URL");
    }
    Ok(Arc::new(MemoryStore::new(schema)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
