//! PassMint Issuer Service
//!
//! REST API that issues Apple and Google wallet passes from organization
//! designs.

use anyhow::{Context, Result};
use issuer_service::blob::{FsBlobStore, HttpBlobStore};
use issuer_service::config::{BlobConfig, Config};
use issuer_service::storage::RedisStorage;
use issuer_service::{create_router, AppState, Issuer};
use passmint_common::BlobStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet_passes::{ApplePassGenerator, GoogleWalletGenerator, PassGenerator, QrEncoder};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "issuer_service=debug,wallet_passes=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PassMint Issuer Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded - listening on {}",
        config.api_address()
    );

    // Record store
    let storage = Arc::new(
        RedisStorage::new(&config.redis_url)
            .await
            .context("Failed to connect to Redis")?,
    );

    // Blob store
    let (blobs, files_dir) = match &config.blob {
        BlobConfig::Fs { dir } => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create blob directory: {}", dir.display()))?;
            info!("Blob directory: {}", dir.display());
            let blobs: Arc<dyn BlobStore> =
                Arc::new(FsBlobStore::new(dir.clone(), &config.public_base_url));
            (blobs, Some(dir.clone()))
        }
        BlobConfig::Http { endpoint, bucket } => {
            info!("Blob bucket: {}/{}", endpoint, bucket);
            let blobs: Arc<dyn BlobStore> = Arc::new(HttpBlobStore::new(endpoint, bucket));
            (blobs, None)
        }
    };

    // Platform generators
    let generators: Vec<Arc<dyn PassGenerator>> = vec![
        Arc::new(ApplePassGenerator::new(config.apple.clone(), blobs.clone())),
        Arc::new(GoogleWalletGenerator::new(config.google.clone())),
    ];

    let issuer = Issuer::new(
        storage.clone(),
        storage.clone(),
        generators,
        QrEncoder::default(),
    )
    .context("Failed to configure issuer")?;

    let state = AppState {
        issuer,
        designs: storage,
        blobs,
        jwt_secret: config.jwt_secret.clone(),
        files_dir,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Issuer API listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
