use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use filevault_server::config::{generate_config_template, Config};
use filevault_server::routes;
use filevault_server::state::AppState;
use filevault_server::storage::{gateway::StorageGateway, key};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("filevault_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!("filevault server v{} starting", env!("CARGO_PKG_VERSION"));

    // Validate the credential pair before touching any storage
    let credentials = config.credentials()?;
    match &credentials {
        Some(c) => tracing::info!("Basic authentication enabled for user {:?}", c.username()),
        None => tracing::warn!(
            "No auth_username/auth_password configured: the file API is open to anyone"
        ),
    }

    // Resolve the storage key once; it is never reloaded
    let storage_key = if config.encryption {
        Some(key::load_storage_key(
            config.encryption_key.as_deref(),
            &config.data_dir,
        )?)
    } else {
        tracing::warn!("Encryption at rest disabled: files are stored as plaintext");
        None
    };

    let gateway = StorageGateway::open(&config.storage_dir, storage_key)?;
    tracing::info!(
        "Storage directory {} ({})",
        gateway.root().display(),
        if gateway.is_encrypted() { "encrypted" } else { "plaintext" }
    );

    // Build application state
    let app_state = AppState {
        gateway: Arc::new(gateway),
        interceptors: Arc::new(routes::default_interceptors(credentials)),
        max_upload_bytes: config.max_upload_bytes(),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
