use anyhow::Result;
use std::io::ErrorKind;
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;
use triples::{
    app,
    config::{AppConfig, RunMode},
    services::{reconcile::ReconcileMode, storage_service::StorageService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting triples with config: {:?}", cfg);

    // --- Ensure data directory exists ---
    if !fs::try_exists(&cfg.data_dir).await? {
        fs::create_dir_all(&cfg.data_dir).await?;
        tracing::info!("Created data directory at {}", cfg.data_dir.display());
    }

    let storage = StorageService::new(cfg.data_dir.clone());

    // --- Handle maintenance modes ---
    match mode {
        RunMode::Check | RunMode::Reconcile => {
            let reconcile_mode = if mode == RunMode::Reconcile {
                ReconcileMode::Repair
            } else {
                ReconcileMode::Report
            };
            let report = storage.reconcile(reconcile_mode).await?;
            if report.is_clean() {
                tracing::info!("Catalogs and data directory are consistent.");
            } else {
                tracing::warn!("Inconsistencies found: {:#?}", report);
            }
            return Ok(()); // exit after maintenance
        }
        RunMode::Serve => {}
    }

    // --- Build router ---
    let app = app(storage);

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
