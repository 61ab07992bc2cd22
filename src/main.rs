use clap::Parser;
use dotenvy::dotenv;
use pdf_toolbox_backend::config::{LifecycleConfig, StoreBackend};
use pdf_toolbox_backend::infrastructure::{database, storage};
use pdf_toolbox_backend::services::artifact_store::{
    ArtifactStore, DatabaseArtifactStore, MemoryArtifactStore,
};
use pdf_toolbox_backend::services::lifecycle::LifecycleCoordinator;
use pdf_toolbox_backend::services::worker::BackgroundWorker;
use pdf_toolbox_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 5000)]
    port: u16,
}

async fn setup_store(config: &LifecycleConfig) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("🧠 Artifact store: in-memory");
            Ok(Arc::new(MemoryArtifactStore::new()))
        }
        StoreBackend::Database => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for the database store"))?;
            let db = database::setup_database(url).await?;
            Ok(Arc::new(DatabaseArtifactStore::new(db)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_toolbox_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting PDF Toolbox Backend [Mode: {}]...", args.mode);

    // 2. Setup Common Infrastructure
    let config = LifecycleConfig::from_env();
    info!(
        "⚙️  Lifecycle Config: TTL={:?}, Grace={:?}, Sweep every {:?}, Max Size={}MB",
        config.artifact_ttl,
        config.download_grace,
        config.sweep_interval,
        config.max_file_size / 1024 / 1024
    );

    let store = setup_store(&config).await?;
    let storage_service = storage::setup_storage(&config).await?;
    let lifecycle = LifecycleCoordinator::new(store, storage_service, &config);

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Initialize Sweep Worker
    if args.mode == "worker" || args.mode == "all" {
        let worker = BackgroundWorker::new(
            lifecycle.clone(),
            config.sweep_interval,
            config.uploads_dir(),
            config.artifact_ttl,
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Worker service initialized.");
    }

    // 5. Initialize API Service
    if args.mode == "api" || args.mode == "all" {
        let state = AppState::new(lifecycle.clone(), config.clone());

        // Configure tracing layer for HTTP requests
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
