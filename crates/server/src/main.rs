use clap::Parser;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vectord_core::{config, VectorStore};
use vectord_server::api::create_router;
use vectord_server::api::handlers::AppState;

#[derive(Parser)]
#[command(name = "vectord", about = "Multi-collection ANN vector database")]
struct Args {
    /// HTTP port to listen on
    #[arg(long, default_value_t = config::DEFAULT_HTTP_PORT, env = "VECTOR_HTTP_PORT")]
    http_port: u16,

    /// Data directory for persisted collections
    #[arg(long, default_value = config::DEFAULT_DATA_DIR, env = "VECTOR_DATA_DIR")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "vectord_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "vectord_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();

    if args.http_port == 0 {
        eprintln!("Error: --http-port must be > 0");
        std::process::exit(1);
    }
    let data_path = std::path::Path::new(&args.data_dir);
    if data_path.exists() && !data_path.is_dir() {
        eprintln!(
            "Error: data dir '{}' exists but is not a directory",
            args.data_dir
        );
        std::process::exit(1);
    }

    let store = VectorStore::open(&args.data_dir)?;
    let collections_count = store.list_collections().len();

    let state = AppState {
        store: store.clone(),
        start_time: Instant::now(),
    };
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", args.http_port);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http_port = args.http_port,
        data_dir = %args.data_dir,
        collections = collections_count,
        "vectord ready"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    // Requests drained; persist everything before exit.
    match store.save_all() {
        Ok(()) => tracing::info!("all collections saved on shutdown"),
        Err(e) => tracing::error!(error = %e, "failed to save collections on shutdown"),
    }

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down gracefully, draining in-flight requests...");
}
