use std::sync::Arc;

use wellwork::api::{AppState, api_routes};
use wellwork::config::{GenerationConfig, ServerConfig};
use wellwork::enrichment::EnrichmentService;
use wellwork::generation::GenerationClient;
use wellwork::notify::LogPublisher;
use wellwork::service::{CheckInService, UserService};
use wellwork::store::{CheckInStore, LibSqlBackend, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env();
    let generation_config = GenerationConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export GROQ_API_KEY=gsk_...");
        std::process::exit(1);
    });

    eprintln!("WellWork v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", generation_config.model);
    eprintln!("   API: http://0.0.0.0:{}/api", server_config.port);

    // ── Database ────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&server_config.db_path);
    let db = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(|e| {
        eprintln!(
            "Error: Failed to open database at {}: {}",
            server_config.db_path, e
        );
        std::process::exit(1);
    }));
    eprintln!("   Database: {}", server_config.db_path);

    // ── Services ────────────────────────────────────────────────────
    let client = GenerationClient::new(generation_config);
    let enrichment = Arc::new(EnrichmentService::new(
        Arc::clone(&db) as Arc<dyn CheckInStore>,
        client,
    ));
    let users = Arc::new(UserService::new(
        Arc::clone(&db) as Arc<dyn UserStore>,
        Arc::new(LogPublisher),
    ));
    let check_ins = Arc::new(CheckInService::new(Arc::clone(&db) as Arc<dyn CheckInStore>));

    // ── Server ──────────────────────────────────────────────────────
    let app = api_routes(AppState {
        users,
        check_ins,
        enrichment,
    });

    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port)).await?;
    tracing::info!(port = server_config.port, "WellWork API server started");
    axum::serve(listener, app).await?;

    Ok(())
}
