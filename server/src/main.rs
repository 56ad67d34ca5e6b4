use std::net::SocketAddr;
use tokio::net::TcpListener;

use hauzflow_server::config::{generate_config_template, Config};
use hauzflow_server::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);

    tracing::info!(
        environment = %config.environment,
        "HauzFlow server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let db = db::init_db(&config.data_dir)?;

    let realtime = config.realtime();
    tracing::info!(
        ping_interval_secs = realtime.ping_interval_secs,
        pong_timeout_secs = realtime.pong_timeout_secs,
        presence_snapshot = realtime.presence_snapshot,
        "Real-time settings"
    );

    let app_state = state::AppState::new(db, realtime, config.environment.clone());
    let app = routes::build_router(app_state, &config.allowed_origins);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        cors = %config.allowed_origins.join(", "),
        "Listening on {}",
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Pretty or JSON output; RUST_LOG overrides the default filter.
fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hauzflow_server=info,tower_http=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
