//! Citizen appeals server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use appeals_api::{AppState, app};
use appeals_common::Config;
use appeals_core::{
    AppealService, ClassifierService, DirectoryService, FileSettingsProvider, HttpClassifier,
    LogSink, NoOpClassifier, Notifier, StatisticsService,
};
use appeals_db::{AppealRepository, DirectoryRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "appeals=debug,tower_http=debug".into());
    let json = std::env::var("APPEALS_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (also reads .env)
    let config = Config::load()?;
    init_tracing();

    info!("Starting citizen appeals server...");

    // Connect to database
    let db = Arc::new(appeals_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    appeals_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let appeal_repo = Arc::new(AppealRepository::new(Arc::clone(&db)));
    let directory_repo = Arc::new(DirectoryRepository::new(Arc::clone(&db)));

    // Initialize collaborators
    let classifier: ClassifierService = if config.classification.enabled {
        info!(url = %config.classification.service_url, "Classifier enabled");
        Arc::new(HttpClassifier::new(&config.classification)?)
    } else {
        warn!("Classifier disabled, appeals will not be auto-routed");
        Arc::new(NoOpClassifier)
    };
    let settings = Arc::new(FileSettingsProvider::new(&config.settings.path));
    let notifier = Notifier::new(directory_repo.clone(), Arc::new(LogSink));

    // Initialize services
    let state = AppState {
        appeal_service: AppealService::new(
            appeal_repo.clone(),
            directory_repo.clone(),
            classifier,
            settings.clone(),
            notifier,
        ),
        statistics_service: StatisticsService::new(appeal_repo, directory_repo.clone()),
        directory_service: DirectoryService::new(directory_repo),
        settings,
    };

    let app = app(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
