// Hakot Operations Backend - entry point

use std::fmt::Write as FmtWrite;
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hakot_backend::assignment::AssignmentService;
use hakot_backend::config::Config;
use hakot_backend::routes::{
    assignments_routes, collectors_routes, health_routes, schedules_routes,
};
use hakot_backend::services::{PostgrestService, WebhookNotifier};
use hakot_backend::AppState;

/// Custom time formatter: [HH:mm:ss] [hakot]
#[derive(Clone)]
struct OpsTimer;

impl FormatTime for OpsTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [hakot]", now.format("%H:%M:%S"))
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables first so LOG_FILE is honored
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Open log file, line-buffered so entries appear immediately
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .expect("Failed to open log file");
    let line_writer = LineWriter::new(log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(line_writer);

    // Tracing with both stdout and file output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hakot_backend=info,tower_http=info".into()),
        )
        .with(
            fmt::layer()
                .with_timer(OpsTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_timer(OpsTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
    }

    // Store client over the hosted Postgres backend
    let db = Arc::new(PostgrestService::new(
        config.supabase_url.as_deref().unwrap_or("http://localhost:54321"),
        config.supabase_service_key.as_deref().unwrap_or_default(),
    ));

    // Assignment core wired to its ports: the same store client doubles as
    // schedule store and collector directory; escalation goes to the staff
    // webhook.
    let notifier = Arc::new(WebhookNotifier::new(config.escalation_webhook_url.clone()));
    let assignments = Arc::new(AssignmentService::new(
        db.clone(),
        db.clone(),
        notifier,
    ));

    let state = AppState {
        db,
        assignments,
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(health_routes())
        .merge(schedules_routes())
        .merge(assignments_routes())
        .merge(collectors_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting Hakot Operations Backend on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
