//! Odonto Server - Dental Clinic Management
//!
//! REST API server for appointments, availability, inventory and medical records.

use anyhow::Context;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odonto_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{
        email::EmailService,
        notifications::{Mailer, NotificationService},
        redis::RedisService,
        Services,
    },
    AppState,
};

/// How long pending notifications may take to flush at shutdown
const NOTIFICATION_DRAIN_SECS: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Odonto Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let redis_service = RedisService::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let mailer: Arc<dyn Mailer> =
        Arc::new(EmailService::new(config.email.clone()).context("Failed to configure SMTP")?);
    let (notifications, notification_worker) =
        NotificationService::start(mailer, config.clinic.notification_queue_capacity);

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config, redis_service, notifications);

    services
        .users
        .ensure_bootstrap_admin()
        .await
        .context("Failed to create bootstrap administrator")?;

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue sender; the worker stops once the queue is drained
    if tokio::time::timeout(Duration::from_secs(NOTIFICATION_DRAIN_SECS), notification_worker)
        .await
        .is_err()
    {
        tracing::warn!("Notification queue not drained before shutdown");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Console output in the configured format, plus optional daily JSON files
fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("odonto_server={},tower_http=debug", logging.level).into());

    let (file_layer, guard) = match logging.directory.as_deref() {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "odonto-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json = logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        .route("/auth/forgot-password", post(api::auth::forgot_password))
        .route("/auth/reset-password", post(api::auth::reset_password))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/staff", post(api::users::create_staff))
        .route("/users/:id", get(api::users::get_user))
        .route("/users/:id/deactivate", post(api::users::deactivate_patient))
        .route("/doctors", get(api::users::list_doctors))
        // Availability
        .route("/availability", post(api::availability::create_window))
        .route("/availability/:id", put(api::availability::update_window))
        .route("/availability/:id", delete(api::availability::delete_window))
        .route("/availability/:id/status", patch(api::availability::update_window_status))
        .route("/availability/doctor/:id", get(api::availability::resolve_slots))
        .route("/availability/doctor/:id/windows", get(api::availability::list_windows))
        // Appointments
        .route("/appointments", post(api::appointments::create_appointment))
        .route("/appointments/:id", get(api::appointments::get_appointment))
        .route("/appointments/:id", put(api::appointments::update_appointment))
        .route("/appointments/:id/reschedule", put(api::appointments::reschedule_appointment))
        .route("/appointments/:id/cancel", post(api::appointments::cancel_appointment))
        .route("/appointments/:id/confirm", post(api::appointments::confirm_appointment))
        .route("/appointments/:id/complete", post(api::appointments::complete_appointment))
        .route("/appointments/patient/:id", get(api::appointments::list_patient_appointments))
        .route("/appointments/doctor/:id", get(api::appointments::list_doctor_appointments))
        .route("/appointment-types", get(api::appointments::list_appointment_types))
        // Inventory
        .route("/inventory", get(api::inventory::list_items))
        .route("/inventory", post(api::inventory::register_item))
        .route("/inventory/search", get(api::inventory::search_items))
        .route("/inventory/below-minimum", get(api::inventory::below_minimum))
        .route("/inventory/expiring", get(api::inventory::expiring))
        .route("/inventory/sterilization", get(api::inventory::needing_sterilization))
        .route("/inventory/:id", get(api::inventory::get_item))
        .route("/inventory/:id", put(api::inventory::update_item))
        .route("/inventory/:id", delete(api::inventory::delete_item))
        .route("/inventory/:id/quantity", patch(api::inventory::set_quantity))
        .route("/inventory/:id/restock", post(api::inventory::restock))
        .route("/inventory/:id/consume", put(api::inventory::consume))
        .route("/inventory/:id/damaged", post(api::inventory::mark_damaged))
        .route("/inventory/:id/sterilize", post(api::inventory::sterilize))
        // Medical records
        .route("/medical-records", post(api::medical_records::create_record))
        .route("/medical-records/:id", get(api::medical_records::get_record))
        .route("/medical-records/:id", put(api::medical_records::update_record))
        .route("/medical-records/patient/:id", get(api::medical_records::list_patient_records))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}
